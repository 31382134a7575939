//! Idempotent archive retrieval
//!
//! `ensure` makes sure a module's archive has been downloaded and expanded
//! into its `{year}_mod_{code}` staging directory, doing as little work as
//! the filesystem state allows. Each (year, module) owns a disjoint set of
//! paths, so retrievals run concurrently without locking.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use url::Url;

use super::extract::ZipExtractor;
use crate::app::catalog::{FormatTag, ModuleRecord};
use crate::app::layout::{StagingKey, SurveyLayout};
use crate::errors::{ArchiveError, ArchiveResult, DownloadResult};

/// Resolves a URL into a local file
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Download `url` to `destination`, replacing any existing file
    ///
    /// Implementations must not leave a partial file at `destination`.
    async fn fetch(&self, url: &Url, destination: &Path) -> DownloadResult<u64>;
}

/// A module archive present in the staging tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingArchive {
    pub key: StagingKey,
    /// Format the archive was (or would have been) fetched in
    pub format: FormatTag,
    pub archive_path: PathBuf,
    pub staging_dir: PathBuf,
    /// This call downloaded the archive
    pub downloaded: bool,
    /// This call expanded the archive
    pub extracted: bool,
    /// The archive file is still on disk
    pub archive_kept: bool,
}

/// Outcome of [`ArchiveRetriever::ensure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    /// Staging directory is in place
    Ready(StagingArchive),
    /// The module publishes none of the requested formats for that year
    Unavailable { key: StagingKey },
}

/// A retrieval that failed for one (year, module)
#[derive(Debug)]
pub struct RetrievalFailure {
    pub key: StagingKey,
    pub error: ArchiveError,
}

/// Outcomes of a batch of retrievals, each list sorted by key
#[derive(Debug, Default)]
pub struct RetrievalReport {
    pub ready: Vec<StagingArchive>,
    pub unavailable: Vec<StagingKey>,
    pub failed: Vec<RetrievalFailure>,
}

impl RetrievalReport {
    /// Number of archives downloaded during the batch
    pub fn downloaded_count(&self) -> usize {
        self.ready.iter().filter(|a| a.downloaded).count()
    }

    /// Number of archives expanded during the batch
    pub fn extracted_count(&self) -> usize {
        self.ready.iter().filter(|a| a.extracted).count()
    }
}

/// Downloads and extracts module archives into a survey layout
pub struct ArchiveRetriever<F: ?Sized> {
    fetcher: Arc<F>,
    layout: SurveyLayout,
}

impl<F> ArchiveRetriever<F>
where
    F: ArchiveFetcher + ?Sized,
{
    pub fn new(fetcher: Arc<F>, layout: SurveyLayout) -> Self {
        Self { fetcher, layout }
    }

    pub fn layout(&self) -> &SurveyLayout {
        &self.layout
    }

    /// Ensure the archive of `record` is downloaded and extracted
    ///
    /// The first format of `formats` with a published URL is used; when
    /// there is none the result is [`Retrieval::Unavailable`] and nothing
    /// touches the filesystem. Without `force`, an existing staging
    /// directory short-circuits everything and an existing archive skips
    /// the download. With `force`, both are removed first.
    pub async fn ensure(
        &self,
        record: &ModuleRecord,
        formats: &[FormatTag],
        force: bool,
        keep_archive: bool,
    ) -> ArchiveResult<Retrieval> {
        let key = StagingKey::new(record.year, record.module_code.clone());

        let Some((format, url)) = record.locators.first_available(formats) else {
            debug!("{} has no locator in the requested formats", key);
            return Ok(Retrieval::Unavailable { key });
        };

        let archive_path = self.layout.archive_path(&key);
        let staging_dir = self.layout.staging_dir(&key);

        if force {
            remove_file_if_present(&archive_path).await?;
            remove_dir_if_present(&staging_dir).await?;
        } else if staging_dir.is_dir() {
            debug!("{} already extracted, skipping", key);
            return Ok(Retrieval::Ready(StagingArchive {
                archive_kept: archive_path.is_file(),
                key,
                format,
                archive_path,
                staging_dir,
                downloaded: false,
                extracted: false,
            }));
        }

        let downloaded = if archive_path.is_file() {
            debug!("{} archive already present, skipping download", key);
            false
        } else {
            create_dir(&self.layout.zips_dir()).await?;
            info!("Downloading {} ({}) from {}", key, format, url);
            self.fetcher
                .fetch(url, &archive_path)
                .await
                .map_err(|source| ArchiveError::Download {
                    url: url.to_string(),
                    source,
                })?;
            true
        };

        self.extract(&key, &archive_path, &staging_dir).await?;

        let archive_kept = if keep_archive {
            true
        } else {
            match tokio::fs::remove_file(&archive_path).await {
                Ok(()) => false,
                Err(e) => {
                    warn!("Could not delete archive {}: {}", archive_path.display(), e);
                    true
                }
            }
        };

        Ok(Retrieval::Ready(StagingArchive {
            key,
            format,
            archive_path,
            staging_dir,
            downloaded,
            extracted: true,
            archive_kept,
        }))
    }

    /// Expand into a `.partial` sibling, then rename into place
    async fn extract(
        &self,
        key: &StagingKey,
        archive_path: &Path,
        staging_dir: &Path,
    ) -> ArchiveResult<()> {
        let partial_dir = self.layout.partial_staging_dir(key);
        remove_dir_if_present(&partial_dir).await?;

        let archive_owned = archive_path.to_path_buf();
        let partial_owned = partial_dir.clone();
        let result = tokio::task::spawn_blocking(move || {
            ZipExtractor::extract(&archive_owned, &partial_owned)
        })
        .await
        .map_err(|e| ArchiveError::TaskAborted {
            archive: archive_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        match result {
            Ok(files) => {
                tokio::fs::rename(&partial_dir, staging_dir)
                    .await
                    .map_err(|source| ArchiveError::Io {
                        path: staging_dir.to_path_buf(),
                        source,
                    })?;
                info!("Extracted {} file(s) for {}", files.len(), key);
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&partial_dir).await;
                if matches!(e, ArchiveError::ExtractionFailed { .. }) {
                    // a corrupt archive would otherwise satisfy the skip check forever
                    let _ = tokio::fs::remove_file(archive_path).await;
                }
                Err(e)
            }
        }
    }

    /// Run `ensure` over `records` with at most `concurrency` in flight
    ///
    /// A failing (year, module) is recorded in the report and does not
    /// stop its siblings.
    pub async fn retrieve_all(
        &self,
        records: &[&ModuleRecord],
        formats: &[FormatTag],
        force: bool,
        keep_archive: bool,
        concurrency: usize,
    ) -> RetrievalReport {
        info!(
            "Retrieving {} module archive(s) with {} concurrent tasks",
            records.len(),
            concurrency.max(1)
        );

        let outcomes: Vec<(StagingKey, ArchiveResult<Retrieval>)> = stream::iter(records.iter())
            .map(|record| async move {
                let key = StagingKey::new(record.year, record.module_code.clone());
                (key, self.ensure(record, formats, force, keep_archive).await)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut report = RetrievalReport::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(Retrieval::Ready(archive)) => report.ready.push(archive),
                Ok(Retrieval::Unavailable { key }) => report.unavailable.push(key),
                Err(error) => {
                    warn!("Retrieval of {} failed: {}", key, error);
                    report.failed.push(RetrievalFailure { key, error });
                }
            }
        }

        report.ready.sort_by(|a, b| a.key.cmp(&b.key));
        report.unavailable.sort();
        report.failed.sort_by(|a, b| a.key.cmp(&b.key));

        info!(
            "Retrieval finished: {} ready ({} downloaded), {} unavailable, {} failed",
            report.ready.len(),
            report.downloaded_count(),
            report.unavailable.len(),
            report.failed.len()
        );
        report
    }
}

async fn create_dir(path: &Path) -> ArchiveResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn remove_file_if_present(path: &Path) -> ArchiveResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn remove_dir_if_present(path: &Path) -> ArchiveResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
