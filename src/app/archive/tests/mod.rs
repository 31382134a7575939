//! Retrieval tests against a fake fetcher
//!
//! The fetcher writes a small ZIP for each request and counts calls, so the
//! skip/force rules can be checked from filesystem state alone.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::{tempdir, TempDir};
use url::Url;
use zip::write::FileOptions;

use crate::app::archive::{ArchiveFetcher, ArchiveRetriever, Retrieval};
use crate::app::catalog::{FormatTag, Locators, ModuleCode, ModuleRecord};
use crate::app::layout::{StagingKey, SurveyLayout};
use crate::errors::{ArchiveError, DownloadError, DownloadResult};

#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
    failing: HashSet<String>,
    corrupt: bool,
}

impl CountingFetcher {
    fn failing_on(url: &str) -> Self {
        Self {
            failing: [url.to_string()].into_iter().collect(),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveFetcher for CountingFetcher {
    async fn fetch(&self, url: &Url, destination: &Path) -> DownloadResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(url.as_str()) {
            return Err(DownloadError::NotFound {
                url: url.to_string(),
            });
        }
        if self.corrupt {
            std::fs::write(destination, b"truncated")?;
            return Ok(9);
        }
        write_module_zip(destination, url.path());
        Ok(std::fs::metadata(destination)?.len())
    }
}

fn write_module_zip(destination: &Path, marker: &str) {
    let mut writer = zip::ZipWriter::new(std::fs::File::create(destination).unwrap());
    writer
        .start_file("Modulo/enaho01-100.csv", FileOptions::default())
        .unwrap();
    writer.write_all(marker.as_bytes()).unwrap();
    writer
        .start_file("Modulo/Diccionario.pdf", FileOptions::default())
        .unwrap();
    writer.write_all(b"%PDF").unwrap();
    writer.finish().unwrap();
}

fn record(year: u16, code: u32, locators: Locators) -> ModuleRecord {
    ModuleRecord {
        year,
        module_code: ModuleCode::from_number(code),
        module_name: format!("Modulo {}", code),
        period: "Anual".to_string(),
        survey_code: "55".to_string(),
        survey_name: "ENAHO".to_string(),
        ficha: None,
        locators,
    }
}

fn stata_locators(year: u16, code: u32) -> Locators {
    Locators {
        stata: Some(stata_url(year, code)),
        ..Locators::default()
    }
}

fn stata_url(year: u16, code: u32) -> Url {
    Url::parse(&format!("https://example.com/STATA/{}-Modulo{:02}.zip", year, code)).unwrap()
}

fn retriever(fetcher: Arc<CountingFetcher>) -> (TempDir, ArchiveRetriever<CountingFetcher>) {
    let temp_dir = tempdir().unwrap();
    let layout = SurveyLayout::new(temp_dir.path(), "enaho");
    (temp_dir, ArchiveRetriever::new(fetcher, layout))
}

fn ready(retrieval: Retrieval) -> crate::app::archive::StagingArchive {
    match retrieval {
        Retrieval::Ready(archive) => archive,
        other => panic!("expected ready retrieval, got {:?}", other),
    }
}

#[tokio::test]
async fn test_second_ensure_is_a_no_op() {
    let fetcher = Arc::new(CountingFetcher::default());
    let (_temp_dir, retriever) = retriever(fetcher.clone());
    let rec = record(2014, 1, stata_locators(2014, 1));

    let first = ready(retriever.ensure(&rec, &[FormatTag::Stata], false, true).await.unwrap());
    assert!(first.downloaded);
    assert!(first.extracted);
    assert!(first.archive_path.is_file());
    assert!(first.staging_dir.join("Modulo/enaho01-100.csv").is_file());

    let second = ready(retriever.ensure(&rec, &[FormatTag::Stata], false, true).await.unwrap());
    assert!(!second.downloaded);
    assert!(!second.extracted);
    assert_eq!(second.staging_dir, first.staging_dir);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_existing_archive_is_extracted_without_download() {
    let fetcher = Arc::new(CountingFetcher::default());
    let (_temp_dir, retriever) = retriever(fetcher.clone());
    let rec = record(2014, 1, stata_locators(2014, 1));

    let first = ready(retriever.ensure(&rec, &[FormatTag::Stata], false, true).await.unwrap());
    std::fs::remove_dir_all(&first.staging_dir).unwrap();

    let second = ready(retriever.ensure(&rec, &[FormatTag::Stata], false, true).await.unwrap());
    assert!(!second.downloaded);
    assert!(second.extracted);
    assert!(second.staging_dir.is_dir());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_archive_deleted_unless_kept() {
    let fetcher = Arc::new(CountingFetcher::default());
    let (_temp_dir, retriever) = retriever(fetcher.clone());
    let rec = record(2016, 2, stata_locators(2016, 2));

    let archive = ready(retriever.ensure(&rec, &[FormatTag::Stata], false, false).await.unwrap());
    assert!(!archive.archive_kept);
    assert!(!archive.archive_path.exists());
    assert!(archive.staging_dir.is_dir());

    // extraction dir alone satisfies a later call
    let again = ready(retriever.ensure(&rec, &[FormatTag::Stata], false, false).await.unwrap());
    assert!(!again.downloaded);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_no_locator_in_requested_formats_is_unavailable() {
    let fetcher = Arc::new(CountingFetcher::default());
    let (temp_dir, retriever) = retriever(fetcher.clone());
    let rec = record(
        2014,
        5,
        Locators {
            spss: Some(Url::parse("https://example.com/SPSS/2014-Modulo05.zip").unwrap()),
            ..Locators::default()
        },
    );

    let result = retriever
        .ensure(&rec, &[FormatTag::Stata, FormatTag::Csv], false, true)
        .await
        .unwrap();

    assert_eq!(
        result,
        Retrieval::Unavailable {
            key: StagingKey::new(2014, ModuleCode::from_number(5))
        }
    );
    assert_eq!(fetcher.calls(), 0);
    assert!(!temp_dir.path().join("enaho").exists());
}

#[tokio::test]
async fn test_format_preference_order() {
    let fetcher = Arc::new(CountingFetcher::default());
    let (_temp_dir, retriever) = retriever(fetcher);
    let rec = record(
        2018,
        3,
        Locators {
            spss: Some(Url::parse("https://example.com/SPSS/2018-Modulo03.zip").unwrap()),
            csv: Some(Url::parse("https://example.com/CSV/2018-Modulo03.zip").unwrap()),
            ..Locators::default()
        },
    );

    let archive = ready(
        retriever
            .ensure(&rec, &[FormatTag::Stata, FormatTag::Csv, FormatTag::Spss], false, true)
            .await
            .unwrap(),
    );

    assert_eq!(archive.format, FormatTag::Csv);
    let content = std::fs::read_to_string(archive.staging_dir.join("Modulo/enaho01-100.csv")).unwrap();
    assert_eq!(content, "/CSV/2018-Modulo03.zip");
}

#[tokio::test]
async fn test_force_recreates_archive_and_staging() {
    let fetcher = Arc::new(CountingFetcher::default());
    let (_temp_dir, retriever) = retriever(fetcher.clone());
    let rec = record(2014, 1, stata_locators(2014, 1));

    let first = ready(retriever.ensure(&rec, &[FormatTag::Stata], false, true).await.unwrap());
    let stray = first.staging_dir.join("stray.txt");
    std::fs::write(&stray, b"left behind").unwrap();

    let forced = ready(retriever.ensure(&rec, &[FormatTag::Stata], true, true).await.unwrap());

    assert!(forced.downloaded);
    assert!(forced.extracted);
    assert!(!stray.exists());
    assert!(forced.archive_path.is_file());
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_corrupt_archive_leaves_no_staging_dir() {
    let fetcher = Arc::new(CountingFetcher {
        corrupt: true,
        ..CountingFetcher::default()
    });
    let (_temp_dir, retriever) = retriever(fetcher);
    let rec = record(2014, 1, stata_locators(2014, 1));
    let key = StagingKey::new(2014, ModuleCode::from_number(1));

    let result = retriever.ensure(&rec, &[FormatTag::Stata], false, true).await;

    assert!(matches!(result, Err(ArchiveError::ExtractionFailed { .. })));
    assert!(!retriever.layout().staging_dir(&key).exists());
    assert!(!retriever.layout().partial_staging_dir(&key).exists());
    assert!(!retriever.layout().archive_path(&key).exists());
}

#[tokio::test]
async fn test_retrieve_all_isolates_failures() {
    let failing = stata_url(2015, 1);
    let fetcher = Arc::new(CountingFetcher::failing_on(failing.as_str()));
    let (_temp_dir, retriever) = retriever(fetcher.clone());

    let records = vec![
        record(2016, 1, stata_locators(2016, 1)),
        record(2015, 1, stata_locators(2015, 1)),
        record(2014, 1, stata_locators(2014, 1)),
        record(2014, 9, Locators::default()),
    ];
    let refs: Vec<&ModuleRecord> = records.iter().collect();

    let report = retriever
        .retrieve_all(&refs, &[FormatTag::Stata], false, true, 2)
        .await;

    let ready_keys: Vec<String> = report.ready.iter().map(|a| a.key.to_string()).collect();
    assert_eq!(ready_keys, vec!["2014_mod_001", "2016_mod_001"]);
    assert_eq!(report.unavailable.len(), 1);
    assert_eq!(report.unavailable[0].to_string(), "2014_mod_009");
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key.to_string(), "2015_mod_001");
    assert!(matches!(
        report.failed[0].error,
        ArchiveError::Download {
            source: DownloadError::NotFound { .. },
            ..
        }
    ));
    assert_eq!(report.downloaded_count(), 2);
    assert_eq!(fetcher.calls(), 3);
}
