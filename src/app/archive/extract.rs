//! ZIP extraction into staging directories

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{ArchiveError, ArchiveResult};

/// Archive extractor for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    /// Expand every entry of `archive_path` below `dest_path`
    ///
    /// Entries whose names would escape the destination are skipped.
    /// Returns the extracted file paths.
    pub fn extract(archive_path: &Path, dest_path: &Path) -> ArchiveResult<Vec<PathBuf>> {
        let io_error = |path: &Path, source: std::io::Error| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        };
        let corrupt = |reason: String| ArchiveError::ExtractionFailed {
            archive: archive_path.to_path_buf(),
            reason,
        };

        std::fs::create_dir_all(dest_path).map_err(|e| io_error(dest_path, e))?;

        let file = File::open(archive_path).map_err(|e| io_error(archive_path, e))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| corrupt(format!("failed to read ZIP archive: {}", e)))?;

        let mut extracted = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| corrupt(format!("failed to read ZIP entry {}: {}", i, e)))?;

            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                warn!("Skipping entry with unsafe path in {}", archive_path.display());
                continue;
            };
            let out_path = dest_path.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&out_path).map_err(|e| io_error(&out_path, e))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
            let mut out_file = File::create(&out_path).map_err(|e| io_error(&out_path, e))?;
            std::io::copy(&mut entry, &mut out_file)
                .map_err(|e| corrupt(format!("failed to extract {}: {}", out_path.display(), e)))?;

            extracted.push(out_path);
        }

        debug!(
            "Extracted {} file(s) from {}",
            extracted.len(),
            archive_path.display()
        );
        Ok(extracted)
    }
}
