//! Staging tree walk and file classification

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::app::layout::StagingKey;
use crate::constants::files;
use crate::errors::{OrganizeError, OrganizeResult};

/// What a staged file is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Data,
    Documentation,
}

/// A classified file of the staging tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub source_path: PathBuf,
    pub kind: FileKind,
    /// Parsed from the first path segment below the staging root
    pub key: Option<StagingKey>,
    pub size_bytes: u64,
    pub file_name: String,
    /// Lowercased extension without the dot
    pub extension: String,
    /// Name of the directory directly containing the file, if below the root
    pub parent_folder: Option<String>,
}

/// Files found in one walk
#[derive(Debug, Default)]
pub struct Discovery {
    /// Sorted by source path
    pub files: Vec<StagedFile>,
    /// Data files outside any `{year}_mod_{code}` directory
    pub unexpected_layout: usize,
}

/// Normalize configured documentation extensions (`".PDF"` -> `"pdf"`)
pub fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Classify a file name, `None` for ignored files
pub fn classify(file_name: &str, documentation_extensions: &[String]) -> Option<(FileKind, String)> {
    let lower = file_name.to_lowercase();
    if lower.contains(files::EXCLUDED_NAME_MARKER) {
        return None;
    }
    let extension = Path::new(&lower).extension()?.to_str()?.to_string();

    if files::DATA_EXTENSIONS.contains(&extension.as_str()) {
        Some((FileKind::Data, extension))
    } else if documentation_extensions.iter().any(|e| *e == extension) {
        Some((FileKind::Documentation, extension))
    } else {
        None
    }
}

/// Walk `staging_root` in sorted order and classify every file
pub fn discover(staging_root: &Path, documentation_extensions: &[String]) -> OrganizeResult<Discovery> {
    if !staging_root.is_dir() {
        return Err(OrganizeError::StagingNotAccessible {
            path: staging_root.to_path_buf(),
        });
    }

    let mut discovery = Discovery::default();

    // unfinished extractions are not organized until they are renamed into place
    let walker = WalkDir::new(staging_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_partial_extraction(e.depth(), e.file_name()));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some((kind, extension)) = classify(&file_name, documentation_extensions) else {
            continue;
        };

        let relative = entry
            .path()
            .strip_prefix(staging_root)
            .unwrap_or_else(|_| entry.path());
        let key = staging_key_of(relative);

        if kind == FileKind::Data && key.is_none() {
            warn!(
                "Skipping {}: not below a year_mod_code directory",
                entry.path().display()
            );
            discovery.unexpected_layout += 1;
            continue;
        }

        // files sitting directly in the staging root have no folder to borrow
        let parent_folder = relative
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned());

        discovery.files.push(StagedFile {
            source_path: entry.path().to_path_buf(),
            kind,
            key,
            size_bytes: entry.metadata()?.len(),
            file_name,
            extension,
            parent_folder,
        });
    }

    debug!(
        "Discovered {} file(s) under {}",
        discovery.files.len(),
        staging_root.display()
    );
    Ok(discovery)
}

fn is_partial_extraction(depth: usize, name: &std::ffi::OsStr) -> bool {
    depth == 1
        && name
            .to_str()
            .is_some_and(|n| n.ends_with(files::PARTIAL_DIR_SUFFIX))
}

fn staging_key_of(relative: &Path) -> Option<StagingKey> {
    let mut components = relative.components();
    let first = components.next()?;
    // a bare file name is not inside a staging directory
    components.next()?;
    first.as_os_str().to_str()?.parse().ok()
}
