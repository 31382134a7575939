//! Documentation deduplication
//!
//! Manuals and dictionaries are shipped inside every module archive, often
//! identical across years. They are collected into a single directory, one
//! copy per (lowercased name, size).

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use super::discovery::StagedFile;
use super::naming::{split_extension, CollisionIndex};
use crate::errors::OrganizeResult;

/// Keep the first file of every (lowercased name, size) pair
///
/// `files` must be in walk order. Returns the kept files and the number of
/// duplicates dropped.
pub fn deduplicate<'a>(files: impl IntoIterator<Item = &'a StagedFile>) -> (Vec<&'a StagedFile>, usize) {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut dropped = 0usize;

    for file in files {
        if seen.insert((file.file_name.to_lowercase(), file.size_bytes)) {
            kept.push(file);
        } else {
            debug!("Dropping duplicate document {}", file.source_path.display());
            dropped += 1;
        }
    }
    (kept, dropped)
}

/// Destination name of a kept document, before collision handling
///
/// The containing folder is prefixed unless the file name already mentions
/// it. Lowercase, spaces become `_`.
pub fn document_name(file: &StagedFile) -> String {
    let name = file.file_name.to_lowercase();
    let combined = match &file.parent_folder {
        Some(folder) if !name.contains(&folder.to_lowercase()) => {
            format!("{}_{}", folder.to_lowercase(), name)
        }
        _ => name,
    };
    combined.replace(' ', "_")
}

/// Claim a free name in `doc_dir`, looking at both this pass and the disk
///
/// A file already on disk with the same size is the same document from an
/// earlier pass and is overwritten rather than suffixed.
pub fn claim_document_name(
    index: &mut CollisionIndex,
    doc_dir: &Path,
    file: &StagedFile,
) -> OrganizeResult<String> {
    let name = document_name(file);
    let (stem, extension) = split_extension(&name);
    index.claim_next(doc_dir, stem, extension, |candidate| {
        std::fs::metadata(candidate).is_ok_and(|m| m.len() != file.size_bytes)
    })
}
