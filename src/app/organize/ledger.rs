//! Record of which staged file each organized file came from
//!
//! Kept as `2_ordenado/.origen.json`. A later pass may replace a
//! destination only when it holds the same staged file; anything else on
//! disk is treated as occupied.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::files;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OriginLedger {
    /// Destination (relative to the organized root) to source (relative to
    /// the staging root)
    origins: BTreeMap<String, String>,
}

fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

impl OriginLedger {
    pub fn path_in(organized_root: &Path) -> PathBuf {
        organized_root.join(files::ORIGIN_LEDGER_FILE_NAME)
    }

    /// Read the ledger of `organized_root`
    ///
    /// A missing ledger is empty. An unreadable one is also treated as
    /// empty, which makes every existing destination count as occupied.
    pub fn load(organized_root: &Path) -> Self {
        let path = Self::path_in(organized_root);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&json) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("Ignoring corrupt {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Staged source recorded for `destination`
    pub fn source_of(&self, organized_root: &Path, destination: &Path) -> Option<&str> {
        self.origins
            .get(&relative_key(organized_root, destination))
            .map(String::as_str)
    }

    /// True if `destination` exists and was not produced from `source`
    pub fn is_occupied(
        &self,
        organized_root: &Path,
        staging_root: &Path,
        destination: &Path,
        source: &Path,
    ) -> bool {
        destination.exists()
            && self.source_of(organized_root, destination)
                != Some(relative_key(staging_root, source).as_str())
    }

    pub fn record(
        &mut self,
        organized_root: &Path,
        staging_root: &Path,
        destination: &Path,
        source: &Path,
    ) {
        self.origins.insert(
            relative_key(organized_root, destination),
            relative_key(staging_root, source),
        );
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Write the ledger, dropping entries whose destination is gone
    pub async fn save(&mut self, organized_root: &Path) -> std::io::Result<()> {
        self.origins
            .retain(|destination, _| organized_root.join(destination).is_file());

        let path = Self::path_in(organized_root);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::create_dir_all(organized_root).await?;
        tokio::fs::write(&path, json).await?;

        debug!("Recorded {} origin(s) in {}", self.len(), path.display());
        Ok(())
    }
}
