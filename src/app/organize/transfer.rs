//! Copy or move of a single planned file

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{OrganizeError, OrganizeResult};

/// How files leave the staging tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Staging tree stays intact
    #[default]
    Copy,
    /// Staging files are consumed
    Move,
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "copy"),
            Self::Move => write!(f, "move"),
        }
    }
}

impl std::str::FromStr for TransferMode {
    type Err = crate::errors::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "move" => Ok(Self::Move),
            _ => Err(crate::errors::ConfigError::InvalidValue {
                field: "transfer_mode".to_string(),
                value: s.to_string(),
                reason: "Expected 'copy' or 'move'".to_string(),
            }),
        }
    }
}

/// Materialize `source` at `destination`, creating parents as needed
///
/// A move that cannot rename (different filesystem) copies and then
/// removes the source.
pub async fn transfer(source: &Path, destination: &Path, mode: TransferMode) -> OrganizeResult<()> {
    let failed = |e: std::io::Error| OrganizeError::Transfer {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        source: e,
    };

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }

    match mode {
        TransferMode::Copy => {
            tokio::fs::copy(source, destination).await.map_err(failed)?;
        }
        TransferMode::Move => {
            if let Err(e) = tokio::fs::rename(source, destination).await {
                debug!(
                    "Rename of {} failed ({}), copying instead",
                    source.display(),
                    e
                );
                tokio::fs::copy(source, destination).await.map_err(failed)?;
                tokio::fs::remove_file(source).await.map_err(failed)?;
            }
        }
    }
    Ok(())
}
