//! Error types for INEI Fetcher
//!
//! This module defines the error types for every stage of the acquisition
//! pipeline. Errors carry enough context (paths, URLs, years, module codes)
//! to be logged at the unit boundary where they are caught.

use std::path::PathBuf;
use thiserror::Error;

/// Download and HTTP client errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Resource not found
    #[error("Resource not found: {url}")]
    NotFound { url: String },

    /// Access forbidden
    #[error("Access forbidden: {url}")]
    Forbidden { url: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Body shorter than the announced Content-Length
    #[error("Incomplete download: received {received} bytes, expected {expected} bytes")]
    IncompleteDownload { received: u64, expected: u64 },

    /// Invalid client configuration
    #[error("Invalid client configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

/// Catalog discovery errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Transport failure while fetching a listing page
    #[error("Catalog request failed: {0}")]
    Download(#[from] DownloadError),

    /// CSS selector error
    #[error("Invalid CSS selector: {selector}")]
    InvalidSelector { selector: String },

    /// Saved catalog could not be read or written
    #[error("Catalog file error for {path}: {reason}")]
    Storage { path: PathBuf, reason: String },
}

/// Archive retrieval and extraction errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The archive download failed
    #[error("Download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: DownloadError,
    },

    /// The archive could not be opened or expanded
    #[error("Extraction of {archive} failed: {reason}")]
    ExtractionFailed { archive: PathBuf, reason: String },

    /// Filesystem error while preparing or cleaning staging paths
    #[error("Staging I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Blocking extraction task did not complete
    #[error("Extraction task for {archive} aborted: {reason}")]
    TaskAborted { archive: PathBuf, reason: String },
}

/// File reorganization errors
#[derive(Error, Debug)]
pub enum OrganizeError {
    /// Staging root missing or unreadable
    #[error("Staging directory not accessible: {path}")]
    StagingNotAccessible { path: PathBuf },

    /// Walking the staging tree failed
    #[error("Failed to walk staging tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// No free destination name within the attempt budget
    #[error("Could not find a free name for {name} in {folder} after {attempts} attempts")]
    CollisionUnresolved {
        folder: PathBuf,
        name: String,
        attempts: usize,
    },

    /// Copy or move failed
    #[error("Transfer {source_path} -> {destination} failed: {source}")]
    Transfer {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic filesystem error
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Unknown survey identifier
    #[error("Unknown survey '{survey}'. Supported surveys: {supported}")]
    UnknownSurvey { survey: String, supported: String },

    /// Unknown download format tag
    #[error("Unknown format '{format}'. Expected one of: stata, spss, csv, dbf")]
    UnknownFormat { format: String },

    /// Module filter matched nothing in the catalog
    #[error("None of the requested modules {modules:?} exist in the catalog")]
    NoMatchingModules { modules: Vec<String> },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Archive error
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Organize error
    #[error(transparent)]
    Organize(#[from] OrganizeError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Download(DownloadError::RateLimitExceeded)
            | AppError::Download(DownloadError::ServerOverloaded)
            | AppError::Download(DownloadError::Http(_))
            | AppError::Download(DownloadError::IncompleteDownload { .. })
            | AppError::Catalog(CatalogError::Download(_)) => true,

            AppError::Archive(ArchiveError::Download { source, .. }) => matches!(
                source,
                DownloadError::Http(_)
                    | DownloadError::RateLimitExceeded
                    | DownloadError::ServerOverloaded
                    | DownloadError::IncompleteDownload { .. }
            ),

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Download(_) => "download",
            AppError::Catalog(_) => "catalog",
            AppError::Archive(_) => "archive",
            AppError::Organize(_) => "organize",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Archive result type alias
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Organize result type alias
pub type OrganizeResult<T> = std::result::Result<T, OrganizeError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
