//! Application constants for INEI Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "INEI-Fetcher/0.1.0 (Survey Microdata Tool)";

    /// Default HTTP request timeout (archives can be large)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;
}

/// Rate limiting and retry configuration
pub mod limits {
    /// Default rate limit for INEI requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 4;

    /// Maximum retry attempts for failed requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Upper bound of the jitter applied by the rate limiter (milliseconds)
    pub const RATE_LIMIT_JITTER_MS: u64 = 100;
}

/// INEI microdata portal endpoints
pub mod inei {
    /// Portal base URL; listing hrefs are relative to it
    pub const BASE_URL: &str = "https://proyectos.inei.gob.pe/iinei/srienaho/";

    /// Page that opens the ASP session
    pub const CONSULTA_PATH: &str = "Consulta_por_Encuesta.asp";

    /// Form endpoint that switches survey/year/period and returns the listing
    pub const CAMBIA_PERIODO_PATH: &str = "cambiaPeriodo.asp";
}

/// Listing parsing constants
pub mod selectors {
    /// Listing table
    pub const TABLE_SELECTOR: &str = "table";

    /// Table rows
    pub const ROW_SELECTOR: &str = "tr";

    /// Table cells
    pub const CELL_SELECTOR: &str = "td";

    /// Anchors inside a cell
    pub const LINK_SELECTOR: &str = "a";
}

/// Catalog shape constants
pub mod catalog {
    /// Rows with fewer cells are malformed
    pub const MIN_ROW_CELLS: usize = 8;

    /// Index of the first download cell
    pub const FIRST_DOWNLOAD_CELL: usize = 8;

    /// Zero-padded width of module codes
    pub const MODULE_CODE_WIDTH: usize = 3;

    /// Saved catalog file name under the survey directory
    pub const CATALOG_FILE_NAME: &str = "catalog.json";
}

/// Directory names of the produced layout
pub mod layout {
    /// Raw archives
    pub const ZIPS_DIR: &str = "0_zips";

    /// Extracted staging tree
    pub const STAGING_DIR: &str = "1_unzipped";

    /// Organized output
    pub const ORGANIZED_DIR: &str = "2_ordenado";

    /// Module-first ordering
    pub const BY_MODULE_DIR: &str = "por_modulo";

    /// Year-first ordering
    pub const BY_YEAR_DIR: &str = "por_anio";

    /// Deduplicated documentation
    pub const DOCUMENTATION_DIR: &str = "documentacion";

    /// Infix of staging directory and archive names (`{year}_mod_{code}`)
    pub const STAGING_KEY_INFIX: &str = "_mod_";
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic downloads
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Suffix of extraction directories that are not yet complete
    pub const PARTIAL_DIR_SUFFIX: &str = ".partial";

    /// Origins of organized files, kept in the organized root
    pub const ORIGIN_LEDGER_FILE_NAME: &str = ".origen.json";

    /// Archive extension
    pub const ARCHIVE_EXTENSION: &str = "zip";

    /// Statistical data extensions (csv, spss, stata, dbf)
    pub const DATA_EXTENSIONS: [&str; 4] = ["csv", "sav", "dta", "dbf"];

    /// Default documentation extensions
    pub const DEFAULT_DOCUMENTATION_EXTENSIONS: [&str; 1] = ["pdf"];

    /// Files whose lowercased name contains this marker are lookup tables
    pub const EXCLUDED_NAME_MARKER: &str = "tabla";

    /// Placeholder for modules missing from the catalog
    pub const UNKNOWN_MODULE_NAME: &str = "unknown";

    /// Upper bound on suffix attempts when resolving a name collision
    pub const MAX_COLLISION_ATTEMPTS: usize = 10_000;
}

/// Worker and concurrency configuration
pub mod workers {
    /// Default number of concurrent fetch/retrieval tasks
    pub const DEFAULT_WORKER_COUNT: usize = 4;

    /// Maximum recommended concurrent tasks
    pub const MAX_WORKER_COUNT: usize = 16;
}

// Re-export commonly used constants for convenience
pub use http::USER_AGENT;
pub use inei::BASE_URL as INEI_BASE_URL;
pub use limits::{DEFAULT_RATE_LIMIT_RPS, MAX_RETRIES, RETRY_BASE_DELAY_MS};
pub use workers::DEFAULT_WORKER_COUNT;
