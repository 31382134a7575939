//! Prelude module for INEI Fetcher Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use inei_fetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use inei_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::new("endes", "./data")?
//!         .with_years([2021])
//!         .with_order_by(OrderBy::ByYear);
//!     let pipeline = Pipeline::inei(config, ClientConfig::default())?;
//!
//!     let catalog = pipeline.fetch_catalog().await?;
//!     let retrieval = pipeline.retrieve(&catalog).await?;
//!     println!("{} archives ready", retrieval.ready.len());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Pipeline stages and their values
pub use crate::app::{
    ArchiveFetcher,
    ArchiveRetriever,
    CatalogProvider,
    ClientConfig,
    FileOrganizer,
    FormatTag,
    IneiCatalogProvider,
    IneiClient,
    ModuleCatalog,
    ModuleCode,
    ModuleRecord,
    OrderBy,
    OrganizeOptions,
    OrganizeReport,
    OrganizedFile,
    Pipeline,
    PipelineConfig,
    PipelineReport,
    Retrieval,
    RetrievalReport,
    StagingArchive,
    SurveyConfig,
    SurveyLayout,
    TransferMode,
};

// Commonly used constants
pub use crate::constants::{DEFAULT_RATE_LIMIT_RPS, DEFAULT_WORKER_COUNT, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;
