//! Core application logic for INEI Fetcher
//!
//! This module contains the acquisition pipeline: the portal client, module
//! catalog discovery, archive retrieval, reorganization of the extracted
//! files, and the pipeline that sequences them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use inei_fetcher::app::{ClientConfig, Pipeline, PipelineConfig};
//! use inei_fetcher::app::catalog::ModuleCode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new("enaho", "./data")?
//!     .with_years([2019, 2020])
//!     .with_modules([ModuleCode::from_number(1), ModuleCode::from_number(5)])
//!     .with_keep_archive(false);
//!
//! let pipeline = Pipeline::inei(config, ClientConfig::default())?;
//! let report = pipeline.run().await?;
//!
//! println!(
//!     "{} archives ready, {} files organized",
//!     report.retrieval.ready.len(),
//!     report.organize.files.len()
//! );
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod catalog;
pub mod client;
pub mod layout;
pub mod organize;
pub mod pipeline;

// Re-export main public API
pub use archive::{ArchiveFetcher, ArchiveRetriever, Retrieval, RetrievalReport, StagingArchive};
pub use catalog::{
    CatalogProvider, FormatTag, IneiCatalogProvider, ModuleCatalog, ModuleCode, ModuleRecord,
    SurveyConfig,
};
pub use client::{ClientConfig, IneiClient};
pub use layout::{StagingKey, SurveyLayout};
pub use organize::{
    FileOrganizer, OrderBy, OrganizeOptions, OrganizeReport, OrganizedFile, TransferMode,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);
        assert_eq!(OrganizeOptions::default().order_by, OrderBy::ByModule);
    }
}
