//! Archive retrieval
//!
//! - [`retriever`] - idempotent download + extraction per (year, module)
//! - [`extract`] - ZIP expansion into a staging directory

pub mod extract;
pub mod retriever;

#[cfg(test)]
mod tests;

pub use extract::ZipExtractor;
pub use retriever::{
    ArchiveFetcher, ArchiveRetriever, Retrieval, RetrievalFailure, RetrievalReport,
    StagingArchive,
};
