//! Module catalog discovery
//!
//! Scrapes the per-year module listings of a survey and aggregates them
//! into a deduplicated, indexed [`ModuleCatalog`].
//!
//! - [`types`] - module codes, format tags, locators, records and the catalog
//! - [`survey`] - per-survey portal parameters
//! - [`parser`] - listing HTML to rows
//! - [`provider`] - the provider trait and the portal implementation
//! - `builder` - bounded-concurrency aggregation across years

mod builder;
pub mod parser;
pub mod provider;
pub mod survey;
pub mod types;

#[cfg(test)]
mod tests;

pub use parser::parse_listing;
pub use provider::{CatalogProvider, IneiCatalogProvider};
pub use survey::SurveyConfig;
pub use types::{
    CatalogRow, FormatTag, Locators, ModuleAvailability, ModuleCatalog, ModuleCode, ModuleRecord,
    NameAvailability,
};
