//! Catalog aggregation across years
//!
//! One provider call per year runs with bounded concurrency. Results are
//! merged in ascending year order, not completion order, so "first seen"
//! is the provider's own row order within a year.

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::provider::CatalogProvider;
use super::survey::SurveyConfig;
use super::types::{CatalogRow, ModuleCatalog, ModuleRecord};

impl ModuleCatalog {
    /// Build the catalog of `survey` for `years`
    ///
    /// At most `concurrency` fetches are in flight. A year whose fetch
    /// fails is logged and contributes no rows.
    pub async fn build<P>(provider: &P, survey: &SurveyConfig, years: &[u16], concurrency: usize) -> Self
    where
        P: CatalogProvider + ?Sized,
    {
        let mut years: Vec<u16> = years.to_vec();
        years.sort_unstable();
        years.dedup();

        info!(
            "Building {} catalog for {} year(s) with {} concurrent fetches",
            survey.id,
            years.len(),
            concurrency.max(1)
        );

        let mut fetched: Vec<(u16, Vec<CatalogRow>)> = stream::iter(years)
            .map(|year| async move {
                match provider.fetch_year(survey, year).await {
                    Ok(rows) => (year, rows),
                    Err(e) => {
                        warn!("Catalog fetch for {} {} failed: {}", survey.id, year, e);
                        (year, Vec::new())
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        fetched.sort_by_key(|(year, _)| *year);

        let mut catalog = ModuleCatalog::new();
        let mut duplicates = 0usize;
        for (_, rows) in fetched {
            for row in rows {
                if !catalog.insert(ModuleRecord::from(row)) {
                    duplicates += 1;
                }
            }
        }

        info!(
            "Catalog has {} module records ({} duplicate rows dropped)",
            catalog.len(),
            duplicates
        );
        catalog
    }
}
