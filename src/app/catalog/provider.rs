//! Catalog providers
//!
//! The catalog builder only depends on the [`CatalogProvider`] trait. The
//! crate ships [`IneiCatalogProvider`], which drives the portal's period
//! form over an HTTP session.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::parser::parse_listing;
use super::survey::{current_year, SurveyConfig};
use super::types::CatalogRow;
use crate::app::client::IneiClient;
use crate::constants::inei;
use crate::errors::CatalogResult;

/// Source of per-year module listings
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Listing rows of `survey` for `year`
    ///
    /// Years outside the survey's supported range yield an empty listing,
    /// not an error.
    async fn fetch_year(&self, survey: &SurveyConfig, year: u16) -> CatalogResult<Vec<CatalogRow>>;
}

/// Catalog provider backed by the INEI portal form
#[derive(Debug)]
pub struct IneiCatalogProvider {
    client: Arc<IneiClient>,
    session: OnceCell<()>,
    period: Option<String>,
    current_year: u16,
}

impl IneiCatalogProvider {
    /// Create a provider sharing the given client
    pub fn new(client: Arc<IneiClient>) -> Self {
        Self {
            client,
            session: OnceCell::new(),
            period: None,
            current_year: current_year(),
        }
    }

    /// Request a specific period code instead of the survey default
    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    /// Override the clock used for the supported-year check
    pub fn with_current_year(mut self, year: u16) -> Self {
        self.current_year = year;
        self
    }

    /// Open the ASP session once; the cookie store keeps it afterwards
    async fn ensure_session(&self) -> CatalogResult<()> {
        self.session
            .get_or_try_init(|| async {
                let consulta = self.client.resolve(inei::CONSULTA_PATH)?;
                self.client.get_page(&consulta).await?;
                tracing::debug!("Opened portal session via {}", consulta);
                Ok::<(), crate::errors::CatalogError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogProvider for IneiCatalogProvider {
    async fn fetch_year(&self, survey: &SurveyConfig, year: u16) -> CatalogResult<Vec<CatalogRow>> {
        if !survey.supports_year(year, self.current_year) {
            tracing::warn!(
                "Year {} is outside the supported range for {} ({}..{})",
                year,
                survey.id,
                survey.first_year,
                self.current_year
            );
            return Ok(Vec::new());
        }

        self.ensure_session().await?;

        let endpoint = self.client.resolve(inei::CAMBIA_PERIODO_PATH)?;
        let referer = self.client.resolve(inei::CONSULTA_PATH)?;
        let body = survey.period_form_body(year, self.period.as_deref());

        tracing::info!("Fetching {} module listing for {}", survey.id, year);
        let html = self.client.post_form_page(&endpoint, &body, &referer).await?;

        let rows = parse_listing(&html, self.client.base_url())?;
        tracing::debug!("{} {}: {} listing rows", survey.id, year, rows.len());
        Ok(rows)
    }
}
