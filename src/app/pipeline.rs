//! End-to-end acquisition pipeline
//!
//! Catalog discovery, archive retrieval and reorganization, run in that
//! order. Every stage takes its inputs explicitly (the catalog is passed
//! in, paths come from the survey layout) so each can run on its own.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::archive::{ArchiveFetcher, ArchiveRetriever, RetrievalReport};
use crate::app::catalog::{
    survey::current_year, CatalogProvider, FormatTag, IneiCatalogProvider, ModuleCatalog,
    ModuleCode, ModuleRecord, SurveyConfig,
};
use crate::app::client::{ClientConfig, IneiClient};
use crate::app::layout::SurveyLayout;
use crate::app::organize::{FileOrganizer, OrderBy, OrganizeOptions, OrganizeReport, TransferMode};
use crate::constants::workers;
use crate::errors::{ConfigError, ConfigResult, Result};

/// Everything a pipeline run needs to know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub survey: SurveyConfig,
    /// Period code sent instead of the survey default
    pub period: Option<String>,
    /// Years to query; empty means every supported year
    pub years: Vec<u16>,
    /// Format preference, first match wins
    pub formats: Vec<FormatTag>,
    /// Module filter; empty means every module
    pub modules: Vec<ModuleCode>,
    pub force: bool,
    pub keep_archive: bool,
    pub output_root: PathBuf,
    pub workers: usize,
    pub organize: OrganizeOptions,
}

impl PipelineConfig {
    /// Defaults for a built-in survey
    pub fn new(survey: &str, output_root: impl Into<PathBuf>) -> ConfigResult<Self> {
        Ok(Self {
            survey: survey.parse()?,
            period: None,
            years: Vec::new(),
            formats: FormatTag::DEFAULT_PREFERENCE.to_vec(),
            modules: Vec::new(),
            force: false,
            keep_archive: true,
            output_root: output_root.into(),
            workers: workers::DEFAULT_WORKER_COUNT,
            organize: OrganizeOptions::default(),
        })
    }

    pub fn with_period(mut self, period: Option<String>) -> Self {
        self.period = period;
        self
    }

    pub fn with_years(mut self, years: impl IntoIterator<Item = u16>) -> Self {
        self.years = years.into_iter().collect();
        self
    }

    pub fn with_formats(mut self, formats: impl IntoIterator<Item = FormatTag>) -> Self {
        self.formats = formats.into_iter().collect();
        self
    }

    pub fn with_modules(mut self, modules: impl IntoIterator<Item = ModuleCode>) -> Self {
        self.modules = modules.into_iter().collect();
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_keep_archive(mut self, keep_archive: bool) -> Self {
        self.keep_archive = keep_archive;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.organize.order_by = order_by;
        self
    }

    pub fn with_keep_original_names(mut self, keep: bool) -> Self {
        self.organize.keep_original_names = keep;
        self
    }

    pub fn with_transfer_mode(mut self, mode: TransferMode) -> Self {
        self.organize.transfer_mode = mode;
        self
    }

    pub fn with_documentation_extensions(
        mut self,
        extensions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.organize.documentation_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_organize_documentation(mut self, enabled: bool) -> Self {
        self.organize.organize_documentation = enabled;
        self
    }

    /// Directory layout under the output root
    pub fn layout(&self) -> SurveyLayout {
        SurveyLayout::new(&self.output_root, &self.survey.id)
    }

    /// Requested years, or every year the survey can have data for
    pub fn effective_years(&self) -> Vec<u16> {
        if self.years.is_empty() {
            (self.survey.first_year..current_year()).collect()
        } else {
            self.years.clone()
        }
    }

    /// Reject settings no stage can work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.formats.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "formats".to_string(),
                value: String::new(),
                reason: "At least one format is required".to_string(),
            });
        }
        if self.workers == 0 || self.workers > workers::MAX_WORKER_COUNT {
            return Err(ConfigError::InvalidValue {
                field: "workers".to_string(),
                value: self.workers.to_string(),
                reason: format!("Must be between 1 and {}", workers::MAX_WORKER_COUNT),
            });
        }
        Ok(())
    }
}

/// Outcome of [`Pipeline::run`]
#[derive(Debug)]
pub struct PipelineReport {
    pub catalog_records: usize,
    pub retrieval: RetrievalReport,
    pub organize: OrganizeReport,
}

/// The three stages bound to a provider and a fetcher
pub struct Pipeline<P: ?Sized, F: ?Sized> {
    config: PipelineConfig,
    provider: Arc<P>,
    fetcher: Arc<F>,
}

impl Pipeline<IneiCatalogProvider, IneiClient> {
    /// Pipeline against the INEI portal, one HTTP client for both stages
    pub fn inei(config: PipelineConfig, client_config: ClientConfig) -> Result<Self> {
        let client = Arc::new(IneiClient::new(client_config)?);
        let mut provider = IneiCatalogProvider::new(client.clone());
        if let Some(period) = &config.period {
            provider = provider.with_period(period.clone());
        }
        Ok(Self::new(config, Arc::new(provider), client))
    }
}

impl<P, F> Pipeline<P, F>
where
    P: CatalogProvider + ?Sized,
    F: ArchiveFetcher + ?Sized,
{
    pub fn new(config: PipelineConfig, provider: Arc<P>, fetcher: Arc<F>) -> Self {
        Self {
            config,
            provider,
            fetcher,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn catalog_path(&self) -> PathBuf {
        self.config.layout().catalog_path()
    }

    /// Build the catalog and save it next to the survey data
    pub async fn fetch_catalog(&self) -> Result<ModuleCatalog> {
        self.config.validate()?;
        let catalog = ModuleCatalog::build(
            self.provider.as_ref(),
            &self.config.survey,
            &self.config.effective_years(),
            self.config.workers,
        )
        .await;

        catalog.save(&self.catalog_path()).await?;
        Ok(catalog)
    }

    /// Catalog saved by an earlier [`Self::fetch_catalog`]
    pub async fn load_catalog(&self) -> Result<ModuleCatalog> {
        Ok(ModuleCatalog::load(&self.catalog_path()).await?)
    }

    /// Records matching the module filter
    ///
    /// A non-empty filter that matches nothing is a configuration error.
    pub fn select<'a>(&self, catalog: &'a ModuleCatalog) -> ConfigResult<Vec<&'a ModuleRecord>> {
        let selected = catalog.select(&self.config.modules);
        if selected.is_empty() && !self.config.modules.is_empty() {
            return Err(ConfigError::NoMatchingModules {
                modules: self
                    .config
                    .modules
                    .iter()
                    .map(|m| m.to_string())
                    .collect(),
            });
        }
        Ok(selected)
    }

    /// Download and extract every selected module
    pub async fn retrieve(&self, catalog: &ModuleCatalog) -> Result<RetrievalReport> {
        self.config.validate()?;
        let records = self.select(catalog)?;
        let retriever = ArchiveRetriever::new(self.fetcher.clone(), self.config.layout());

        Ok(retriever
            .retrieve_all(
                &records,
                &self.config.formats,
                self.config.force,
                self.config.keep_archive,
                self.config.workers,
            )
            .await)
    }

    /// Reorganize the staging tree
    pub async fn organize(&self, catalog: &ModuleCatalog) -> Result<OrganizeReport> {
        let organizer = FileOrganizer::for_layout(&self.config.layout(), self.config.organize.clone());
        Ok(organizer.organize(catalog).await?)
    }

    /// Reorganize after a retrieval, or report nothing when retrieval left
    /// no staging tree
    pub async fn organize_if_staged(&self, catalog: &ModuleCatalog) -> Result<OrganizeReport> {
        if self.config.layout().staging_root().is_dir() {
            return self.organize(catalog).await;
        }

        warn!(
            "Nothing extracted for {}; skipping reorganization",
            self.config.survey.id
        );
        Ok(OrganizeReport::default())
    }

    /// Catalog, retrieval and reorganization in sequence
    ///
    /// Reorganization is skipped when retrieval left no staging tree.
    pub async fn run(&self) -> Result<PipelineReport> {
        let catalog = self.fetch_catalog().await?;
        let retrieval = self.retrieve(&catalog).await?;
        let organize = self.organize_if_staged(&catalog).await?;

        info!(
            "Pipeline finished for {}: {} catalog records, {} archives ready, {} files organized",
            self.config.survey.id,
            catalog.len(),
            retrieval.ready.len(),
            organize.files.len()
        );

        Ok(PipelineReport {
            catalog_records: catalog.len(),
            retrieval,
            organize,
        })
    }
}
