//! Aggregation tests for the catalog builder
//!
//! A scripted provider stands in for the portal so fan-out, deduplication
//! and partial failure can be checked without network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::app::catalog::{
    CatalogProvider, CatalogRow, FormatTag, ModuleCatalog, ModuleCode, SurveyConfig,
};
use crate::errors::{CatalogError, CatalogResult, DownloadError};

/// Provider answering from a fixed script, tracking concurrency
#[derive(Default)]
struct ScriptedProvider {
    rows: HashMap<u16, Vec<CatalogRow>>,
    failing_years: Vec<u16>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    fn with_year(mut self, year: u16, rows: Vec<CatalogRow>) -> Self {
        self.rows.insert(year, rows);
        self
    }

    fn failing(mut self, year: u16) -> Self {
        self.failing_years.push(year);
        self
    }
}

#[async_trait]
impl CatalogProvider for ScriptedProvider {
    async fn fetch_year(&self, _survey: &SurveyConfig, year: u16) -> CatalogResult<Vec<CatalogRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // later years answer first so completion order differs from year order
        tokio::time::sleep(Duration::from_millis(u64::from(2030 - year.min(2030)) * 2)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_years.contains(&year) {
            return Err(CatalogError::Download(DownloadError::ServerError { status: 500 }));
        }
        Ok(self.rows.get(&year).cloned().unwrap_or_default())
    }
}

fn row(year: u16, code: u32, name: &str) -> CatalogRow {
    CatalogRow {
        sequence: code.to_string(),
        year,
        period: "Anual".to_string(),
        survey_code: "55".to_string(),
        survey_name: "ENAHO".to_string(),
        module_code: ModuleCode::from_number(code),
        module_name: name.to_string(),
        ficha: None,
        links: vec![(
            FormatTag::Stata,
            Url::parse(&format!("https://example.com/STATA/{}-{}.zip", year, code)).unwrap(),
        )],
    }
}

fn enaho() -> SurveyConfig {
    SurveyConfig::builtin("enaho").unwrap()
}

#[tokio::test]
async fn test_duplicate_rows_collapse_to_one_record() {
    let provider = ScriptedProvider::default().with_year(
        2014,
        vec![
            row(2014, 1, "Vivienda"),
            row(2014, 1, "Vivienda"),
            row(2014, 2, "Hogar"),
        ],
    );

    let catalog = ModuleCatalog::build(&provider, &enaho(), &[2014], 2).await;

    assert_eq!(catalog.len(), 2);
    assert!(catalog.get(2014, &ModuleCode::from_number(1)).is_some());
    assert!(catalog.get(2014, &ModuleCode::from_number(2)).is_some());
}

#[tokio::test]
async fn test_conflicting_names_keep_first_seen() {
    let provider = ScriptedProvider::default().with_year(
        2015,
        vec![row(2015, 3, "Educación"), row(2015, 3, "Educacion (rev)")],
    );

    let catalog = ModuleCatalog::build(&provider, &enaho(), &[2015], 1).await;

    assert_eq!(catalog.len(), 1);
    assert_eq!(
        catalog.module_name(2015, &ModuleCode::from_number(3)),
        Some("Educación")
    );
}

#[tokio::test]
async fn test_failed_year_does_not_abort_build() {
    let provider = ScriptedProvider::default()
        .with_year(2014, vec![row(2014, 1, "Vivienda")])
        .with_year(2015, vec![row(2015, 1, "Vivienda")])
        .with_year(2016, vec![row(2016, 1, "Vivienda"), row(2016, 5, "Empleo")])
        .failing(2015);

    let catalog = ModuleCatalog::build(&provider, &enaho(), &[2014, 2015, 2016], 3).await;

    assert_eq!(catalog.years(), vec![2014, 2016]);
    assert_eq!(catalog.len(), 3);
    assert!(catalog.get(2015, &ModuleCode::from_number(1)).is_none());
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let mut provider = ScriptedProvider::default();
    for year in 2010..2020 {
        provider = provider.with_year(year, vec![row(year, 1, "Vivienda")]);
    }
    let years: Vec<u16> = (2010..2020).collect();

    let catalog = ModuleCatalog::build(&provider, &enaho(), &years, 3).await;

    assert_eq!(catalog.len(), 10);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 10);
    assert!(provider.max_in_flight.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_merge_order_is_by_year_not_completion() {
    let provider = ScriptedProvider::default()
        .with_year(2012, vec![row(2012, 1, "Vivienda")])
        .with_year(2018, vec![row(2018, 1, "Vivienda")]);

    let catalog = ModuleCatalog::build(&provider, &enaho(), &[2018, 2012, 2018], 2).await;

    let years: Vec<u16> = catalog.iter().map(|r| r.year).collect();
    assert_eq!(years, vec![2012, 2018]);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}
