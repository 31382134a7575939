//! Command handlers for INEI Fetcher CLI
//!
//! This module implements the command handlers that layer CLI flags over
//! the loaded configuration and drive the pipeline stages.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::app::catalog::{ModuleAvailability, ModuleCatalog, NameAvailability};
use crate::app::{
    ArchiveFetcher, CatalogProvider, IneiCatalogProvider, IneiClient, OrganizeReport, Pipeline,
    PipelineConfig, RetrievalReport,
};
use crate::cli::{CatalogArgs, DownloadArgs, GlobalArgs, OrganizeArgs, RunArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

type IneiPipeline = Pipeline<IneiCatalogProvider, IneiClient>;

/// Maximum failures listed individually in a summary
const LISTED_FAILURES: usize = 10;

/// Handle the catalog command
///
/// Builds the catalog for the selected years, saves it next to the survey
/// data and prints which years each module is available in, per code or
/// with `--by-name` per module name.
pub async fn handle_catalog(app: &AppConfig, global: &GlobalArgs, args: CatalogArgs) -> Result<()> {
    let config = args.selection.apply(base_config(app, global)?)?;
    let pipeline = build_pipeline(app, config)?;

    let catalog = fetch_catalog(&pipeline, global.quiet).await?;
    if args.by_name {
        display_name_availability(&catalog.availability_by_name());
    } else {
        display_availability_table(&catalog.availability());
    }
    Ok(())
}

/// Handle the download command
///
/// Builds the catalog, then downloads and extracts every selected module.
/// With `--dry-run` only the selection and the chosen formats are listed.
pub async fn handle_download(
    app: &AppConfig,
    global: &GlobalArgs,
    args: DownloadArgs,
) -> Result<()> {
    let config = args.selection.apply(base_config(app, global)?)?;
    let config = args.retrieval.apply(config)?;
    let pipeline = build_pipeline(app, config)?;

    let catalog = fetch_catalog(&pipeline, global.quiet).await?;
    if args.dry_run {
        return display_dry_run(&pipeline, &catalog);
    }

    let report = retrieve(&pipeline, &catalog, global.quiet).await?;
    display_retrieval_summary(&report);
    Ok(())
}

/// Handle the organize command
///
/// Works from the catalog saved by an earlier `catalog` or `download` run,
/// so no network access is needed.
pub async fn handle_organize(
    app: &AppConfig,
    global: &GlobalArgs,
    args: OrganizeArgs,
) -> Result<()> {
    let mut config = base_config(app, global)?;
    if let Some(survey) = &args.survey {
        config.survey = survey.parse()?;
    }
    let config = args.organize.apply(config);

    let catalog_path = config.layout().catalog_path();
    if !catalog_path.exists() {
        return Err(AppError::generic(format!(
            "No saved catalog at {}. Run 'inei_fetcher catalog --survey {}' first",
            catalog_path.display(),
            config.survey.id
        )));
    }

    let pipeline = build_pipeline(app, config)?;
    let catalog = pipeline.load_catalog().await?;
    info!(
        "Loaded catalog with {} records from {}",
        catalog.len(),
        catalog_path.display()
    );

    let report = organize(&pipeline, &catalog, global.quiet, false).await?;
    display_organize_summary(&report, &pipeline);
    Ok(())
}

/// Handle the run command: catalog, retrieval and reorganization
pub async fn handle_run(app: &AppConfig, global: &GlobalArgs, args: RunArgs) -> Result<()> {
    let start_time = Instant::now();

    let config = args.selection.apply(base_config(app, global)?)?;
    let config = args.retrieval.apply(config)?;
    let config = args.organize.apply(config);
    let pipeline = build_pipeline(app, config)?;

    run_stages(&pipeline, global.quiet).await?;

    println!("\nTotal time: {:?}", start_time.elapsed());
    Ok(())
}

/// All three stages with their summaries; reorganization is skipped when
/// nothing was extracted
async fn run_stages<P, F>(
    pipeline: &Pipeline<P, F>,
    quiet: bool,
) -> Result<(RetrievalReport, OrganizeReport)>
where
    P: CatalogProvider + ?Sized,
    F: ArchiveFetcher + ?Sized,
{
    let catalog = fetch_catalog(pipeline, quiet).await?;
    let retrieval = retrieve(pipeline, &catalog, quiet).await?;
    display_retrieval_summary(&retrieval);

    let organized = organize(pipeline, &catalog, quiet, true).await?;
    display_organize_summary(&organized, pipeline);
    Ok((retrieval, organized))
}

/// Configuration file values with the global flags applied
fn base_config(app: &AppConfig, global: &GlobalArgs) -> Result<PipelineConfig> {
    let config = app.pipeline.to_runtime_config()?;
    Ok(global.apply(config))
}

fn build_pipeline(app: &AppConfig, config: PipelineConfig) -> Result<IneiPipeline> {
    info!(
        "Survey {} with {} workers, output under {}",
        config.survey.id,
        config.workers,
        config.output_root.display()
    );
    Pipeline::inei(config, app.client.to_runtime_config())
}

async fn fetch_catalog<P, F>(pipeline: &Pipeline<P, F>, quiet: bool) -> Result<ModuleCatalog>
where
    P: CatalogProvider + ?Sized,
    F: ArchiveFetcher + ?Sized,
{
    let config = pipeline.config();
    let years = config.effective_years();
    let spinner = spinner(
        quiet,
        format!(
            "Building {} catalog for {} year(s)...",
            config.survey.id,
            years.len()
        ),
    );

    let start_time = Instant::now();
    let result = pipeline.fetch_catalog().await;
    spinner.finish_and_clear();
    let catalog = result?;

    if catalog.is_empty() {
        warn!("Catalog for {} is empty", config.survey.id);
        println!(
            "⚠️  No modules found for {} in the requested years",
            config.survey.id
        );
    } else {
        println!(
            "📋 Catalog: {} records across {} years in {:?}, saved to {}",
            catalog.len(),
            catalog.years().len(),
            start_time.elapsed(),
            config.layout().catalog_path().display()
        );
    }
    Ok(catalog)
}

async fn retrieve<P, F>(
    pipeline: &Pipeline<P, F>,
    catalog: &ModuleCatalog,
    quiet: bool,
) -> Result<RetrievalReport>
where
    P: CatalogProvider + ?Sized,
    F: ArchiveFetcher + ?Sized,
{
    let config = pipeline.config();
    let selected = pipeline.select(catalog)?.len();
    let spinner = spinner(
        quiet,
        format!(
            "Retrieving {} module archives with {} workers...",
            selected, config.workers
        ),
    );

    let result = pipeline.retrieve(catalog).await;
    spinner.finish_and_clear();
    result
}

async fn organize<P, F>(
    pipeline: &Pipeline<P, F>,
    catalog: &ModuleCatalog,
    quiet: bool,
    only_if_staged: bool,
) -> Result<OrganizeReport>
where
    P: CatalogProvider + ?Sized,
    F: ArchiveFetcher + ?Sized,
{
    let spinner = spinner(
        quiet,
        format!(
            "Organizing files {}...",
            pipeline.config().organize.order_by
        ),
    );

    let result = if only_if_staged {
        pipeline.organize_if_staged(catalog).await
    } else {
        pipeline.organize(catalog).await
    };
    spinner.finish_and_clear();
    result
}

/// Steady-ticking spinner; hidden in quiet mode
fn spinner(quiet: bool, message: String) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["◐", "◓", "◑", "◒"]);
    spinner.set_style(style);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Display module availability as a clean table
fn display_availability_table(modules: &[ModuleAvailability]) {
    if modules.is_empty() {
        return;
    }

    let code_width = 6;
    let name_width = modules
        .iter()
        .map(|m| m.module_name.chars().count())
        .max()
        .unwrap_or(6)
        .clamp(6, 60);

    println!();
    println!(
        "{:<code_width$} {:<name_width$} Years",
        "Module",
        "Name",
        code_width = code_width,
        name_width = name_width
    );
    println!("{}", "─".repeat(code_width + name_width + 20));

    for module in modules {
        let name: String = module.module_name.chars().take(name_width).collect();
        let years: Vec<String> = module.years.iter().map(|y| y.to_string()).collect();
        println!(
            "{:<code_width$} {:<name_width$} {}",
            module.module_code.as_str(),
            name,
            years.join(", "),
            code_width = code_width,
            name_width = name_width
        );
    }
}

fn display_name_availability(modules: &[NameAvailability]) {
    if modules.is_empty() {
        return;
    }

    let name_width = modules
        .iter()
        .map(|m| m.module_name.chars().count())
        .max()
        .unwrap_or(6)
        .clamp(6, 60);

    println!();
    println!("{:<name_width$} Years", "Name", name_width = name_width);
    println!("{}", "─".repeat(name_width + 20));

    for module in modules {
        let name: String = module.module_name.chars().take(name_width).collect();
        let years: Vec<String> = module.years.iter().map(|y| y.to_string()).collect();
        println!(
            "{:<name_width$} {}",
            name,
            years.join(", "),
            name_width = name_width
        );
    }
}

fn display_dry_run(pipeline: &IneiPipeline, catalog: &ModuleCatalog) -> Result<()> {
    let config = pipeline.config();
    let layout = config.layout();
    let records = pipeline.select(catalog)?;

    println!("\n🔍 Dry run: {} module(s) selected", records.len());
    for record in records {
        let target = match record.locators.first_available(&config.formats) {
            Some((format, _)) => format.to_string(),
            None => "unavailable".to_string(),
        };
        println!(
            "  {} mod {} {:<12} {}",
            record.year,
            record.module_code,
            target,
            record.module_name
        );
    }
    println!("\nArchives would be stored in {}", layout.zips_dir().display());
    Ok(())
}

fn display_retrieval_summary(report: &RetrievalReport) {
    println!("\n📊 Retrieval Summary:");
    println!("  Ready: {}", report.ready.len());
    println!("  Downloaded: {}", report.downloaded_count());
    println!("  Extracted: {}", report.extracted_count());
    println!("  Unavailable in requested formats: {}", report.unavailable.len());
    println!("  Failed: {}", report.failed.len());

    if !report.failed.is_empty() {
        println!("\nFailures:");
        for failure in report.failed.iter().take(LISTED_FAILURES) {
            println!("  • {}: {}", failure.key, failure.error);
        }
        if report.failed.len() > LISTED_FAILURES {
            println!("  ... and {} more", report.failed.len() - LISTED_FAILURES);
        }
    }
}

fn display_organize_summary<P, F>(report: &OrganizeReport, pipeline: &Pipeline<P, F>)
where
    P: CatalogProvider + ?Sized,
    F: ArchiveFetcher + ?Sized,
{
    println!("\n📁 Organize Summary:");
    println!("  Data files: {}", report.data_count());
    println!("  Documentation files: {}", report.documentation_count());
    println!("  Duplicate documents skipped: {}", report.duplicate_documents);
    println!("  Unexpected layout: {}", report.unexpected_layout);
    println!("  Failed: {}", report.failures.len());
    println!(
        "  Output: {}",
        pipeline.config().layout().organized_root().display()
    );

    if !report.failures.is_empty() {
        println!("\nFailures:");
        for failure in report.failures.iter().take(LISTED_FAILURES) {
            println!("  • {}: {}", failure.source_path.display(), failure.error);
        }
        if report.failures.len() > LISTED_FAILURES {
            println!("  ... and {} more", report.failures.len() - LISTED_FAILURES);
        }
    }
}
