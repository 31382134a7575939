//! Command-line argument parsing for INEI Fetcher
//!
//! This module defines the CLI structure using clap derive macros. Every
//! flag that mirrors a configuration-file value is optional and, when
//! given, overrides the file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::catalog::{FormatTag, ModuleCode};
use crate::app::{OrderBy, PipelineConfig, TransferMode};
use crate::errors::{ConfigError, ConfigResult};

/// INEI Fetcher - Download and organize INEI survey microdata
#[derive(Parser, Debug)]
#[command(
    name = "inei_fetcher",
    version,
    about = "Download and organize INEI survey microdata (ENAHO, ENDES, ENAPRES)",
    long_about = "Discovers the modules INEI publishes for each survey year, downloads and extracts
their archives (skipping work already done), and reorganizes the extracted files
by module or by year with deduplicated documentation."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root directory for survey data
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build and save the module catalog, then list available modules
    Catalog(CatalogArgs),

    /// Build the catalog and download/extract the selected modules
    Download(DownloadArgs),

    /// Reorganize extracted files using the saved catalog
    Organize(OrganizeArgs),

    /// Catalog, download and organize in one go
    Run(RunArgs),
}

/// Survey and module selection shared by the commands
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Survey identifier (enaho, endes, enapres)
    #[arg(short, long)]
    pub survey: Option<String>,

    /// Years, e.g. "2015-2019,2021"
    #[arg(short, long, value_parser = parse_years)]
    pub years: Option<YearList>,

    /// Period code sent to the portal instead of the survey default
    #[arg(long)]
    pub period: Option<String>,

    /// Number of concurrent fetches
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,
}

/// Retrieval flags
#[derive(Args, Debug, Clone, Default)]
pub struct RetrievalArgs {
    /// Module codes to download, e.g. "1,2,37" (default: all)
    #[arg(short, long, value_delimiter = ',', value_parser = parse_module)]
    pub modules: Vec<ModuleCode>,

    /// Format preference, e.g. "stata,csv"
    #[arg(long, value_delimiter = ',', value_parser = parse_format)]
    pub formats: Vec<FormatTag>,

    /// Re-download and re-extract even if already present
    #[arg(short, long)]
    pub force: bool,

    /// Skip work already on disk even if the config sets force
    #[arg(long, conflicts_with = "force")]
    pub no_force: bool,

    /// Delete archives after extraction
    #[arg(long)]
    pub delete_archives: bool,

    /// Keep archives after extraction even if the config deletes them
    #[arg(long, conflicts_with = "delete_archives")]
    pub keep_archives: bool,
}

/// Reorganization flags
#[derive(Args, Debug, Clone, Default)]
pub struct OrganizeFlags {
    /// Layout of organized data: by-module or by-year
    #[arg(long, value_parser = parse_order_by)]
    pub order_by: Option<OrderBy>,

    /// Keep original file names and use first-wins numbering
    #[arg(long)]
    pub keep_original_names: bool,

    /// Rename data files after their module with size-ranked numbering
    #[arg(long, conflicts_with = "keep_original_names")]
    pub no_keep_original_names: bool,

    /// Move files out of the staging tree instead of copying
    #[arg(long = "move")]
    pub move_files: bool,

    /// Copy files, leaving the staging tree intact
    #[arg(long, conflicts_with = "move_files")]
    pub copy: bool,

    /// Documentation extensions, e.g. "pdf,docx"
    #[arg(long, value_delimiter = ',')]
    pub doc_extensions: Vec<String>,

    /// Skip documentation deduplication
    #[arg(long)]
    pub no_docs: bool,

    /// Collect documentation even if the config turns it off
    #[arg(long, conflicts_with = "no_docs")]
    pub docs: bool,
}

/// Arguments for the catalog command
#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Group availability by module name instead of code
    #[arg(long)]
    pub by_name: bool,
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    /// Show what would be downloaded without downloading
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the organize command
#[derive(Args, Debug, Clone)]
pub struct OrganizeArgs {
    /// Survey identifier (enaho, endes, enapres)
    #[arg(short, long)]
    pub survey: Option<String>,

    #[command(flatten)]
    pub organize: OrganizeFlags,
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    #[command(flatten)]
    pub organize: OrganizeFlags,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl GlobalArgs {
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(dir) = &self.output_dir {
            config.output_root = dir.clone();
        }
        config
    }
}

impl SelectionArgs {
    /// Layer the flags that were given over `config`
    pub fn apply(&self, mut config: PipelineConfig) -> ConfigResult<PipelineConfig> {
        if let Some(survey) = &self.survey {
            config.survey = survey.parse()?;
        }
        if let Some(YearList(years)) = &self.years {
            config.years = years.clone();
        }
        if self.period.is_some() {
            config.period = self.period.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;
        Ok(config)
    }
}

impl RetrievalArgs {
    pub fn apply(&self, mut config: PipelineConfig) -> ConfigResult<PipelineConfig> {
        if !self.modules.is_empty() {
            config.modules = self.modules.clone();
        }
        if !self.formats.is_empty() {
            config.formats = self.formats.clone();
        }
        if self.force {
            config.force = true;
        } else if self.no_force {
            config.force = false;
        }
        if self.delete_archives {
            config.keep_archive = false;
        } else if self.keep_archives {
            config.keep_archive = true;
        }
        config.validate()?;
        Ok(config)
    }
}

impl OrganizeFlags {
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(order_by) = self.order_by {
            config.organize.order_by = order_by;
        }
        if self.keep_original_names {
            config.organize.keep_original_names = true;
        } else if self.no_keep_original_names {
            config.organize.keep_original_names = false;
        }
        if self.move_files {
            config.organize.transfer_mode = TransferMode::Move;
        } else if self.copy {
            config.organize.transfer_mode = TransferMode::Copy;
        }
        if !self.doc_extensions.is_empty() {
            config.organize.documentation_extensions = self.doc_extensions.clone();
        }
        if self.no_docs {
            config.organize.organize_documentation = false;
        } else if self.docs {
            config.organize.organize_documentation = true;
        }
        config
    }
}

/// Sorted, deduplicated years from `--years`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearList(pub Vec<u16>);

/// Parse a year list such as "2015-2019,2021"
pub fn parse_years(raw: &str) -> Result<YearList, String> {
    let mut years = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let parse = |s: &str| {
            s.trim()
                .parse::<u16>()
                .map_err(|_| format!("'{}' is not a year", s.trim()))
        };
        match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(format!("Range {} is reversed", part));
                }
                years.extend(start..=end);
            }
            None => years.push(parse(part)?),
        }
    }

    if years.is_empty() {
        return Err("No years given".to_string());
    }
    years.sort_unstable();
    years.dedup();
    Ok(YearList(years))
}

fn config_error(e: ConfigError) -> String {
    e.to_string()
}

fn parse_module(raw: &str) -> Result<ModuleCode, String> {
    raw.parse().map_err(config_error)
}

fn parse_format(raw: &str) -> Result<FormatTag, String> {
    raw.parse().map_err(config_error)
}

fn parse_order_by(raw: &str) -> Result<OrderBy, String> {
    raw.parse().map_err(config_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_ranges() {
        assert_eq!(
            parse_years("2015-2017,2020").unwrap(),
            YearList(vec![2015, 2016, 2017, 2020])
        );
        assert_eq!(parse_years("2019, 2018,2019").unwrap(), YearList(vec![2018, 2019]));
        assert!(parse_years("2019-2015").is_err());
        assert!(parse_years("dos mil").is_err());
        assert!(parse_years(" , ").is_err());
    }

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from([
            "inei_fetcher",
            "--output-dir",
            "/srv/inei",
            "run",
            "--survey",
            "enaho",
            "--years",
            "2018-2019",
            "--modules",
            "1,34",
            "--formats",
            "csv,stata",
            "--order-by",
            "by-year",
            "--move",
            "--delete-archives",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        let config = PipelineConfig::new("enapres", "./data").unwrap();
        let config = cli.global.apply(config);
        let config = args.selection.apply(config).unwrap();
        let config = args.retrieval.apply(config).unwrap();
        let config = args.organize.apply(config);

        assert_eq!(config.survey.id, "enaho");
        assert_eq!(config.output_root, PathBuf::from("/srv/inei"));
        assert_eq!(config.years, vec![2018, 2019]);
        assert_eq!(
            config.modules,
            vec![ModuleCode::from_number(1), ModuleCode::from_number(34)]
        );
        assert_eq!(config.formats, vec![FormatTag::Csv, FormatTag::Stata]);
        assert!(!config.keep_archive);
        assert_eq!(config.organize.order_by, OrderBy::ByYear);
        assert_eq!(config.organize.transfer_mode, TransferMode::Move);
    }

    #[test]
    fn test_absent_flags_keep_config_values() {
        let config = PipelineConfig::new("endes", "./data")
            .unwrap()
            .with_workers(2)
            .with_keep_archive(false);

        let config = SelectionArgs::default().apply(config).unwrap();
        let config = RetrievalArgs::default().apply(config).unwrap();
        let config = OrganizeFlags::default().apply(config);

        assert_eq!(config.survey.id, "endes");
        assert_eq!(config.workers, 2);
        assert!(!config.keep_archive);
    }

    #[test]
    fn test_negated_flags_override_config_values() {
        let cli = Cli::try_parse_from([
            "inei_fetcher",
            "run",
            "--no-force",
            "--keep-archives",
            "--no-keep-original-names",
            "--copy",
            "--docs",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let config = PipelineConfig::new("enaho", "./data")
            .unwrap()
            .with_force(true)
            .with_keep_archive(false)
            .with_keep_original_names(true)
            .with_transfer_mode(TransferMode::Move)
            .with_organize_documentation(false);
        let config = args.retrieval.apply(config).unwrap();
        let config = args.organize.apply(config);

        assert!(!config.force);
        assert!(config.keep_archive);
        assert!(!config.organize.keep_original_names);
        assert_eq!(config.organize.transfer_mode, TransferMode::Copy);
        assert!(config.organize.organize_documentation);

        assert!(Cli::try_parse_from(["inei_fetcher", "run", "--move", "--copy"]).is_err());
        assert!(Cli::try_parse_from(["inei_fetcher", "download", "-f", "--no-force"]).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Cli::try_parse_from(["inei_fetcher", "download", "--formats", "xlsx"]).is_err());
        assert!(Cli::try_parse_from(["inei_fetcher", "download", "--modules", "abc"]).is_err());

        let selection = SelectionArgs {
            survey: Some("censo".to_string()),
            ..SelectionArgs::default()
        };
        let config = PipelineConfig::new("enaho", "./data").unwrap();
        assert!(matches!(
            selection.apply(config),
            Err(ConfigError::UnknownSurvey { .. })
        ));
    }

    #[test]
    fn test_catalog_by_name_flag() {
        let cli = Cli::try_parse_from(["inei_fetcher", "catalog", "-s", "enaho", "--by-name"]).unwrap();
        let Commands::Catalog(args) = cli.command else {
            panic!("expected catalog command");
        };
        assert!(args.by_name);
        assert_eq!(args.selection.survey.as_deref(), Some("enaho"));
    }

    #[test]
    fn test_log_level() {
        let quiet = Cli::try_parse_from(["inei_fetcher", "-q", "catalog"]).unwrap();
        let verbose = Cli::try_parse_from(["inei_fetcher", "catalog", "-v"]).unwrap();
        let default = Cli::try_parse_from(["inei_fetcher", "catalog"]).unwrap();

        assert_eq!(quiet.log_level(), Some(tracing::Level::ERROR));
        assert_eq!(verbose.log_level(), Some(tracing::Level::INFO));
        assert_eq!(default.log_level(), None);
    }
}
