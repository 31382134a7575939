//! INEI Fetcher CLI application
//!
//! Command-line interface for downloading and organizing INEI survey
//! microdata. Features concurrent retrieval, idempotent re-runs and
//! collision-free reorganization.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use inei_fetcher::cli::{
    handle_catalog, handle_download, handle_organize, handle_run, Cli, Commands,
};
use inei_fetcher::config::AppConfig;
use inei_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let app_config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &app_config);

    info!("INEI Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Catalog(args) => {
            info!("Executing catalog command");
            handle_catalog(&app_config, &cli.global, args).await
        }
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(&app_config, &cli.global, args).await
        }
        Commands::Organize(args) => {
            info!("Executing organize command");
            handle_organize(&app_config, &cli.global, args).await
        }
        Commands::Run(args) => {
            info!("Executing run command");
            handle_run(&app_config, &cli.global, args).await
        }
    }
}

/// Initialize logging from the CLI verbosity flags, falling back to the
/// configured level
fn init_logging(cli: &Cli, app_config: &AppConfig) {
    let level = match cli.log_level() {
        Some(level) => level.to_string().to_lowercase(),
        None => app_config.logging.level.clone(),
    };

    let filter = EnvFilter::from_default_env();
    let filter = match format!("inei_fetcher={}", level).parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(e) => {
            eprintln!("Ignoring invalid log level '{}': {}", level, e);
            filter
        }
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
