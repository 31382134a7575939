//! Configuration management for INEI Fetcher
//!
//! Settings come from built-in defaults, then an optional TOML file, then
//! command-line flags (applied by the CLI handlers). Every section of the
//! file is optional and missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::catalog::{FormatTag, ModuleCode};
use crate::app::{ClientConfig, OrderBy, PipelineConfig, TransferMode};
use crate::constants::{files, http, limits, workers};
use crate::errors::{AppError, ConfigError, ConfigResult, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Survey selection and pipeline behaviour
    pub pipeline: PipelineConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// TCP keep-alive timeout in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum connections per host
    pub pool_max_per_host: usize,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retries after transport errors, 429 and 503
    pub max_retries: u32,
    /// Base delay of the exponential backoff in milliseconds
    pub retry_base_delay_ms: u64,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: Some(30),
            tcp_nodelay: true,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay_ms: limits::RETRY_BASE_DELAY_MS,
        }
    }
}

/// TOML-friendly pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfigToml {
    /// Survey identifier (enaho, endes, enapres)
    pub survey: String,
    /// Period code overriding the survey default
    pub period: Option<String>,
    /// Root under which `{survey}/` is created
    pub output_root: PathBuf,
    /// Years to query (empty = every supported year)
    pub years: Vec<u16>,
    /// Format preference, first available wins
    pub formats: Vec<String>,
    /// Module codes to retrieve (empty = all)
    pub modules: Vec<String>,
    /// Re-download and re-extract even when present
    pub force: bool,
    /// Keep archives after extraction
    pub keep_archive: bool,
    /// by-module or by-year
    pub order_by: OrderBy,
    pub keep_original_names: bool,
    /// copy or move
    pub transfer_mode: TransferMode,
    pub documentation_extensions: Vec<String>,
    pub organize_documentation: bool,
    /// Concurrent catalog fetches and retrievals
    pub workers: usize,
}

impl Default for PipelineConfigToml {
    fn default() -> Self {
        Self {
            survey: "enaho".to_string(),
            period: None,
            output_root: PathBuf::from("./data"),
            years: Vec::new(),
            formats: FormatTag::DEFAULT_PREFERENCE
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
            modules: Vec::new(),
            force: false,
            keep_archive: true,
            order_by: OrderBy::default(),
            keep_original_names: false,
            transfer_mode: TransferMode::default(),
            documentation_extensions: files::DEFAULT_DOCUMENTATION_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            organize_documentation: true,
            workers: workers::DEFAULT_WORKER_COUNT,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, or the first one found)
    ///
    /// CLI flags are layered on top by the command handlers.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => Ok(Self::default()),
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![
            // Project-local config
            PathBuf::from("./inei-fetcher.toml"),
            PathBuf::from("./config.toml"),
        ];
        // User config
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Per-user config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("inei-fetcher").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::generic(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::InvalidFormat)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            rate_limit_rps: self.rate_limit_rps,
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

impl PipelineConfigToml {
    /// Convert to a validated runtime PipelineConfig
    pub fn to_runtime_config(&self) -> ConfigResult<PipelineConfig> {
        let formats = self
            .formats
            .iter()
            .map(|f| f.parse::<FormatTag>())
            .collect::<ConfigResult<Vec<_>>>()?;
        let modules = self
            .modules
            .iter()
            .map(|m| m.parse::<ModuleCode>())
            .collect::<ConfigResult<Vec<_>>>()?;

        let config = PipelineConfig::new(&self.survey, self.output_root.clone())?
            .with_period(self.period.clone())
            .with_years(self.years.iter().copied())
            .with_formats(formats)
            .with_modules(modules)
            .with_force(self.force)
            .with_keep_archive(self.keep_archive)
            .with_order_by(self.order_by)
            .with_keep_original_names(self.keep_original_names)
            .with_transfer_mode(self.transfer_mode)
            .with_documentation_extensions(self.documentation_extensions.iter().cloned())
            .with_organize_documentation(self.organize_documentation)
            .with_workers(self.workers);

        config.validate()?;
        Ok(config)
    }
}
