//! Runtime settings.
//!
//! Precedence, highest first: command-line flag or its environment variable,
//! then the optional YAML config file, then the built-in defaults below.
//!
//! ```yaml
//! base_url: https://www.boxofficemojo.com/weekly
//! staging_path: /tmp/boxoffice.txt
//! database_path: /tmp/boxoffice.db
//! user_agent: box_office_etl/0.1.0
//! ```

use crate::cli::Cli;
use crate::errors::PipelineError;
use crate::models::RunContext;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

pub const DEFAULT_BASE_URL: &str = "https://www.boxofficemojo.com/weekly";
pub const DEFAULT_STAGING_PATH: &str = "/tmp/boxoffice.txt";
pub const DEFAULT_DATABASE_PATH: &str = "/tmp/boxoffice.db";

/// Contents of a config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub staging_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub user_agent: Option<String>,
}

impl FileConfig {
    /// Read and parse a YAML config file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        let config = Self::from_yaml(&text)?;
        info!("Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, PipelineError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }
}

/// Fully resolved settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub staging_path: PathBuf,
    pub database_path: PathBuf,
    pub user_agent: String,
}

impl Settings {
    /// Layer CLI values over the config file (if any) over defaults.
    pub async fn resolve(cli: &Cli) -> Result<Self, PipelineError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path).await?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(cli, file))
    }

    fn merge(cli: &Cli, file: FileConfig) -> Self {
        Self {
            base_url: cli
                .base_url
                .clone()
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            staging_path: cli
                .staging_path
                .clone()
                .or(file.staging_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_PATH)),
            database_path: cli
                .database_path
                .clone()
                .or(file.database_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            user_agent: cli
                .user_agent
                .clone()
                .or(file.user_agent)
                .unwrap_or_else(|| {
                    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
                }),
        }
    }
}

/// The run key: explicit `--year`/`--week` if given, otherwise today's ISO week.
pub fn run_context(cli: &Cli) -> Result<RunContext, PipelineError> {
    match (cli.year, cli.week) {
        (Some(year), Some(week)) => RunContext::new(year, week),
        (None, None) => Ok(RunContext::current()),
        _ => Err(PipelineError::Config(
            "--year and --week must be given together".to_string(),
        )),
    }
}
