use crate::core::db::OpenOptions;
use crate::core::{BindingError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub logging: Option<LoggingConfig>,
}

/// Database-related configuration.
#[derive(Debug, Default, Deserialize)]
pub struct DatabaseConfig {
    pub path: Option<String>,
    #[serde(flatten)]
    pub open: OpenOptions,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl Config {
    /// The configured log level, `info` when unset.
    pub fn log_level(&self) -> Result<Level> {
        match self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            None => Ok(Level::INFO),
            Some(level) => level
                .parse()
                .map_err(|_| BindingError::Config(format!("unknown log level `{}`", level))),
        }
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = sqlite3_db::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| BindingError::Config(e.to_string()))
}

/// `<config dir>/sqlite3-db/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sqlite3-db").join("config.toml"))
}
