//! Configuration handling for schema-patch

use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{Error, Result};

/// Load configuration from a TOML file
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete schema-patch configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub schema: SchemaConfig,
    pub logging: Option<LoggingConfig>,
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Database product name, e.g. `postgresql`
    pub driver: String,
    pub url: String,
    pub pool_size: Option<u32>,
    /// Schema to introspect; defaults to `public`
    pub schema: Option<String>,
}

/// Comparison and rendering behavior configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchemaConfig {
    /// Whether identifier comparison is case-sensitive
    #[serde(default)]
    pub case_sensitive: bool,
    /// Migration bookkeeping table whose removal is never proposed
    #[serde(default = "default_history_table")]
    pub history_table: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            history_table: default_history_table(),
        }
    }
}

fn default_history_table() -> String {
    "flyway_schema_history".to_string()
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}
