//! Error types for schema-patch

use thiserror::Error;

/// Result type for schema-patch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for schema-patch
///
/// Engine failures (`UnsupportedPlatform`, `InvalidModel`) are distinct from
/// provider-level failures, which pass through unchanged as `SqlxError`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported database platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid schema model: {0}")]
    InvalidModel(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Schema read error: {0}")]
    SchemaReadError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Formatting error: {0}")]
    FmtError(#[from] std::fmt::Error),
}

/// Convert TOML deserialization errors to schema-patch errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
