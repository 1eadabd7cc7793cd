//! File-backed schema provider
//!
//! Loads a desired [`Database`] model from a JSON document. Useful for
//! pinning an expected schema in version control and for test fixtures.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::provider::SchemaProvider;
use crate::schema::types::Database;

/// Reads a schema model from a JSON file
pub struct FileSchemaProvider {
    path: PathBuf,
}

impl FileSchemaProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load and deserialize the model
    pub fn load(&self) -> Result<Database> {
        let contents = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::SchemaReadError(format!(
                "failed to parse schema model {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl SchemaProvider for FileSchemaProvider {
    async fn schema_model(&self) -> Result<Database> {
        self.load()
    }
}
