//! schema-patch: derives the SQL migration that carries a live database
//! schema to a desired one
//!
//! The engine compares two [`schema::Database`] models, produces an ordered
//! list of [`schema::Change`] values, and renders them as a DDL patch for the
//! target platform. Where the two models came from is a provider concern; the
//! crate ships a live PostgreSQL reader and treats any other source the same
//! as long as raw types were routed through the platform's type
//! reconciliation chain.

pub mod config;
pub mod error;
pub mod platform;
pub mod provider;
pub mod schema;
pub mod utils;

#[cfg(test)]
mod test;

// Re-export main types for easier access
pub use config::Config;
pub use error::{Error, Result};
pub use platform::{create_platform, Platform, PlatformInfo, SqlBuilder};
pub use provider::{FileSchemaProvider, PostgresSchemaReader, SchemaProvider};
pub use schema::{default_change_filter, Change, Database, ModelComparator, TypeMapping};

/// High-level entry point: diff two models and render the migration patch
pub struct MigrationGenerator {
    platform: Box<dyn Platform>,
    history_table: String,
}

impl MigrationGenerator {
    /// Create a generator for the given database product.
    ///
    /// Passing `None` for `type_mapping` selects the platform's default type
    /// reconciliation chain.
    pub fn new(driver: &str, type_mapping: Option<TypeMapping>) -> Result<Self> {
        Ok(Self {
            platform: create_platform(driver, type_mapping)?,
            history_table: "flyway_schema_history".to_string(),
        })
    }

    /// Create a generator from a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            platform: create_platform(&config.database.driver, None)?,
            history_table: config.schema.history_table.clone(),
        })
    }

    /// Override the migration bookkeeping table whose removal is never
    /// proposed
    pub fn with_history_table(mut self, table: &str) -> Self {
        self.history_table = table.to_string();
        self
    }

    /// The platform this generator targets
    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// Compare two models under the default change filter: column reorders
    /// and removal of the bookkeeping table are dropped.
    pub fn diff(&self, current: &Database, desired: &Database) -> Vec<Change> {
        let filter = default_change_filter(&self.history_table);
        self.platform.diff(current, desired, &filter)
    }

    /// Compare two models keeping only the changes accepted by `filter`
    pub fn diff_with_filter(
        &self,
        current: &Database,
        desired: &Database,
        filter: &dyn Fn(&Change) -> bool,
    ) -> Vec<Change> {
        self.platform.diff(current, desired, filter)
    }

    /// Render an already-computed change list as a DDL patch
    pub fn render_patch(
        &self,
        current: &Database,
        desired: &Database,
        changes: &[Change],
    ) -> Result<String> {
        let mut builder = self.platform.sql_builder();
        builder.write_sql_patch(current, desired, changes)
    }

    /// Complete workflow: diff the models and render the patch
    pub fn generate_migration_sql(&self, current: &Database, desired: &Database) -> Result<String> {
        let changes = self.diff(current, desired);
        if changes.is_empty() {
            tracing::info!("schema is already up to date");
            return Ok(String::new());
        }
        tracing::info!(changes = changes.len(), "rendering migration patch");
        self.render_patch(current, desired, &changes)
    }
}
