//! Schema model providers
//!
//! A provider produces a [`Database`] model from some source of truth: a live
//! database connection, an application's declared entities, or a file. The
//! comparison engine does not care where a model came from, only that raw
//! types were populated through the platform's type reconciliation chain so
//! both sides of a diff speak the same normalized vocabulary.

pub mod file;
pub mod postgres;

pub use file::FileSchemaProvider;
pub use postgres::PostgresSchemaReader;

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::typemap::TypeMapping;
use crate::schema::types::Database;

/// A source of desired or current schema models
#[async_trait]
pub trait SchemaProvider {
    /// Produce the schema model this provider describes
    async fn schema_model(&self) -> Result<Database>;

    /// The type reconciliation chain a current-schema reader should use so
    /// its models compare cleanly against this provider's output
    fn type_mapping(&self) -> TypeMapping {
        TypeMapping::new()
    }
}
