//! Dialect-specific platform implementations
//!
//! A platform bundles the comparison rules for a database product
//! ([`PlatformInfo`]), the type reconciliation chain its providers use, and
//! the SQL builder that renders a change list to DDL. The engine targets one
//! platform per invocation.

pub mod postgres;

pub use postgres::PostgresPlatform;

use crate::error::{Error, Result};
use crate::schema::change::Change;
use crate::schema::comparator::ModelComparator;
use crate::schema::typemap::TypeMapping;
use crate::schema::types::{Column, Database, TypeCode};

/// Comparison and rendering parameters of a database product
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    /// Longest identifier the dialect accepts; longer names are shortened
    /// deterministically before quoting
    pub max_identifier_length: usize,
    /// Whether identifier comparison is case-sensitive
    pub case_sensitive: bool,
    /// Type categories whose declared size participates in comparison.
    /// Dialect configuration, not a universal constant.
    pub size_bearing_type_codes: Vec<TypeCode>,
}

impl PlatformInfo {
    /// Whether a declared size is meaningful for the given type category
    pub fn has_size(&self, type_code: TypeCode) -> bool {
        self.size_bearing_type_codes.contains(&type_code)
    }
}

/// Renders an ordered change list into one textual DDL patch
pub trait SqlBuilder {
    /// Render the patch that transforms `current` into `desired`.
    ///
    /// A working clone of `current` is mutated as each change is applied so
    /// later statements see a schema state consistent with the statements
    /// already rendered.
    fn write_sql_patch(
        &mut self,
        current: &Database,
        desired: &Database,
        changes: &[Change],
    ) -> Result<String>;

    /// The dialect rendering of a column's type: the raw complete type when
    /// present, otherwise the generic rendering for its type code and size
    fn sql_type(&self, column: &Column) -> String;
}

/// A database product the engine can target
pub trait Platform {
    /// Product name, e.g. `postgresql`
    fn name(&self) -> &'static str;

    /// Comparison rules for this product
    fn info(&self) -> &PlatformInfo;

    /// The type reconciliation chain providers should use when populating
    /// raw types for this platform
    fn type_mapping(&self) -> &TypeMapping;

    /// A fresh SQL builder for this product
    fn sql_builder(&self) -> Box<dyn SqlBuilder>;

    /// Compare two models under this platform's rules and keep the changes
    /// accepted by `filter`
    fn diff(
        &self,
        current: &Database,
        desired: &Database,
        filter: &dyn Fn(&Change) -> bool,
    ) -> Vec<Change> {
        let comparator = ModelComparator::new(self.info().clone());
        comparator
            .compare(current, desired)
            .into_iter()
            .filter(|c| filter(c))
            .collect()
    }
}

/// Look up the platform implementation for a database product name.
///
/// Passing `None` for `type_mapping` selects the platform's default chain.
pub fn create_platform(
    product_name: &str,
    type_mapping: Option<TypeMapping>,
) -> Result<Box<dyn Platform>> {
    let lowered = product_name.to_lowercase();
    if lowered.starts_with("postgres") {
        Ok(Box::new(PostgresPlatform::new(type_mapping)))
    } else if lowered == "h2" {
        tracing::warn!("using PostgreSQL platform for H2");
        Ok(Box::new(PostgresPlatform::new(type_mapping)))
    } else {
        tracing::error!(product = %product_name, "unknown platform");
        Err(Error::UnsupportedPlatform(product_name.to_string()))
    }
}
