//! Type reconciliation chain
//!
//! A database's native type catalogue is richer than the generic type codes
//! a driver reports: boolean aliases, array conventions, domain types,
//! fixed-precision numerics. The chain normalizes a provider-reported raw
//! type name into the dialect's canonical complete rendering so that two
//! models populated from different sources compare cleanly.

use crate::schema::types::{strip_type_parameters, Column};
use std::collections::HashMap;

/// A processor applied to every column in registration order. It may rewrite
/// the column's raw complete type and may return a replacement for the
/// type-specific lookup key seen by later steps.
pub type GeneralProcessor = Box<dyn Fn(&str, &mut Column) -> Option<String> + Send + Sync>;

/// A processor applied to at most one column type, keyed by the
/// post-general-processing type name. Typically fills in parameters the
/// provider did not report inline (length, precision, scale).
pub type TypeProcessor = Box<dyn Fn(&mut Column) + Send + Sync>;

/// An ordered list of general processors plus a single keyed lookup of
/// type-specific processors. Invocations share no mutable state; each call
/// receives a column and rewrites it in place.
pub struct TypeMapping {
    general: Vec<GeneralProcessor>,
    by_type: HashMap<String, TypeProcessor>,
}

impl Default for TypeMapping {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMapping {
    /// Create an empty mapping; [`TypeMapping::map`] will still seed the raw
    /// type pair from the reported type name.
    pub fn new() -> Self {
        Self {
            general: Vec::new(),
            by_type: HashMap::new(),
        }
    }

    /// Register a general processor; later registrations see the rewrites of
    /// earlier ones. Every general processor always runs.
    pub fn with_general_processor(
        mut self,
        processor: impl Fn(&str, &mut Column) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.general.push(Box::new(processor));
        self
    }

    /// Register a type-specific processor for the given type name
    pub fn with_mapping(
        mut self,
        type_name: &str,
        processor: impl Fn(&mut Column) + Send + Sync + 'static,
    ) -> Self {
        self.by_type.insert(type_name.to_string(), Box::new(processor));
        self
    }

    /// Normalize a column reported with the given native type name.
    ///
    /// The raw type pair is seeded from `db_type`, every general processor
    /// runs in registration order, and finally exactly one type-specific
    /// processor is looked up with the (possibly rewritten) type key.
    pub fn map(&self, db_type: &str, mut column: Column) -> Column {
        column.raw_type = Some(db_type.to_string());
        column.raw_complete_type = Some(db_type.to_string());

        let mut key = db_type.to_string();
        for processor in &self.general {
            if let Some(rewritten) = processor(&key, &mut column) {
                key = rewritten;
            }
        }
        if let Some(processor) = self.by_type.get(&key) {
            processor(&mut column);
        }

        // keep the bare name in sync with whatever the chain produced
        if let Some(complete) = &column.raw_complete_type {
            column.raw_type = Some(strip_type_parameters(complete));
        }
        column
    }
}
