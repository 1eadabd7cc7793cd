//! Utilities for schema-patch
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use naming::{constraint_name, quote_identifier, shorten_identifier};
