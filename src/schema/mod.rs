//! Schema model, comparison, and change taxonomy

pub mod change;
pub mod comparator;
pub mod typemap;
pub mod types;

// Re-export key types
pub use change::{default_change_filter, Change};
pub use comparator::ModelComparator;
pub use typemap::TypeMapping;
pub use types::{Column, Database, ForeignKey, Index, Reference, Table, TypeCode};
