//! Type definitions for database schema objects
//!
//! Both schema providers (live introspection and the desired-schema source)
//! produce the same model shapes; the comparator and the SQL builders only
//! ever see these types.

use serde::{Deserialize, Serialize};

/// Semantic type category of a column, independent of the dialect-native
/// spelling. Mirrors the JDBC type catalogue closely enough that providers
/// backed by driver metadata can map into it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCode {
    Char,
    Varchar,
    LongVarchar,
    Numeric,
    Decimal,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Boolean,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    Blob,
    Clob,
    Other,
}

/// Represents a complete database schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    pub tables: Vec<Table>,
}

impl Database {
    /// Create a new empty database model
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: Vec::new(),
        }
    }

    /// Add a table to the model
    pub fn add_table(&mut self, table: Table) {
        self.tables.push(table);
    }

    /// Find a table by name, honoring the configured case rule
    pub fn find_table(&self, name: &str, case_sensitive: bool) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| names_match(&t.name, name, case_sensitive))
    }

    /// Mutable variant of [`Database::find_table`]
    pub fn find_table_mut(&mut self, name: &str, case_sensitive: bool) -> Option<&mut Table> {
        self.tables
            .iter_mut()
            .find(|t| names_match(&t.name, name, case_sensitive))
    }
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub description: Option<String>,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Add an index to the table
    pub fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    /// Add a foreign key to the table
    pub fn add_foreign_key(&mut self, fk: ForeignKey) {
        self.foreign_keys.push(fk);
    }

    /// Find a column by name, honoring the configured case rule
    pub fn find_column(&self, name: &str, case_sensitive: bool) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| names_match(&c.name, name, case_sensitive))
    }

    /// Mutable variant of [`Table::find_column`]
    pub fn find_column_mut(&mut self, name: &str, case_sensitive: bool) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| names_match(&c.name, name, case_sensitive))
    }

    /// The columns flagged as primary key, in declaration order
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }
}

/// Represents a database column
///
/// A column always carries a generic [`TypeCode`], and may additionally carry
/// a raw type pair reported by the dialect: `raw_type` is the bare native
/// type name, `raw_complete_type` the fully parameterized rendering (e.g.
/// `NUMERIC(38,2)`). When the raw pair is absent the generic code and size
/// fields are authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub type_code: TypeCode,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub size: Option<u32>,
    pub scale: Option<u32>,
    pub default_value: Option<String>,
    pub description: Option<String>,
    pub raw_type: Option<String>,
    pub raw_complete_type: Option<String>,
}

impl Column {
    /// Create a new nullable column with the given name and type code
    pub fn new(name: &str, type_code: TypeCode) -> Self {
        Self {
            name: name.to_string(),
            type_code,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            size: None,
            scale: None,
            default_value: None,
            description: None,
            raw_type: None,
            raw_complete_type: None,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark the column as part of the primary key (implies not null)
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Set the declared size (or precision)
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the declared scale
    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Set a default value for the column
    pub fn default_value(mut self, default: &str) -> Self {
        self.default_value = Some(default.to_string());
        self
    }

    /// Set the raw type pair from a complete native rendering
    pub fn raw_complete_type(mut self, complete: &str) -> Self {
        self.raw_complete_type = Some(complete.to_string());
        self.raw_type = Some(strip_type_parameters(complete));
        self
    }

    /// The normalized type key used as the comparison identity for raw-typed
    /// columns: the complete raw type with any parenthesized parameter list
    /// stripped, or the bare raw type when no complete rendering is known.
    pub fn type_to_compare(&self) -> Option<String> {
        match &self.raw_complete_type {
            Some(complete) => Some(strip_type_parameters(complete)),
            None => self.raw_type.clone(),
        }
    }
}

/// Remove a parenthesized parameter list from a type rendering, keeping any
/// trailing qualifier: `TIMESTAMP(6) WITH TIME ZONE` becomes
/// `TIMESTAMP WITH TIME ZONE`, `NUMERIC(38,2)` becomes `NUMERIC`.
pub fn strip_type_parameters(complete: &str) -> String {
    match (complete.find('('), complete.find(')')) {
        (Some(open), Some(close)) if close > open => {
            let mut stripped = String::with_capacity(complete.len());
            stripped.push_str(complete[..open].trim_end());
            let rest = complete[close + 1..].trim_start();
            if !rest.is_empty() {
                stripped.push(' ');
                stripped.push_str(rest);
            }
            stripped
        }
        _ => complete.to_string(),
    }
}

/// Represents an index; a partial index carries its predicate in
/// `filter_condition` as a dialect-specific SQL fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub filter_condition: Option<String>,
}

impl Index {
    /// Create a non-unique index over the given columns
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
            filter_condition: None,
        }
    }

    /// Mark the index as unique
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Restrict the index with a partial-index predicate
    pub fn filter(mut self, condition: &str) -> Self {
        self.filter_condition = Some(condition.to_string());
        self
    }

    /// Structural equality under the configured case rule: two indexes match
    /// when name (if both named), column sequence, uniqueness, and filter
    /// condition all agree.
    pub fn matches(&self, other: &Index, case_sensitive: bool) -> bool {
        if self.unique != other.unique {
            return false;
        }
        match (&self.filter_condition, &other.filter_condition) {
            (Some(a), Some(b)) if !names_match(a, b, case_sensitive) => return false,
            (Some(_), None) | (None, Some(_)) => return false,
            _ => {}
        }
        let check_name = !self.name.is_empty() && !other.name.is_empty();
        if check_name && !names_match(&self.name, &other.name, case_sensitive) {
            return false;
        }
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| names_match(a, b, case_sensitive))
    }
}

/// A single `(local, foreign)` column pair of a foreign key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub local: String,
    pub foreign: String,
}

impl Reference {
    pub fn new(local: &str, foreign: &str) -> Self {
        Self {
            local: local.to_string(),
            foreign: foreign.to_string(),
        }
    }
}

/// Represents a foreign key constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub foreign_table: String,
    pub references: Vec<Reference>,
    pub to_primary_key: bool,
}

impl ForeignKey {
    /// Create a foreign key over the given `(local, foreign)` column pairs
    pub fn new(name: &str, foreign_table: &str, references: Vec<Reference>) -> Self {
        Self {
            name: name.to_string(),
            foreign_table: foreign_table.to_string(),
            references,
            to_primary_key: false,
        }
    }

    /// Structural equality under the configured case rule
    pub fn matches(&self, other: &ForeignKey, case_sensitive: bool) -> bool {
        let check_name = !self.name.is_empty() && !other.name.is_empty();
        if check_name && !names_match(&self.name, &other.name, case_sensitive) {
            return false;
        }
        names_match(&self.foreign_table, &other.foreign_table, case_sensitive)
            && self.references.len() == other.references.len()
            && self.references.iter().zip(&other.references).all(|(a, b)| {
                names_match(&a.local, &b.local, case_sensitive)
                    && names_match(&a.foreign, &b.foreign, case_sensitive)
            })
    }
}

/// Compare two identifiers under the configured case rule
pub fn names_match(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}
