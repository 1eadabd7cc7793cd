//! Schema model comparator
//!
//! Walks a current ("source") and a desired ("target") model and emits the
//! ordered list of changes that transforms one into the other. Tables and
//! columns are processed in the target model's declared order so a given
//! pair of models always produces the same change list.

use crate::platform::PlatformInfo;
use crate::schema::change::Change;
use crate::schema::types::{names_match, Column, Database, Table};

/// Compares two schema models under a platform's comparison rules
pub struct ModelComparator {
    info: PlatformInfo,
}

impl ModelComparator {
    /// Create a comparator for the given platform rules
    pub fn new(info: PlatformInfo) -> Self {
        Self { info }
    }

    fn case_sensitive(&self) -> bool {
        self.info.case_sensitive
    }

    /// Produce the ordered list of differences between `source` and `target`
    pub fn compare(&self, source: &Database, target: &Database) -> Vec<Change> {
        let cs = self.case_sensitive();
        let mut changes = Vec::new();

        for target_table in &target.tables {
            match source.find_table(&target_table.name, cs) {
                None => {
                    tracing::debug!(table = %target_table.name, "table only in target model");
                    let mut added = target_table.clone();
                    let foreign_keys = std::mem::take(&mut added.foreign_keys);
                    changes.push(Change::AddTable { table: added });
                    for fk in foreign_keys {
                        changes.push(Change::AddForeignKey {
                            table_name: target_table.name.clone(),
                            foreign_key: fk,
                        });
                    }
                }
                Some(source_table) => {
                    changes.extend(self.compare_tables(source_table, target_table));
                }
            }
        }

        for source_table in &source.tables {
            if target.find_table(&source_table.name, cs).is_none() {
                changes.push(Change::RemoveTable {
                    table_name: source_table.name.clone(),
                });
            }
        }

        changes
    }

    /// Compare two same-named tables
    fn compare_tables(&self, source: &Table, target: &Table) -> Vec<Change> {
        let cs = self.case_sensitive();
        let mut changes = Vec::new();

        if target.primary_key_columns().is_empty() {
            tracing::warn!(table = %target.name, "table has no primary key");
        }

        for fk in &source.foreign_keys {
            if !target.foreign_keys.iter().any(|t| t.matches(fk, cs)) {
                changes.push(Change::RemoveForeignKey {
                    table_name: target.name.clone(),
                    foreign_key: fk.clone(),
                });
            }
        }

        for index in &source.indexes {
            if !target.indexes.iter().any(|t| t.matches(index, cs)) {
                changes.push(Change::RemoveIndex {
                    table_name: target.name.clone(),
                    index: index.clone(),
                });
            }
        }

        for target_column in &target.columns {
            match source.find_column(&target_column.name, cs) {
                None => changes.push(Change::AddColumn {
                    table_name: target.name.clone(),
                    column: target_column.clone(),
                }),
                Some(source_column) => {
                    changes.extend(self.compare_columns(target, source_column, target_column));
                }
            }
        }

        for source_column in &source.columns {
            if target.find_column(&source_column.name, cs).is_none() {
                changes.push(Change::RemoveColumn {
                    table_name: target.name.clone(),
                    column_name: source_column.name.clone(),
                });
            }
        }

        if let Some(change) = self.compare_primary_keys(source, target) {
            changes.push(change);
        }

        for index in &target.indexes {
            if !source.indexes.iter().any(|s| s.matches(index, cs)) {
                changes.push(Change::AddIndex {
                    table_name: target.name.clone(),
                    index: index.clone(),
                });
            }
        }

        for fk in &target.foreign_keys {
            if !source.foreign_keys.iter().any(|s| s.matches(fk, cs)) {
                changes.push(Change::AddForeignKey {
                    table_name: target.name.clone(),
                    foreign_key: fk.clone(),
                });
            }
        }

        if let Some(change) = self.compare_column_order(source, target) {
            changes.push(change);
        }

        if source.description != target.description {
            changes.push(Change::TableDescriptionChange {
                table_name: target.name.clone(),
                description: target.description.clone(),
            });
        }

        changes
    }

    /// A primary-key change is only real when the *set* of key columns
    /// differs; a reorder of the same set is suppressed.
    fn compare_primary_keys(&self, source: &Table, target: &Table) -> Option<Change> {
        let cs = self.case_sensitive();
        let source_pk = source.primary_key_columns();
        let target_pk = target.primary_key_columns();

        let same_set = source_pk.len() == target_pk.len()
            && source_pk
                .iter()
                .all(|s| target_pk.iter().any(|t| names_match(&s.name, &t.name, cs)));
        if same_set {
            return None;
        }

        Some(Change::PrimaryKeyChange {
            table_name: target.name.clone(),
            new_primary_key: target_pk.iter().map(|c| c.name.clone()).collect(),
        })
    }

    /// Detect a cosmetic reorder of the columns both tables share
    fn compare_column_order(&self, source: &Table, target: &Table) -> Option<Change> {
        let cs = self.case_sensitive();
        let source_order: Vec<&str> = source
            .columns
            .iter()
            .filter(|c| target.find_column(&c.name, cs).is_some())
            .map(|c| c.name.as_str())
            .collect();
        let target_order: Vec<&str> = target
            .columns
            .iter()
            .filter(|c| source.find_column(&c.name, cs).is_some())
            .map(|c| c.name.as_str())
            .collect();

        let same = source_order.len() == target_order.len()
            && source_order
                .iter()
                .zip(&target_order)
                .all(|(a, b)| names_match(a, b, cs));
        if same {
            return None;
        }

        Some(Change::ColumnOrderChange {
            table_name: target.name.clone(),
            column_order: target.columns.iter().map(|c| c.name.clone()).collect(),
        })
    }

    /// Compare two same-named columns
    fn compare_columns(&self, table: &Table, source: &Column, target: &Column) -> Vec<Change> {
        let mut changes = Vec::new();

        match (source.type_to_compare(), target.type_to_compare()) {
            (Some(source_key), Some(target_key)) => {
                // raw-typed comparison: the normalized key is the identity,
                // and it supersedes the generic type-code/size records
                if !names_match(&source_key, &target_key, self.case_sensitive()) {
                    changes.push(Change::ColumnRawTypeChange {
                        table_name: table.name.clone(),
                        column_name: target.name.clone(),
                        new_raw_type: target_key,
                    });
                } else if self.sizes_differ(source, target) {
                    changes.push(Change::ColumnSizeChange {
                        table_name: table.name.clone(),
                        column_name: target.name.clone(),
                        new_size: target.size,
                        new_scale: target.scale,
                    });
                }
            }
            _ => {
                // at least one side lacks a raw type: the generic type code
                // and size fields are authoritative
                if source.type_code != target.type_code {
                    changes.push(Change::ColumnDataTypeChange {
                        table_name: table.name.clone(),
                        column_name: target.name.clone(),
                        new_type_code: target.type_code,
                    });
                }
                if self.sizes_differ(source, target) {
                    changes.push(Change::ColumnSizeChange {
                        table_name: table.name.clone(),
                        column_name: target.name.clone(),
                        new_size: target.size,
                        new_scale: target.scale,
                    });
                }
            }
        }

        if source.nullable != target.nullable {
            changes.push(Change::ColumnRequiredChange {
                table_name: table.name.clone(),
                column_name: target.name.clone(),
                required: !target.nullable,
            });
        }

        if source.default_value != target.default_value {
            changes.push(Change::ColumnDefaultValueChange {
                table_name: table.name.clone(),
                column_name: target.name.clone(),
                new_default: target.default_value.clone(),
            });
        }

        if source.description != target.description {
            changes.push(Change::ColumnDescriptionChange {
                table_name: table.name.clone(),
                column_name: target.name.clone(),
                description: target.description.clone(),
            });
        }

        changes
    }

    /// A size difference is only a signal when the type category carries a
    /// size at all and both sides actually declared one; a provider that
    /// could not determine a size must not produce spurious changes.
    fn sizes_differ(&self, source: &Column, target: &Column) -> bool {
        if !self.info.has_size(source.type_code) || !self.info.has_size(target.type_code) {
            return false;
        }
        match (source.size, target.size) {
            (Some(s), Some(t)) => s != t || source.scale != target.scale,
            _ => false,
        }
    }
}
