//! The closed set of structural changes the comparator can emit
//!
//! Every change carries enough data to mutate a working schema model (so the
//! SQL builder can keep a consistent snapshot across rendered statements)
//! and to be rendered to DDL. The list is also usable standalone by callers
//! that never render SQL.

use serde::{Deserialize, Serialize};

use crate::schema::types::{Column, Database, ForeignKey, Index, Table, TypeCode};

/// One atomic structural difference between two schema models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    AddTable {
        table: Table,
    },
    RemoveTable {
        table_name: String,
    },
    AddColumn {
        table_name: String,
        column: Column,
    },
    RemoveColumn {
        table_name: String,
        column_name: String,
    },
    /// Cosmetic reorder of a table's columns; produces no SQL and is
    /// filtered out before rendering by default
    ColumnOrderChange {
        table_name: String,
        column_order: Vec<String>,
    },
    ColumnDataTypeChange {
        table_name: String,
        column_name: String,
        new_type_code: TypeCode,
    },
    ColumnSizeChange {
        table_name: String,
        column_name: String,
        new_size: Option<u32>,
        new_scale: Option<u32>,
    },
    /// Supersedes [`Change::ColumnDataTypeChange`] and
    /// [`Change::ColumnSizeChange`] for a raw-typed column; carries the
    /// target's normalized raw type
    ColumnRawTypeChange {
        table_name: String,
        column_name: String,
        new_raw_type: String,
    },
    ColumnRequiredChange {
        table_name: String,
        column_name: String,
        required: bool,
    },
    ColumnDefaultValueChange {
        table_name: String,
        column_name: String,
        new_default: Option<String>,
    },
    ColumnDescriptionChange {
        table_name: String,
        column_name: String,
        description: Option<String>,
    },
    TableDescriptionChange {
        table_name: String,
        description: Option<String>,
    },
    /// The set of primary-key columns changed; carries the target's key
    /// columns in declaration order
    PrimaryKeyChange {
        table_name: String,
        new_primary_key: Vec<String>,
    },
    AddIndex {
        table_name: String,
        index: Index,
    },
    RemoveIndex {
        table_name: String,
        index: Index,
    },
    AddForeignKey {
        table_name: String,
        foreign_key: ForeignKey,
    },
    RemoveForeignKey {
        table_name: String,
        foreign_key: ForeignKey,
    },
}

impl Change {
    /// Name of the table this change targets
    pub fn table_name(&self) -> &str {
        match self {
            Change::AddTable { table } => &table.name,
            Change::RemoveTable { table_name }
            | Change::AddColumn { table_name, .. }
            | Change::RemoveColumn { table_name, .. }
            | Change::ColumnOrderChange { table_name, .. }
            | Change::ColumnDataTypeChange { table_name, .. }
            | Change::ColumnSizeChange { table_name, .. }
            | Change::ColumnRawTypeChange { table_name, .. }
            | Change::ColumnRequiredChange { table_name, .. }
            | Change::ColumnDefaultValueChange { table_name, .. }
            | Change::ColumnDescriptionChange { table_name, .. }
            | Change::TableDescriptionChange { table_name, .. }
            | Change::PrimaryKeyChange { table_name, .. }
            | Change::AddIndex { table_name, .. }
            | Change::RemoveIndex { table_name, .. }
            | Change::AddForeignKey { table_name, .. }
            | Change::RemoveForeignKey { table_name, .. } => table_name,
        }
    }

    /// Mutate the given model in place to the post-change state
    pub fn apply(&self, model: &mut Database, case_sensitive: bool) {
        match self {
            Change::AddTable { table } => {
                model.add_table(table.clone());
            }
            Change::RemoveTable { table_name } => {
                model
                    .tables
                    .retain(|t| !super::types::names_match(&t.name, table_name, case_sensitive));
            }
            Change::AddColumn { table_name, column } => {
                if let Some(table) = model.find_table_mut(table_name, case_sensitive) {
                    table.add_column(column.clone());
                }
            }
            Change::RemoveColumn {
                table_name,
                column_name,
            } => {
                if let Some(table) = model.find_table_mut(table_name, case_sensitive) {
                    table.columns.retain(|c| {
                        !super::types::names_match(&c.name, column_name, case_sensitive)
                    });
                }
            }
            Change::ColumnOrderChange {
                table_name,
                column_order,
            } => {
                if let Some(table) = model.find_table_mut(table_name, case_sensitive) {
                    let mut reordered = Vec::with_capacity(table.columns.len());
                    for name in column_order {
                        if let Some(pos) = table
                            .columns
                            .iter()
                            .position(|c| super::types::names_match(&c.name, name, case_sensitive))
                        {
                            reordered.push(table.columns.remove(pos));
                        }
                    }
                    reordered.append(&mut table.columns);
                    table.columns = reordered;
                }
            }
            Change::ColumnDataTypeChange {
                table_name,
                column_name,
                new_type_code,
            } => {
                if let Some(column) = find_column(model, table_name, column_name, case_sensitive) {
                    column.type_code = *new_type_code;
                }
            }
            Change::ColumnSizeChange {
                table_name,
                column_name,
                new_size,
                new_scale,
            } => {
                if let Some(column) = find_column(model, table_name, column_name, case_sensitive) {
                    column.size = *new_size;
                    column.scale = *new_scale;
                }
            }
            Change::ColumnRawTypeChange {
                table_name,
                column_name,
                new_raw_type,
            } => {
                if let Some(column) = find_column(model, table_name, column_name, case_sensitive) {
                    column.raw_complete_type = Some(new_raw_type.clone());
                    column.raw_type = Some(super::types::strip_type_parameters(new_raw_type));
                }
            }
            Change::ColumnRequiredChange {
                table_name,
                column_name,
                required,
            } => {
                if let Some(column) = find_column(model, table_name, column_name, case_sensitive) {
                    column.nullable = !required;
                }
            }
            Change::ColumnDefaultValueChange {
                table_name,
                column_name,
                new_default,
            } => {
                if let Some(column) = find_column(model, table_name, column_name, case_sensitive) {
                    column.default_value = new_default.clone();
                }
            }
            Change::ColumnDescriptionChange {
                table_name,
                column_name,
                description,
            } => {
                if let Some(column) = find_column(model, table_name, column_name, case_sensitive) {
                    column.description = description.clone();
                }
            }
            Change::TableDescriptionChange {
                table_name,
                description,
            } => {
                if let Some(table) = model.find_table_mut(table_name, case_sensitive) {
                    table.description = description.clone();
                }
            }
            Change::PrimaryKeyChange {
                table_name,
                new_primary_key,
            } => {
                if let Some(table) = model.find_table_mut(table_name, case_sensitive) {
                    for column in &mut table.columns {
                        column.primary_key = new_primary_key
                            .iter()
                            .any(|n| super::types::names_match(&column.name, n, case_sensitive));
                    }
                }
            }
            Change::AddIndex { table_name, index } => {
                if let Some(table) = model.find_table_mut(table_name, case_sensitive) {
                    table.add_index(index.clone());
                }
            }
            Change::RemoveIndex { table_name, index } => {
                if let Some(table) = model.find_table_mut(table_name, case_sensitive) {
                    table.indexes.retain(|i| !i.matches(index, case_sensitive));
                }
            }
            Change::AddForeignKey {
                table_name,
                foreign_key,
            } => {
                if let Some(table) = model.find_table_mut(table_name, case_sensitive) {
                    table.add_foreign_key(foreign_key.clone());
                }
            }
            Change::RemoveForeignKey {
                table_name,
                foreign_key,
            } => {
                if let Some(table) = model.find_table_mut(table_name, case_sensitive) {
                    table
                        .foreign_keys
                        .retain(|fk| !fk.matches(foreign_key, case_sensitive));
                }
            }
        }
    }
}

fn find_column<'a>(
    model: &'a mut Database,
    table_name: &str,
    column_name: &str,
    case_sensitive: bool,
) -> Option<&'a mut Column> {
    model
        .find_table_mut(table_name, case_sensitive)?
        .find_column_mut(column_name, case_sensitive)
}

/// The default policy applied before rendering: cosmetic column reorders are
/// dropped, and the migration-bookkeeping table is never proposed for
/// removal.
pub fn default_change_filter(bookkeeping_table: &str) -> impl Fn(&Change) -> bool + '_ {
    move |change| match change {
        Change::ColumnOrderChange { .. } => false,
        Change::RemoveTable { table_name } => !table_name.eq_ignore_ascii_case(bookkeeping_table),
        _ => true,
    }
}
