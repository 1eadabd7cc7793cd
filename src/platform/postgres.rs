//! PostgreSQL platform: default type reconciliation chain and DDL builder

use indexmap::IndexMap;
use std::fmt::Write;

use crate::error::{Error, Result};
use crate::platform::{Platform, PlatformInfo, SqlBuilder};
use crate::schema::change::Change;
use crate::schema::typemap::TypeMapping;
use crate::schema::types::{names_match, Column, Database, ForeignKey, Index, Table, TypeCode};
use crate::utils::naming;

/// Placeholder default used when adding a required column to a populated
/// table; dropped again in a follow-up statement.
const PLACEHOLDER_DEFAULT: &str = "-1";

/// The PostgreSQL platform
pub struct PostgresPlatform {
    info: PlatformInfo,
    type_mapping: TypeMapping,
}

impl PostgresPlatform {
    /// Create the platform, optionally overriding the default type
    /// reconciliation chain
    pub fn new(type_mapping: Option<TypeMapping>) -> Self {
        Self {
            info: PlatformInfo {
                max_identifier_length: 63,
                case_sensitive: false,
                size_bearing_type_codes: vec![
                    TypeCode::Char,
                    TypeCode::Varchar,
                    TypeCode::Numeric,
                    TypeCode::Decimal,
                    TypeCode::Binary,
                    TypeCode::VarBinary,
                    TypeCode::Other,
                ],
            },
            type_mapping: type_mapping.unwrap_or_else(Self::default_type_mapping),
        }
    }

    /// The default normalization rules for types reported by Postgres
    /// introspection: the `_`-sigil array convention, the `BOOL` alias,
    /// integer width aliases, and parameter fill-in for sized types.
    pub fn default_type_mapping() -> TypeMapping {
        TypeMapping::new()
            .with_general_processor(|db_type, column| {
                db_type.strip_prefix('_').map(|element| {
                    let canonical = format!("{element}[]");
                    column.raw_complete_type = Some(canonical.clone());
                    canonical
                })
            })
            .with_mapping("BOOL", |column| {
                column.raw_complete_type = Some("BOOLEAN".to_string());
            })
            .with_mapping("VARCHAR", |column| {
                if let Some(size) = column.size {
                    column.raw_complete_type = Some(format!("VARCHAR({size})"));
                }
            })
            .with_mapping("NUMERIC", |column| {
                if let Some(precision) = column.size {
                    let scale = column.scale.unwrap_or(0);
                    column.raw_complete_type = Some(format!("NUMERIC({precision},{scale})"));
                }
            })
            .with_mapping("TIMESTAMP", |column| {
                let scale = column.scale.unwrap_or(6);
                column.raw_complete_type = Some(format!("TIMESTAMP({scale})"));
            })
            .with_mapping("TIMESTAMPTZ", |column| {
                let scale = column.scale.unwrap_or(6);
                column.raw_complete_type = Some(format!("TIMESTAMP({scale}) WITH TIME ZONE"));
            })
            .with_mapping("INT8", |column| {
                column.raw_complete_type = Some("BIGINT".to_string());
            })
            .with_mapping("INT4", |column| {
                column.raw_complete_type = Some("INTEGER".to_string());
            })
            .with_mapping("INT2", |column| {
                column.raw_complete_type = Some("SMALLINT".to_string());
            })
    }
}

impl Platform for PostgresPlatform {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn info(&self) -> &PlatformInfo {
        &self.info
    }

    fn type_mapping(&self) -> &TypeMapping {
        &self.type_mapping
    }

    fn sql_builder(&self) -> Box<dyn SqlBuilder> {
        Box::new(PostgresSqlBuilder::new(self.info.clone()))
    }
}

/// Renders change lists as PostgreSQL DDL
pub struct PostgresSqlBuilder {
    info: PlatformInfo,
}

impl PostgresSqlBuilder {
    pub fn new(info: PlatformInfo) -> Self {
        Self { info }
    }

    fn case_sensitive(&self) -> bool {
        self.info.case_sensitive
    }

    /// Quote an identifier, shortening it to the dialect limit first
    fn ident(&self, name: &str) -> String {
        naming::quote_identifier(&naming::shorten_identifier(
            name,
            self.info.max_identifier_length,
        ))
    }

    fn table_key(&self, name: &str) -> String {
        if self.case_sensitive() {
            name.to_string()
        } else {
            name.to_uppercase()
        }
    }

    /// Process one table's changes: simple alterations are rendered as
    /// individual statements; whatever cannot be expressed that way is
    /// collected and resolved by rebuilding the table.
    fn process_table_changes(
        &self,
        out: &mut String,
        working: &mut Database,
        desired: &Database,
        changes: &[&Change],
    ) -> Result<()> {
        let cs = self.case_sensitive();
        // a pending rebuild takes over all column additions so the new shape
        // is created in one step and the data-retention decision sees them
        let rebuild_pending = changes
            .iter()
            .any(|c| matches!(c, Change::PrimaryKeyChange { .. }));
        let mut deferred: Vec<&Change> = Vec::new();

        for &change in changes {
            match change {
                Change::AddTable { table } => {
                    self.write_create_table(out, table, false)?;
                    change.apply(working, cs);
                }
                Change::RemoveTable { table_name } => {
                    writeln!(out, "DROP TABLE {};", self.ident(table_name))?;
                    change.apply(working, cs);
                }
                Change::ColumnDataTypeChange {
                    table_name,
                    column_name,
                    ..
                }
                | Change::ColumnSizeChange {
                    table_name,
                    column_name,
                    ..
                }
                | Change::ColumnRawTypeChange {
                    table_name,
                    column_name,
                    ..
                } => {
                    let desired_column = self.find_desired_column(desired, table_name, column_name)?;
                    writeln!(
                        out,
                        "ALTER TABLE {} ALTER COLUMN {} TYPE {};",
                        self.ident(table_name),
                        self.ident(column_name),
                        self.sql_type(desired_column)
                    )?;
                    change.apply(working, cs);
                }
                Change::ColumnRequiredChange {
                    table_name,
                    column_name,
                    required,
                } => {
                    let verb = if *required { "SET" } else { "DROP" };
                    writeln!(
                        out,
                        "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
                        self.ident(table_name),
                        self.ident(column_name),
                        verb
                    )?;
                    change.apply(working, cs);
                }
                Change::ColumnDefaultValueChange {
                    table_name,
                    column_name,
                    new_default,
                } => {
                    let desired_column = self.find_desired_column(desired, table_name, column_name)?;
                    match new_default {
                        Some(value) => writeln!(
                            out,
                            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                            self.ident(table_name),
                            self.ident(column_name),
                            default_literal(desired_column.type_code, value)
                        )?,
                        None => writeln!(
                            out,
                            "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                            self.ident(table_name),
                            self.ident(column_name)
                        )?,
                    }
                    change.apply(working, cs);
                }
                Change::ColumnDescriptionChange {
                    table_name,
                    column_name,
                    description,
                } => {
                    writeln!(
                        out,
                        "COMMENT ON COLUMN {}.{} IS {};",
                        self.ident(table_name),
                        self.ident(column_name),
                        comment_literal(description.as_deref())
                    )?;
                    change.apply(working, cs);
                }
                Change::TableDescriptionChange {
                    table_name,
                    description,
                } => {
                    writeln!(
                        out,
                        "COMMENT ON TABLE {} IS {};",
                        self.ident(table_name),
                        comment_literal(description.as_deref())
                    )?;
                    change.apply(working, cs);
                }
                Change::AddColumn { table_name, column } if !rebuild_pending => {
                    self.write_add_column(out, table_name, column)?;
                    change.apply(working, cs);
                }
                Change::AddColumn { .. } => deferred.push(change),
                Change::RemoveColumn {
                    table_name,
                    column_name,
                } => {
                    writeln!(
                        out,
                        "ALTER TABLE {} DROP COLUMN {};",
                        self.ident(table_name),
                        self.ident(column_name)
                    )?;
                    change.apply(working, cs);
                }
                Change::ColumnOrderChange { .. } => {
                    // cosmetic, no SQL effect
                    change.apply(working, cs);
                }
                Change::AddIndex { table_name, index } => {
                    let table = desired
                        .find_table(table_name, cs)
                        .ok_or_else(|| Error::InvalidModel(format!("unknown table '{table_name}'")))?;
                    self.write_create_index(out, table, index)?;
                    change.apply(working, cs);
                }
                Change::RemoveIndex { table_name, index } => {
                    if index.unique {
                        // a unique index is backed by a constraint
                        writeln!(
                            out,
                            "ALTER TABLE {} DROP CONSTRAINT {};",
                            self.ident(table_name),
                            self.ident(&index.name)
                        )?;
                    } else {
                        writeln!(out, "DROP INDEX {};", self.ident(&index.name))?;
                    }
                    change.apply(working, cs);
                }
                Change::AddForeignKey {
                    table_name,
                    foreign_key,
                } => {
                    self.write_add_foreign_key(out, table_name, foreign_key)?;
                    change.apply(working, cs);
                }
                Change::RemoveForeignKey {
                    table_name,
                    foreign_key,
                } => {
                    writeln!(
                        out,
                        "ALTER TABLE {} DROP CONSTRAINT {};",
                        self.ident(table_name),
                        self.ident(&foreign_key.name)
                    )?;
                    change.apply(working, cs);
                }
                Change::PrimaryKeyChange { .. } => deferred.push(change),
            }
        }

        if !deferred.is_empty() {
            self.rebuild_table(out, working, desired, &deferred)?;
        }

        Ok(())
    }

    /// Adding a required, non-auto-increment column with no default is
    /// unsafe against a populated table: the column is added with a
    /// placeholder default which is immediately dropped again, and the
    /// generated SQL is annotated for the operator.
    fn write_add_column(&self, out: &mut String, table_name: &str, column: &Column) -> Result<()> {
        if is_unsafe_addition(column) {
            let mut patched = column.clone();
            patched.default_value = Some(PLACEHOLDER_DEFAULT.to_string());
            writeln!(out, "-- TODO: replace the placeholder value for {}", column.name)?;
            writeln!(
                out,
                "ALTER TABLE {} ADD COLUMN {};",
                self.ident(table_name),
                self.column_definition(&patched)
            )?;
            writeln!(
                out,
                "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                self.ident(table_name),
                self.ident(&column.name)
            )?;
        } else {
            writeln!(
                out,
                "ALTER TABLE {} ADD COLUMN {};",
                self.ident(table_name),
                self.column_definition(column)
            )?;
        }
        Ok(())
    }

    fn write_add_foreign_key(
        &self,
        out: &mut String,
        table_name: &str,
        fk: &ForeignKey,
    ) -> Result<()> {
        let local: Vec<String> = fk.references.iter().map(|r| self.ident(&r.local)).collect();
        let foreign: Vec<String> = fk
            .references
            .iter()
            .map(|r| self.ident(&r.foreign))
            .collect();
        writeln!(
            out,
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({});",
            self.ident(table_name),
            self.ident(&fk.name),
            local.join(", "),
            self.ident(&fk.foreign_table),
            foreign.join(", ")
        )?;
        Ok(())
    }

    /// Render a full `CREATE TABLE` statement; unless `temporary`, the
    /// primary-key constraint is embedded and comment and index statements
    /// follow.
    fn write_create_table(&self, out: &mut String, table: &Table, temporary: bool) -> Result<()> {
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("  {}", self.column_definition(c)))
            .collect();

        if !temporary {
            let pk = table.primary_key_columns();
            if !pk.is_empty() {
                let names: Vec<String> = pk.iter().map(|c| self.ident(&c.name)).collect();
                definitions.push(format!(
                    "  CONSTRAINT {} PRIMARY KEY ({})",
                    self.ident(&naming::constraint_name(&table.name, "pkey")),
                    names.join(", ")
                ));
            }
        }

        writeln!(out, "CREATE TABLE {} (", self.ident(&table.name))?;
        writeln!(out, "{}", definitions.join(",\n"))?;
        writeln!(out, ");")?;

        if temporary {
            return Ok(());
        }

        if let Some(description) = &table.description {
            writeln!(
                out,
                "COMMENT ON TABLE {} IS {};",
                self.ident(&table.name),
                comment_literal(Some(description))
            )?;
        }
        for column in &table.columns {
            if let Some(description) = &column.description {
                writeln!(
                    out,
                    "COMMENT ON COLUMN {}.{} IS {};",
                    self.ident(&table.name),
                    self.ident(&column.name),
                    comment_literal(Some(description))
                )?;
            }
        }
        for index in &table.indexes {
            self.write_create_index(out, table, index)?;
        }
        Ok(())
    }

    fn write_create_index(&self, out: &mut String, table: &Table, index: &Index) -> Result<()> {
        let cs = self.case_sensitive();
        let mut columns = Vec::with_capacity(index.columns.len());
        for name in &index.columns {
            let column = table.find_column(name, cs).ok_or_else(|| {
                Error::InvalidModel(format!(
                    "invalid column '{}' on index '{}' for table '{}'",
                    name, index.name, table.name
                ))
            })?;
            columns.push(self.ident(&column.name));
        }

        let unique = if index.unique { " UNIQUE" } else { "" };
        write!(
            out,
            "CREATE{} INDEX {} ON {} ({})",
            unique,
            self.ident(&index.name),
            self.ident(&table.name),
            columns.join(", ")
        )?;
        if let Some(condition) = &index.filter_condition {
            write!(out, " WHERE {condition}")?;
        }
        writeln!(out, ";")?;
        Ok(())
    }

    /// Resolve the remaining changes for a table by rebuilding it. Data is
    /// copied through a temporary table unless the pending additions include
    /// an unsafe column; then the table is dropped and recreated, existing
    /// rows are lost, and a warning is emitted.
    fn rebuild_table(
        &self,
        out: &mut String,
        working: &mut Database,
        desired: &Database,
        deferred: &[&Change],
    ) -> Result<()> {
        let cs = self.case_sensitive();
        let table_name = deferred[0].table_name();
        let source_table = working
            .find_table(table_name, cs)
            .ok_or_else(|| Error::InvalidModel(format!("unknown table '{table_name}'")))?
            .clone();
        let target_table = desired
            .find_table(table_name, cs)
            .ok_or_else(|| Error::InvalidModel(format!("unknown table '{table_name}'")))?;

        let unsafe_addition = deferred.iter().find_map(|change| match change {
            Change::AddColumn { column, .. } if is_unsafe_addition(column) => Some(&column.name),
            _ => None,
        });

        // constraints spanning the rebuilt table would block the drop and
        // would not survive the recreate: the table's own foreign keys (as
        // they stand at this point in the patch) and constraints on other
        // tables referencing it all come off first and go back on at the end
        let own_foreign_keys = source_table.foreign_keys.clone();
        let incoming: Vec<(String, ForeignKey)> = working
            .tables
            .iter()
            .filter(|t| !names_match(&t.name, table_name, cs))
            .flat_map(|t| {
                t.foreign_keys
                    .iter()
                    .filter(|fk| names_match(&fk.foreign_table, table_name, cs))
                    .map(|fk| (t.name.clone(), fk.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (owner, fk) in &incoming {
            writeln!(
                out,
                "ALTER TABLE {} DROP CONSTRAINT {};",
                self.ident(owner),
                self.ident(&fk.name)
            )?;
        }

        if let Some(column_name) = unsafe_addition {
            tracing::warn!(
                table = %source_table.name,
                column = %column_name,
                "data cannot be retained because of the addition of a required column"
            );
            writeln!(out, "DROP TABLE {};", self.ident(&source_table.name))?;
            self.write_create_table(out, target_table, false)?;
        } else {
            let mut temp_table = target_table.clone();
            temp_table.name = naming::temporary_table_name(&target_table.name);

            self.write_create_table(out, &temp_table, true)?;
            self.write_copy_data(out, &source_table, &temp_table)?;
            writeln!(out, "DROP TABLE {};", self.ident(&source_table.name))?;
            self.write_create_table(out, target_table, false)?;
            self.write_copy_data(out, &temp_table, target_table)?;
            writeln!(out, "DROP TABLE {};", self.ident(&temp_table.name))?;
        }

        for fk in &own_foreign_keys {
            self.write_add_foreign_key(out, &target_table.name, fk)?;
        }
        for (owner, fk) in &incoming {
            self.write_add_foreign_key(out, owner, fk)?;
        }

        // the working model now has the target shape; foreign keys stay at
        // their current patch state so pending additions still apply cleanly
        if let Some(slot) = working
            .tables
            .iter_mut()
            .find(|t| names_match(&t.name, table_name, cs))
        {
            let mut rebuilt = target_table.clone();
            rebuilt.foreign_keys = own_foreign_keys;
            *slot = rebuilt;
        }
        Ok(())
    }

    /// Copy the rows of the columns both tables share
    fn write_copy_data(&self, out: &mut String, from: &Table, to: &Table) -> Result<()> {
        let cs = self.case_sensitive();
        let shared: Vec<String> = from
            .columns
            .iter()
            .filter(|c| to.find_column(&c.name, cs).is_some())
            .map(|c| self.ident(&c.name))
            .collect();
        if shared.is_empty() {
            tracing::warn!(
                from = %from.name,
                to = %to.name,
                "tables share no columns, skipping row copy"
            );
            return Ok(());
        }
        writeln!(
            out,
            "INSERT INTO {} ({}) SELECT {} FROM {};",
            self.ident(&to.name),
            shared.join(", "),
            shared.join(", "),
            self.ident(&from.name)
        )?;
        Ok(())
    }

    /// One column entry of a `CREATE TABLE` or `ADD COLUMN` statement
    fn column_definition(&self, column: &Column) -> String {
        let mut definition = format!("{} {}", self.ident(&column.name), self.sql_type(column));
        if let Some(default) = &column.default_value {
            definition.push_str(" DEFAULT ");
            definition.push_str(&default_literal(column.type_code, default));
        }
        if !column.nullable {
            definition.push_str(" NOT NULL");
        }
        definition
    }

    fn find_desired_column<'a>(
        &self,
        desired: &'a Database,
        table_name: &str,
        column_name: &str,
    ) -> Result<&'a Column> {
        let cs = self.case_sensitive();
        desired
            .find_table(table_name, cs)
            .and_then(|t| t.find_column(column_name, cs))
            .ok_or_else(|| {
                Error::InvalidModel(format!(
                    "column '{column_name}' of table '{table_name}' not in desired model"
                ))
            })
    }
}

impl SqlBuilder for PostgresSqlBuilder {
    fn write_sql_patch(
        &mut self,
        current: &Database,
        desired: &Database,
        changes: &[Change],
    ) -> Result<String> {
        let cs = self.case_sensitive();
        let mut working = current.clone();
        let mut out = String::new();

        // foreign keys get their own phases: removals before any table is
        // reshaped, additions after every table exists. A constraint may
        // span two tables whose groups are rendered in either order.
        let mut table_changes: Vec<&Change> = Vec::new();
        let mut fk_additions: Vec<&Change> = Vec::new();
        for change in changes {
            match change {
                Change::RemoveForeignKey {
                    table_name,
                    foreign_key,
                } => {
                    writeln!(
                        out,
                        "ALTER TABLE {} DROP CONSTRAINT {};",
                        self.ident(table_name),
                        self.ident(&foreign_key.name)
                    )?;
                    change.apply(&mut working, cs);
                }
                Change::AddForeignKey { .. } => fk_additions.push(change),
                _ => table_changes.push(change),
            }
        }

        // group the remaining changes per table, keeping first-appearance
        // order
        let mut per_table: IndexMap<String, Vec<&Change>> = IndexMap::new();
        for change in table_changes {
            per_table
                .entry(self.table_key(change.table_name()))
                .or_default()
                .push(change);
        }
        for group in per_table.values() {
            self.process_table_changes(&mut out, &mut working, desired, group)?;
        }

        for change in fk_additions {
            if let Change::AddForeignKey {
                table_name,
                foreign_key,
            } = change
            {
                self.write_add_foreign_key(&mut out, table_name, foreign_key)?;
            }
            change.apply(&mut working, cs);
        }
        Ok(out)
    }

    fn sql_type(&self, column: &Column) -> String {
        if column.auto_increment {
            match column.type_code {
                TypeCode::SmallInt => return "SMALLSERIAL".to_string(),
                TypeCode::BigInt => return "BIGSERIAL".to_string(),
                _ => return "SERIAL".to_string(),
            }
        }
        if let Some(complete) = &column.raw_complete_type {
            return complete.clone();
        }
        match column.type_code {
            TypeCode::Char => format!("CHAR({})", column.size.unwrap_or(1)),
            TypeCode::Varchar => format!("VARCHAR({})", column.size.unwrap_or(255)),
            TypeCode::LongVarchar | TypeCode::Clob => "TEXT".to_string(),
            TypeCode::Numeric | TypeCode::Decimal => match (column.size, column.scale) {
                (Some(precision), Some(scale)) => format!("NUMERIC({precision},{scale})"),
                (Some(precision), None) => format!("NUMERIC({precision})"),
                _ => "NUMERIC".to_string(),
            },
            TypeCode::SmallInt => "SMALLINT".to_string(),
            TypeCode::Integer => "INTEGER".to_string(),
            TypeCode::BigInt => "BIGINT".to_string(),
            TypeCode::Real => "REAL".to_string(),
            TypeCode::Double => "DOUBLE PRECISION".to_string(),
            TypeCode::Boolean => "BOOLEAN".to_string(),
            TypeCode::Date => "DATE".to_string(),
            TypeCode::Time => "TIME".to_string(),
            TypeCode::Timestamp => "TIMESTAMP".to_string(),
            TypeCode::Binary | TypeCode::VarBinary | TypeCode::Blob => "BYTEA".to_string(),
            TypeCode::Other => "TEXT".to_string(),
        }
    }
}

/// A required, non-auto-increment column with no default cannot be added to
/// a populated table without breaking it
fn is_unsafe_addition(column: &Column) -> bool {
    !column.nullable && !column.auto_increment && column.default_value.is_none()
}

fn is_textual(type_code: TypeCode) -> bool {
    matches!(
        type_code,
        TypeCode::Char
            | TypeCode::Varchar
            | TypeCode::LongVarchar
            | TypeCode::Clob
            | TypeCode::Other
    )
}

/// Render a default value; character-like types are quoted unless the value
/// already is
fn default_literal(type_code: TypeCode, value: &str) -> String {
    if is_textual(type_code) && !value.starts_with('\'') {
        format!("'{}'", value.replace('\'', "''"))
    } else {
        value.to_string()
    }
}

fn comment_literal(description: Option<&str>) -> String {
    match description {
        Some(text) => format!("'{}'", text.replace('\'', "''")),
        None => "NULL".to_string(),
    }
}
