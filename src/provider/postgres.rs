//! Live PostgreSQL schema reader
//!
//! Introspects a running database through `information_schema` and the
//! `pg_catalog` views and produces a [`Database`] model whose raw types have
//! been routed through the platform's type reconciliation chain, so the
//! result compares cleanly against models from other providers.

use async_trait::async_trait;
use sqlx::{FromRow, Pool, Postgres};

use crate::error::Result;
use crate::provider::SchemaProvider;
use crate::schema::typemap::TypeMapping;
use crate::schema::types::{Column, Database, ForeignKey, Index, Reference, Table, TypeCode};

/// Reads the current schema of a PostgreSQL database
pub struct PostgresSchemaReader {
    pool: Pool<Postgres>,
    database_name: String,
    schema: String,
    type_mapping: TypeMapping,
}

#[derive(FromRow)]
struct TableRow {
    table_name: String,
    description: Option<String>,
}

#[derive(FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    udt_name: String,
    is_nullable: String,
    column_default: Option<String>,
    character_maximum_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
    datetime_precision: Option<i32>,
    description: Option<String>,
}

#[derive(FromRow)]
struct PrimaryKeyRow {
    column_name: String,
}

#[derive(FromRow)]
struct IndexRow {
    index_name: String,
    column_name: String,
    is_unique: bool,
    predicate: Option<String>,
}

#[derive(FromRow)]
struct ForeignKeyRow {
    constraint_name: String,
    column_name: String,
    ref_table: String,
    ref_column: String,
}

impl PostgresSchemaReader {
    pub fn new(
        pool: Pool<Postgres>,
        database_name: impl Into<String>,
        schema: Option<String>,
        type_mapping: TypeMapping,
    ) -> Self {
        Self {
            pool,
            database_name: database_name.into(),
            schema: schema.unwrap_or_else(|| "public".to_string()),
            type_mapping,
        }
    }

    /// Read the full model of the configured schema
    pub async fn read_model(&self) -> Result<Database> {
        let mut database = Database::new(&self.database_name);

        let sql = r#"
            SELECT
                t.table_name,
                obj_description(c.oid) AS description
            FROM information_schema.tables t
            JOIN pg_class c ON c.relname = t.table_name
            JOIN pg_namespace n ON n.oid = c.relnamespace AND n.nspname = t.table_schema
            WHERE t.table_schema = $1 AND t.table_type = 'BASE TABLE'
            ORDER BY t.table_name
        "#;
        let table_rows = sqlx::query_as::<_, TableRow>(sql)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;

        for row in table_rows {
            let table = self.read_table(&row.table_name, row.description).await?;
            database.add_table(table);
        }

        tracing::info!(
            schema = %self.schema,
            tables = database.tables.len(),
            "read database model"
        );
        Ok(database)
    }

    async fn read_table(&self, table_name: &str, description: Option<String>) -> Result<Table> {
        let mut table = Table::new(table_name);
        table.description = description;
        table.columns = self.read_columns(table_name).await?;

        let sql = r#"
            SELECT kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_schema = $1
                AND tc.table_name = $2
            ORDER BY kcu.ordinal_position
        "#;
        let pk_rows = sqlx::query_as::<_, PrimaryKeyRow>(sql)
            .bind(&self.schema)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;
        for row in pk_rows {
            if let Some(column) = table.find_column_mut(&row.column_name, false) {
                column.primary_key = true;
            }
        }

        table.indexes = self.read_indexes(table_name).await?;
        table.foreign_keys = self.read_foreign_keys(table_name).await?;
        Ok(table)
    }

    async fn read_columns(&self, table_name: &str) -> Result<Vec<Column>> {
        let sql = r#"
            SELECT
                c.column_name,
                c.data_type,
                c.udt_name,
                c.is_nullable,
                c.column_default,
                c.character_maximum_length,
                c.numeric_precision,
                c.numeric_scale,
                c.datetime_precision,
                col_description(pc.oid, c.ordinal_position) AS description
            FROM information_schema.columns c
            JOIN pg_class pc ON pc.relname = c.table_name
            JOIN pg_namespace n ON n.oid = pc.relnamespace AND n.nspname = c.table_schema
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
        "#;
        let rows = sqlx::query_as::<_, ColumnRow>(sql)
            .bind(&self.schema)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let type_code = type_code_for(&row.data_type, &row.udt_name);
            let auto_increment = row
                .column_default
                .as_deref()
                .is_some_and(|d| d.starts_with("nextval("));

            let mut column = Column::new(&row.column_name, type_code);
            column.nullable = row.is_nullable == "YES";
            column.auto_increment = auto_increment;
            column.size = row
                .character_maximum_length
                .or(row.numeric_precision)
                .and_then(|v| u32::try_from(v).ok());
            column.scale = row
                .numeric_scale
                .or(row.datetime_precision)
                .and_then(|v| u32::try_from(v).ok());
            column.default_value = if auto_increment {
                None
            } else {
                row.column_default
            };
            column.description = row.description;

            // route the reported type through the reconciliation chain so the
            // normalized raw type matches other providers' output
            columns.push(
                self.type_mapping
                    .map(&row.udt_name.to_uppercase(), column),
            );
        }
        Ok(columns)
    }

    async fn read_indexes(&self, table_name: &str) -> Result<Vec<Index>> {
        let sql = r#"
            SELECT
                i.relname AS index_name,
                a.attname AS column_name,
                ix.indisunique AS is_unique,
                pg_get_expr(ix.indpred, ix.indrelid) AS predicate
            FROM pg_index ix
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_class t ON t.oid = ix.indrelid
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            JOIN pg_namespace n ON n.oid = t.relnamespace
            WHERE t.relname = $1
                AND n.nspname = $2
                AND NOT ix.indisprimary
            ORDER BY i.relname, a.attnum
        "#;
        let rows = sqlx::query_as::<_, IndexRow>(sql)
            .bind(table_name)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;

        let mut indexes: Vec<Index> = Vec::new();
        for row in rows {
            match indexes.iter_mut().find(|i| i.name == row.index_name) {
                Some(index) => index.columns.push(row.column_name),
                None => indexes.push(Index {
                    name: row.index_name,
                    columns: vec![row.column_name],
                    unique: row.is_unique,
                    filter_condition: row.predicate,
                }),
            }
        }
        Ok(indexes)
    }

    async fn read_foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKey>> {
        let sql = r#"
            SELECT
                tc.constraint_name,
                kcu.column_name,
                ccu.table_name AS ref_table,
                ccu.column_name AS ref_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
                AND tc.table_schema = $1
                AND tc.table_name = $2
            ORDER BY tc.constraint_name, kcu.ordinal_position
        "#;
        let rows = sqlx::query_as::<_, ForeignKeyRow>(sql)
            .bind(&self.schema)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        let mut foreign_keys: Vec<ForeignKey> = Vec::new();
        for row in rows {
            let reference = Reference {
                local: row.column_name,
                foreign: row.ref_column,
            };
            match foreign_keys
                .iter_mut()
                .find(|fk| fk.name == row.constraint_name)
            {
                Some(fk) => fk.references.push(reference),
                None => foreign_keys.push(ForeignKey {
                    name: row.constraint_name,
                    foreign_table: row.ref_table,
                    references: vec![reference],
                    to_primary_key: true,
                }),
            }
        }
        Ok(foreign_keys)
    }
}

#[async_trait]
impl SchemaProvider for PostgresSchemaReader {
    async fn schema_model(&self) -> Result<Database> {
        self.read_model().await
    }
}

/// Map the `information_schema` type description to a generic type category
fn type_code_for(data_type: &str, udt_name: &str) -> TypeCode {
    match data_type {
        "character" => TypeCode::Char,
        "character varying" => TypeCode::Varchar,
        "text" => TypeCode::Clob,
        "numeric" => TypeCode::Numeric,
        "smallint" => TypeCode::SmallInt,
        "integer" => TypeCode::Integer,
        "bigint" => TypeCode::BigInt,
        "real" => TypeCode::Real,
        "double precision" => TypeCode::Double,
        "boolean" => TypeCode::Boolean,
        "date" => TypeCode::Date,
        "time without time zone" | "time with time zone" => TypeCode::Time,
        "timestamp without time zone" | "timestamp with time zone" => TypeCode::Timestamp,
        "bytea" => TypeCode::Blob,
        _ => {
            tracing::debug!(data_type, udt_name, "mapping unrecognized type to OTHER");
            TypeCode::Other
        }
    }
}
