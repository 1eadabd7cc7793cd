//! Tests for schema-patch
//!
//! Unit and end-to-end tests for the comparison engine and the PostgreSQL
//! DDL builder.

use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::error::Error;
use crate::platform::{create_platform, Platform, PostgresPlatform};
use crate::schema::change::{default_change_filter, Change};
use crate::schema::comparator::ModelComparator;
use crate::schema::types::{
    strip_type_parameters, Column, Database, ForeignKey, Index, Reference, Table, TypeCode,
};
use crate::utils::naming;
use crate::MigrationGenerator;

fn generator() -> MigrationGenerator {
    MigrationGenerator::new("postgresql", None).unwrap()
}

fn comparator() -> ModelComparator {
    ModelComparator::new(PostgresPlatform::new(None).info().clone())
}

fn database(tables: Vec<Table>) -> Database {
    let mut db = Database::new("app");
    for table in tables {
        db.add_table(table);
    }
    db
}

fn widgets_table() -> Table {
    let mut table = Table::new("widgets");
    table.add_column(
        Column::new("id", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    table.add_column(
        Column::new("name", TypeCode::Varchar)
            .nullable(false)
            .size(255)
            .raw_complete_type("VARCHAR(255)"),
    );
    table
}

fn orders_table() -> Table {
    let mut table = Table::new("orders");
    table.add_column(
        Column::new("id", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    table.add_column(
        Column::new("code", TypeCode::Varchar)
            .nullable(false)
            .size(32)
            .raw_complete_type("VARCHAR(32)"),
    );
    table
}

// --- comparator ---

#[test]
fn identical_models_produce_no_changes() {
    let current = database(vec![widgets_table(), orders_table()]);
    let desired = current.clone();

    assert_eq!(comparator().compare(&current, &desired), vec![]);
}

#[test]
fn applying_a_change_list_reaches_the_target_model() {
    let mut source_widgets = widgets_table();
    source_widgets.add_column(Column::new("obsolete", TypeCode::Boolean).raw_complete_type("BOOLEAN"));
    source_widgets.add_index(Index::new("ix_widgets_name", &["name"]));
    let source = database(vec![source_widgets, orders_table()]);

    let mut target_widgets = widgets_table();
    target_widgets.add_column(
        Column::new("created_at", TypeCode::Timestamp).raw_complete_type("TIMESTAMP(6)"),
    );
    target_widgets.find_column_mut("name", false).unwrap().description =
        Some("display name".to_string());
    let mut target_users = Table::new("users");
    target_users.add_column(
        Column::new("id", TypeCode::BigInt)
            .primary_key()
            .raw_complete_type("BIGINT"),
    );
    let target = database(vec![target_widgets, target_users]);

    let changes = comparator().compare(&source, &target);
    assert!(!changes.is_empty());

    let mut patched = source.clone();
    for change in &changes {
        change.apply(&mut patched, false);
    }

    assert_eq!(comparator().compare(&patched, &target), vec![]);
}

#[test]
fn primary_key_reorder_is_suppressed() {
    let mut source_table = Table::new("pairs");
    source_table.add_column(
        Column::new("a", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    source_table.add_column(
        Column::new("b", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    let mut target_table = Table::new("pairs");
    target_table.add_column(
        Column::new("b", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    target_table.add_column(
        Column::new("a", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );

    let source = database(vec![source_table]);
    let target = database(vec![target_table]);

    let all_changes = generator().diff_with_filter(&source, &target, &|_| true);
    assert!(all_changes
        .iter()
        .all(|c| matches!(c, Change::ColumnOrderChange { .. })));

    // the default filter drops the cosmetic reorder too
    assert_eq!(generator().diff(&source, &target), vec![]);
}

#[test]
fn size_change_within_the_same_raw_type() {
    let mut source_table = Table::new("amounts");
    source_table.add_column(
        Column::new("value", TypeCode::Numeric)
            .size(38)
            .scale(2)
            .raw_complete_type("NUMERIC(38,2)"),
    );
    let mut target_table = Table::new("amounts");
    target_table.add_column(
        Column::new("value", TypeCode::Numeric)
            .size(10)
            .scale(2)
            .raw_complete_type("NUMERIC(10,2)"),
    );

    let changes = comparator().compare(
        &database(vec![source_table]),
        &database(vec![target_table]),
    );
    assert_eq!(
        changes,
        vec![Change::ColumnSizeChange {
            table_name: "amounts".to_string(),
            column_name: "value".to_string(),
            new_size: Some(10),
            new_scale: Some(2),
        }]
    );
}

#[test]
fn undeclared_size_produces_no_change() {
    let mut source_table = Table::new("amounts");
    source_table.add_column(Column::new("value", TypeCode::Numeric).raw_complete_type("NUMERIC"));
    let mut target_table = Table::new("amounts");
    target_table.add_column(
        Column::new("value", TypeCode::Numeric)
            .size(10)
            .scale(2)
            .raw_complete_type("NUMERIC(10,2)"),
    );

    let changes = comparator().compare(
        &database(vec![source_table]),
        &database(vec![target_table]),
    );
    assert_eq!(changes, vec![]);
}

#[test]
fn raw_type_change_carries_the_desired_normalized_type() {
    let mut source_table = Table::new("events");
    source_table.add_column(
        Column::new("at", TypeCode::Timestamp).raw_complete_type("TIMESTAMP(6)"),
    );
    let mut target_table = Table::new("events");
    target_table.add_column(
        Column::new("at", TypeCode::Timestamp)
            .raw_complete_type("TIMESTAMP(6) WITH TIME ZONE"),
    );

    let changes = comparator().compare(
        &database(vec![source_table]),
        &database(vec![target_table]),
    );
    assert_eq!(
        changes,
        vec![Change::ColumnRawTypeChange {
            table_name: "events".to_string(),
            column_name: "at".to_string(),
            new_raw_type: "TIMESTAMP WITH TIME ZONE".to_string(),
        }]
    );
}

#[test]
fn empty_description_differs_from_absent_description() {
    let source = database(vec![widgets_table()]);
    let mut target_table = widgets_table();
    target_table.find_column_mut("name", false).unwrap().description = Some(String::new());
    let target = database(vec![target_table]);

    let changes = comparator().compare(&source, &target);
    assert_eq!(
        changes,
        vec![Change::ColumnDescriptionChange {
            table_name: "widgets".to_string(),
            column_name: "name".to_string(),
            description: Some(String::new()),
        }]
    );
}

#[test]
fn new_table_foreign_keys_become_separate_changes() {
    let mut lines = Table::new("order_lines");
    lines.add_column(
        Column::new("id", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    lines.add_column(
        Column::new("order_id", TypeCode::Integer)
            .nullable(false)
            .raw_complete_type("INTEGER"),
    );
    lines.add_foreign_key(ForeignKey::new(
        "fk_order_lines_order",
        "orders",
        vec![Reference::new("order_id", "id")],
    ));

    let changes = comparator().compare(
        &database(vec![orders_table()]),
        &database(vec![orders_table(), lines]),
    );
    assert_eq!(changes.len(), 2);
    match &changes[0] {
        Change::AddTable { table } => assert!(table.foreign_keys.is_empty()),
        other => panic!("expected AddTable, got {:?}", other),
    }
    assert!(matches!(changes[1], Change::AddForeignKey { .. }));
}

// --- SQL builder ---

#[test]
fn required_column_addition_gets_a_placeholder_default() {
    let current = database(vec![orders_table()]);
    let mut target_table = orders_table();
    target_table.add_column(
        Column::new("qty", TypeCode::Integer)
            .nullable(false)
            .raw_complete_type("INTEGER"),
    );
    let desired = database(vec![target_table]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    assert_eq!(
        sql,
        "-- TODO: replace the placeholder value for qty\n\
         ALTER TABLE \"orders\" ADD COLUMN \"qty\" INTEGER DEFAULT -1 NOT NULL;\n\
         ALTER TABLE \"orders\" ALTER COLUMN \"qty\" DROP DEFAULT;\n"
    );
}

#[test]
fn nullable_column_addition_is_a_plain_alter() {
    let current = database(vec![orders_table()]);
    let mut target_table = orders_table();
    target_table.add_column(
        Column::new("note", TypeCode::Varchar)
            .size(64)
            .raw_complete_type("VARCHAR(64)"),
    );
    let desired = database(vec![target_table]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    assert_eq!(sql, "ALTER TABLE \"orders\" ADD COLUMN \"note\" VARCHAR(64);\n");
}

#[test]
fn primary_key_change_rebuilds_through_a_temporary_table() {
    let current = database(vec![orders_table()]);
    let mut target_table = orders_table();
    target_table.find_column_mut("id", false).unwrap().primary_key = false;
    target_table.find_column_mut("code", false).unwrap().primary_key = true;
    let desired = database(vec![target_table]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    assert!(sql.contains("CREATE TABLE \"orders_\""));
    assert!(sql.contains("INSERT INTO \"orders_\" (\"id\", \"code\") SELECT \"id\", \"code\" FROM \"orders\";"));
    assert!(sql.contains("DROP TABLE \"orders\";"));
    assert!(sql.contains("CONSTRAINT \"orders_pkey\" PRIMARY KEY (\"code\")"));
    assert!(sql.contains("INSERT INTO \"orders\" (\"id\", \"code\") SELECT \"id\", \"code\" FROM \"orders_\";"));
    assert!(sql.trim_end().ends_with("DROP TABLE \"orders_\";"));
}

#[test]
fn unsafe_addition_during_rebuild_drops_and_recreates() {
    let current = database(vec![orders_table()]);
    let mut target_table = orders_table();
    target_table.find_column_mut("id", false).unwrap().primary_key = false;
    target_table.find_column_mut("code", false).unwrap().primary_key = true;
    target_table.add_column(
        Column::new("qty", TypeCode::Integer)
            .nullable(false)
            .raw_complete_type("INTEGER"),
    );
    let desired = database(vec![target_table]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    assert!(sql.starts_with("DROP TABLE \"orders\";"));
    assert!(sql.contains("CREATE TABLE \"orders\""));
    assert!(!sql.contains("INSERT INTO"));
}

#[test]
fn foreign_keys_are_added_after_every_table_exists() {
    // "aaa" is declared before the table it references
    let mut aaa = Table::new("aaa");
    aaa.add_column(
        Column::new("id", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    aaa.add_column(
        Column::new("zzz_id", TypeCode::Integer)
            .nullable(false)
            .raw_complete_type("INTEGER"),
    );
    aaa.add_foreign_key(ForeignKey::new(
        "fk_aaa_zzz",
        "zzz",
        vec![Reference::new("zzz_id", "id")],
    ));
    let mut zzz = Table::new("zzz");
    zzz.add_column(
        Column::new("id", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    let desired = database(vec![aaa, zzz]);

    let sql = generator()
        .generate_migration_sql(&database(vec![]), &desired)
        .unwrap();
    let referenced = sql.find("CREATE TABLE \"zzz\"").unwrap();
    let constraint = sql.find("ADD CONSTRAINT \"fk_aaa_zzz\"").unwrap();
    assert!(referenced < constraint);
}

#[test]
fn rebuilt_table_keeps_its_foreign_keys() {
    let mut lines = Table::new("lines");
    lines.add_column(
        Column::new("id", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    lines.add_column(
        Column::new("order_id", TypeCode::Integer)
            .nullable(false)
            .raw_complete_type("INTEGER"),
    );
    lines.add_foreign_key(ForeignKey::new(
        "fk_lines_order",
        "orders",
        vec![Reference::new("order_id", "id")],
    ));
    let current = database(vec![orders_table(), lines.clone()]);

    let mut target_lines = lines;
    target_lines.find_column_mut("id", false).unwrap().primary_key = false;
    target_lines.find_column_mut("order_id", false).unwrap().primary_key = true;
    let desired = database(vec![orders_table(), target_lines]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    let recreated = sql.rfind("CREATE TABLE \"lines\"").unwrap();
    let restored = sql
        .find("ALTER TABLE \"lines\" ADD CONSTRAINT \"fk_lines_order\"")
        .unwrap();
    assert!(recreated < restored);
    assert!(sql.contains("REFERENCES \"orders\" (\"id\")"));
}

#[test]
fn referencing_constraints_are_detached_around_a_rebuild() {
    let mut lines = Table::new("lines");
    lines.add_column(
        Column::new("id", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    lines.add_column(
        Column::new("order_id", TypeCode::Integer)
            .nullable(false)
            .raw_complete_type("INTEGER"),
    );
    lines.add_foreign_key(ForeignKey::new(
        "fk_lines_order",
        "orders",
        vec![Reference::new("order_id", "id")],
    ));
    let current = database(vec![orders_table(), lines.clone()]);

    // the primary key of the referenced table moves, forcing its rebuild
    let mut target_orders = orders_table();
    target_orders.find_column_mut("id", false).unwrap().primary_key = false;
    target_orders.find_column_mut("code", false).unwrap().primary_key = true;
    let desired = database(vec![target_orders, lines]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    let detached = sql
        .find("ALTER TABLE \"lines\" DROP CONSTRAINT \"fk_lines_order\";")
        .unwrap();
    let dropped = sql.find("DROP TABLE \"orders\";").unwrap();
    let recreated = sql.rfind("CREATE TABLE \"orders\"").unwrap();
    let restored = sql
        .find("ALTER TABLE \"lines\" ADD CONSTRAINT \"fk_lines_order\"")
        .unwrap();
    assert!(detached < dropped);
    assert!(recreated < restored);
}

#[test]
fn row_copy_is_skipped_when_no_columns_survive() {
    let mut source_table = Table::new("t");
    source_table.add_column(
        Column::new("a", TypeCode::Integer)
            .primary_key()
            .raw_complete_type("INTEGER"),
    );
    let mut target_table = Table::new("t");
    target_table.add_column(
        Column::new("b", TypeCode::Integer)
            .primary_key()
            .default_value("0")
            .raw_complete_type("INTEGER"),
    );

    let sql = generator()
        .generate_migration_sql(&database(vec![source_table]), &database(vec![target_table]))
        .unwrap();
    assert!(!sql.contains("INSERT INTO \"t_\""));
    assert!(sql.contains("INSERT INTO \"t\" (\"b\") SELECT \"b\" FROM \"t_\";"));
}

#[test]
fn new_table_is_a_single_create_statement_with_embedded_key() {
    let mut table = widgets_table();
    table.description = Some("a widget table".to_string());
    let desired = database(vec![table]);

    let sql = generator()
        .generate_migration_sql(&database(vec![]), &desired)
        .unwrap();
    assert_eq!(
        sql,
        "CREATE TABLE \"widgets\" (\n\
         \x20 \"id\" INTEGER NOT NULL,\n\
         \x20 \"name\" VARCHAR(255) NOT NULL,\n\
         \x20 CONSTRAINT \"widgets_pkey\" PRIMARY KEY (\"id\")\n\
         );\n\
         COMMENT ON TABLE \"widgets\" IS 'a widget table';\n"
    );
}

#[test]
fn table_description_change_is_a_single_comment_statement() {
    let current = database(vec![widgets_table()]);
    let mut target_table = widgets_table();
    target_table.description = Some("a widget table".to_string());
    let desired = database(vec![target_table]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    assert_eq!(sql, "COMMENT ON TABLE \"widgets\" IS 'a widget table';\n");
}

#[test]
fn removed_description_is_set_to_null() {
    let mut source_table = widgets_table();
    source_table.description = Some("a widget table".to_string());
    let current = database(vec![source_table]);
    let desired = database(vec![widgets_table()]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    assert_eq!(sql, "COMMENT ON TABLE \"widgets\" IS NULL;\n");
}

#[test]
fn partial_index_renders_its_predicate() {
    let current = database(vec![widgets_table()]);
    let mut target_table = widgets_table();
    target_table.add_index(
        Index::new("ix_widgets_name_live", &["name"]).filter("name IS NOT NULL"),
    );
    let desired = database(vec![target_table]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    assert_eq!(
        sql,
        "CREATE INDEX \"ix_widgets_name_live\" ON \"widgets\" (\"name\") WHERE name IS NOT NULL;\n"
    );
}

#[test]
fn unique_index_is_dropped_as_a_constraint() {
    let mut source_table = widgets_table();
    source_table.add_index(Index::new("uq_widgets_name", &["name"]).unique());
    let current = database(vec![source_table]);
    let desired = database(vec![widgets_table()]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    assert_eq!(sql, "ALTER TABLE \"widgets\" DROP CONSTRAINT \"uq_widgets_name\";\n");
}

#[test]
fn index_over_a_missing_column_is_rejected() {
    let current = database(vec![widgets_table()]);
    let mut target_table = widgets_table();
    target_table.add_index(Index::new("ix_widgets_ghost", &["ghost"]));
    let desired = database(vec![target_table]);

    let result = generator().generate_migration_sql(&current, &desired);
    assert!(matches!(result, Err(Error::InvalidModel(_))));
}

#[test]
fn raw_type_change_renders_as_an_alter_type() {
    let current = database(vec![orders_table()]);
    let mut target_table = orders_table();
    *target_table.find_column_mut("code", false).unwrap() = Column::new("code", TypeCode::Clob)
        .nullable(false)
        .raw_complete_type("TEXT");
    let desired = database(vec![target_table]);

    let sql = generator().generate_migration_sql(&current, &desired).unwrap();
    assert_eq!(sql, "ALTER TABLE \"orders\" ALTER COLUMN \"code\" TYPE TEXT;\n");
}

#[test]
fn auto_increment_integers_render_as_serial() {
    let builder = PostgresPlatform::new(None).sql_builder();
    let mut id = Column::new("id", TypeCode::Integer).primary_key();
    id.auto_increment = true;
    assert_eq!(builder.sql_type(&id), "SERIAL");

    let mut big = Column::new("id", TypeCode::BigInt).primary_key();
    big.auto_increment = true;
    assert_eq!(builder.sql_type(&big), "BIGSERIAL");
}

// --- type reconciliation chain ---

#[rstest]
#[case("BOOL", None, None, "BOOLEAN")]
#[case("INT2", None, None, "SMALLINT")]
#[case("INT4", None, None, "INTEGER")]
#[case("INT8", None, None, "BIGINT")]
#[case("VARCHAR", Some(255), None, "VARCHAR(255)")]
#[case("NUMERIC", Some(38), Some(2), "NUMERIC(38,2)")]
#[case("TIMESTAMP", None, Some(3), "TIMESTAMP(3)")]
#[case("TIMESTAMPTZ", None, None, "TIMESTAMP(6) WITH TIME ZONE")]
#[case("_INT4", None, None, "INT4[]")]
fn default_chain_normalizes_native_types(
    #[case] db_type: &str,
    #[case] size: Option<u32>,
    #[case] scale: Option<u32>,
    #[case] expected: &str,
) {
    let mapping = PostgresPlatform::default_type_mapping();
    let mut column = Column::new("c", TypeCode::Other);
    column.size = size;
    column.scale = scale;

    let mapped = mapping.map(db_type, column);
    assert_eq!(mapped.raw_complete_type.as_deref(), Some(expected));
}

#[test]
fn unknown_types_pass_through_the_chain_unchanged() {
    let mapping = PostgresPlatform::default_type_mapping();
    let mapped = mapping.map("UUID", Column::new("c", TypeCode::Other));
    assert_eq!(mapped.raw_complete_type.as_deref(), Some("UUID"));
    assert_eq!(mapped.raw_type.as_deref(), Some("UUID"));
}

#[rstest]
#[case("NUMERIC(38,2)", "NUMERIC")]
#[case("VARCHAR(255)", "VARCHAR")]
#[case("TIMESTAMP(6) WITH TIME ZONE", "TIMESTAMP WITH TIME ZONE")]
#[case("TEXT", "TEXT")]
fn parameter_lists_are_stripped_from_type_keys(#[case] complete: &str, #[case] expected: &str) {
    assert_eq!(strip_type_parameters(complete), expected);
}

// --- filter, naming, platform lookup ---

#[test]
fn default_filter_protects_the_bookkeeping_table() {
    let filter = default_change_filter("flyway_schema_history");

    assert!(!filter(&Change::RemoveTable {
        table_name: "FLYWAY_SCHEMA_HISTORY".to_string(),
    }));
    assert!(!filter(&Change::ColumnOrderChange {
        table_name: "widgets".to_string(),
        column_order: vec![],
    }));
    assert!(filter(&Change::RemoveTable {
        table_name: "widgets".to_string(),
    }));
}

#[test]
fn long_identifiers_are_shortened_deterministically() {
    let short = "orders";
    assert_eq!(naming::shorten_identifier(short, 63), "orders");

    let long = "a_very_long_index_name_that_certainly_exceeds_the_postgres_identifier_limit";
    let first = naming::shorten_identifier(long, 63);
    let second = naming::shorten_identifier(long, 63);
    assert_eq!(first.len(), 63);
    assert_eq!(first, second);
    assert!(first.starts_with("a_very_long_index_name"));
}

#[test]
fn unknown_platforms_are_rejected() {
    assert!(create_platform("postgresql", None).is_ok());
    assert!(create_platform("PostgreSQL 15.2", None).is_ok());
    assert!(matches!(
        create_platform("oracle", None),
        Err(Error::UnsupportedPlatform(_))
    ));
}

#[test]
fn schema_config_defaults_apply() {
    let config: crate::Config = toml::from_str(
        r#"
        [database]
        driver = "postgresql"
        url = "postgres://localhost/app"

        [schema]
        "#,
    )
    .unwrap();

    assert!(!config.schema.case_sensitive);
    assert_eq!(config.schema.history_table, "flyway_schema_history");
}

#[test]
fn models_round_trip_through_json() {
    let model = database(vec![widgets_table(), orders_table()]);
    let encoded = serde_json::to_string(&model).unwrap();
    let decoded: Database = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, model);
}
