//! SQL generated from the static table definitions.

use rusqlite::types::Value;

use ttx_model::{DeleteScope, DeleteStatement, RowValue, TableSchema, TtTable};

pub(crate) const FRESHNESS_TABLE: &str = "tt_export_freshness";
pub(crate) const PROJECT_TABLE: &str = "project";

const FRESHNESS_DDL: &str = "CREATE TABLE IF NOT EXISTS tt_export_freshness (
    artifact_id TEXT PRIMARY KEY,
    source_mtime TIMESTAMP NOT NULL,
    last_export_time TIMESTAMP NOT NULL,
    exported INT NOT NULL
)";

const PROJECT_DDL: &str = "CREATE TABLE IF NOT EXISTS project (name VARCHAR(255) NOT NULL)";

pub(crate) fn create_table_sql(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .columns
        .iter()
        .map(|column| format!("{} {}", column.name, column.sql_type))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}))",
        schema.name,
        columns.join(", "),
        schema.primary_key.join(", ")
    )
}

pub(crate) fn create_index_sql(schema: &TableSchema) -> Vec<String> {
    schema
        .indexes
        .iter()
        .map(|index| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                index.name,
                schema.name,
                index.columns.join(", ")
            )
        })
        .collect()
}

/// Every statement needed to create the cache schema.
pub(crate) fn schema_statements() -> Vec<String> {
    let mut statements = Vec::new();
    for table in TtTable::ALL {
        let schema = table.schema();
        statements.push(create_table_sql(schema));
        statements.extend(create_index_sql(schema));
    }
    statements.push(FRESHNESS_DDL.to_string());
    statements.push(PROJECT_DDL.to_string());
    statements
}

pub(crate) fn insert_sql(schema: &TableSchema) -> String {
    let names: Vec<&str> = schema.column_names().collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|n| format!("?{n}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.name,
        names.join(", "),
        placeholders.join(", ")
    )
}

const SVARS_OF_SAMPLE: &str =
    "SELECT variable FROM tt_samplevariables WHERE sample = ?1 AND is_svar = 1";

/// SQL and its single bound argument for a scoped delete.
pub(crate) fn delete_sql(statement: &DeleteStatement) -> (String, String) {
    let schema = statement.table.schema();
    let table = schema.name;
    if statement.table == TtTable::LastUpdated {
        let key = match &statement.scope {
            DeleteScope::Variable(name)
            | DeleteScope::SampleSvars(name)
            | DeleteScope::Unit(name) => name.clone(),
        };
        return (
            format!("DELETE FROM {table} WHERE sample_or_variable = ?1"),
            key,
        );
    }
    match &statement.scope {
        DeleteScope::Variable(variable) | DeleteScope::Unit(variable) => (
            format!("DELETE FROM {table} WHERE variable = ?1"),
            variable.clone(),
        ),
        DeleteScope::SampleSvars(sample) => {
            let sql = if schema.has_column("is_svar") {
                format!("DELETE FROM {table} WHERE sample = ?1 AND is_svar = 1")
            } else if schema.has_column("sample") {
                format!(
                    "DELETE FROM {table} WHERE sample = ?1 AND variable IN ({SVARS_OF_SAMPLE})"
                )
            } else {
                format!("DELETE FROM {table} WHERE variable IN ({SVARS_OF_SAMPLE})")
            };
            (sql, sample.clone())
        }
    }
}

pub(crate) fn sql_value(value: RowValue) -> Value {
    match value {
        RowValue::Null => Value::Null,
        RowValue::Integer(number) => Value::Integer(number),
        RowValue::Text(text) => Value::Text(text),
    }
}
