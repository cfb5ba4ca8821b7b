//! Relational table definitions for the translation-table cache.
//!
//! The relational serializer produces [`TableRows`] keyed by [`TtTable`];
//! the cache writer turns the same definitions into DDL and insert
//! statements, so both sides agree on column names.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A column with its declared SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
}

const fn col(name: &'static str, sql_type: &'static str) -> Column {
    Column { name, sql_type }
}

/// A named secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

/// Static schema of one cache table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub primary_key: &'static [&'static str],
    pub indexes: &'static [Index],
}

impl TableSchema {
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|column| column.name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }
}

const SAMPLE_VARIABLES: TableSchema = TableSchema {
    name: "tt_samplevariables",
    columns: &[
        col("sample", "VARCHAR(255)"),
        col("variable", "VARCHAR(255)"),
        col("hide", "INT"),
        col("svar_doc", "VARCHAR(255)"),
        col("is_svar", "INT"),
        col("rectype", "VARCHAR(10)"),
        col("norecode", "INT"),
        col("anchor_inst", "VARCHAR(10)"),
        col("univ", "VARCHAR(255)"),
        col("anchor_form", "VARCHAR(25)"),
        col("restricted", "VARCHAR(20)"),
        col("date_created", "TIMESTAMP"),
    ],
    primary_key: &["variable", "sample"],
    indexes: &[
        Index {
            name: "tt_variable_idx",
            columns: &["variable"],
        },
        Index {
            name: "tt_sample_idx",
            columns: &["sample"],
        },
    ],
};

const SOURCES: TableSchema = TableSchema {
    name: "tt_samplevariables_sources",
    columns: &[
        col("sample", "VARCHAR(255)"),
        col("variable", "VARCHAR(255)"),
        col("source", "VARCHAR(25)"),
        col("is_svar", "INT"),
        col("source_order", "INT"),
        col("col_start", "INT"),
        col("col_end", "INT"),
        col("date_created", "TIMESTAMP"),
    ],
    primary_key: &["variable", "sample", "source"],
    indexes: &[
        Index {
            name: "tt_samplevariables_sources_variables_idx",
            columns: &["variable"],
        },
        Index {
            name: "tt_samplevariables_sources_samples_idx",
            columns: &["sample"],
        },
        Index {
            name: "tt_samplevariables_sources_is_svar_idx",
            columns: &["is_svar"],
        },
    ],
};

const RECODINGS: TableSchema = TableSchema {
    name: "tt_samplevariables_recodings",
    columns: &[
        col("sample", "VARCHAR(255)"),
        col("variable", "VARCHAR(255)"),
        col("outputcode", "BLOB"),
        col("inputcode", "BLOB"),
        col("date_created", "TIMESTAMP"),
    ],
    primary_key: &["variable", "sample", "inputcode"],
    indexes: &[
        Index {
            name: "tt_samplevariables_recodings_sample_idx",
            columns: &["sample"],
        },
        Index {
            name: "tt_samplevariables_recodings_variable_idx",
            columns: &["variable"],
        },
    ],
};

const VARIABLE_LABELS: TableSchema = TableSchema {
    name: "tt_variable_labels",
    columns: &[
        col("labelid", "INT"),
        col("variable", "VARCHAR(255)"),
        col("labelonly", "INT"),
        col("label", "VARCHAR(255)"),
        col("indent", "INT"),
        col("genlab", "VARCHAR(255)"),
        col("indentgen", "INT"),
        col("syntax", "VARCHAR(255)"),
        col("codetype", "VARCHAR(255)"),
        col("outputcode", "VARCHAR(255)"),
        col("missing", "VARCHAR(255)"),
        col("date_created", "TIMESTAMP"),
    ],
    primary_key: &["variable", "labelid"],
    indexes: &[Index {
        name: "tt_variable_labels_variable_idx",
        columns: &["variable"],
    }],
};

const UNIVERSE_DISPLAY_IDS: TableSchema = TableSchema {
    name: "tt_variable_universedisplayids",
    columns: &[
        col("universedisplayid", "INT"),
        col("variable", "VARCHAR(255)"),
        col("nosampstatement", "INT"),
        col("makesampstatement", "VARCHAR(255)"),
        col("sampstatement", "VARCHAR(255)"),
        col("univstatement", "VARCHAR(255)"),
        col("date_created", "TIMESTAMP"),
    ],
    primary_key: &["variable", "universedisplayid"],
    indexes: &[Index {
        name: "tt_variable_universedisplayids_variable_idx",
        columns: &["variable"],
    }],
};

const UNIVERSE_DISPLAY_ID_SAMPLES: TableSchema = TableSchema {
    name: "tt_variable_universedisplayid_samples",
    columns: &[
        col("sample", "VARCHAR(255)"),
        col("variable", "VARCHAR(255)"),
        col("universedisplayid", "INT"),
        col("date_created", "TIMESTAMP"),
    ],
    primary_key: &["variable", "universedisplayid", "sample"],
    indexes: &[Index {
        name: "tt_variable_universedisplayid_samples_sample_idx",
        columns: &["sample"],
    }],
};

const LAST_UPDATED: TableSchema = TableSchema {
    name: "tt_last_updated",
    columns: &[
        col("sample_or_variable", "VARCHAR(255)"),
        col("date_created", "TIMESTAMP"),
    ],
    primary_key: &["sample_or_variable"],
    indexes: &[],
};

/// The seven translation-table cache tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TtTable {
    SampleVariables,
    Sources,
    Recodings,
    VariableLabels,
    UniverseDisplayIds,
    UniverseDisplayIdSamples,
    LastUpdated,
}

impl TtTable {
    pub const ALL: [TtTable; 7] = [
        TtTable::SampleVariables,
        TtTable::Sources,
        TtTable::Recodings,
        TtTable::VariableLabels,
        TtTable::UniverseDisplayIds,
        TtTable::UniverseDisplayIdSamples,
        TtTable::LastUpdated,
    ];

    pub fn schema(self) -> &'static TableSchema {
        match self {
            TtTable::SampleVariables => &SAMPLE_VARIABLES,
            TtTable::Sources => &SOURCES,
            TtTable::Recodings => &RECODINGS,
            TtTable::VariableLabels => &VARIABLE_LABELS,
            TtTable::UniverseDisplayIds => &UNIVERSE_DISPLAY_IDS,
            TtTable::UniverseDisplayIdSamples => &UNIVERSE_DISPLAY_ID_SAMPLES,
            TtTable::LastUpdated => &LAST_UPDATED,
        }
    }

    pub fn name(self) -> &'static str {
        self.schema().name
    }

    /// Tables whose rows carry a `variable` column.
    pub fn is_variable_scoped(self) -> bool {
        self != TtTable::LastUpdated
    }
}

impl fmt::Display for TtTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowValue {
    Null,
    Integer(i64),
    Text(String),
}

impl RowValue {
    /// Coerces a numeric-ish cell: blank becomes 0, digits become an
    /// integer, anything else is kept as text.
    pub fn numeric(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return RowValue::Integer(0);
        }
        match trimmed.parse::<i64>() {
            Ok(value) => RowValue::Integer(value),
            Err(_) => RowValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RowValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for RowValue {
    fn from(value: &str) -> Self {
        RowValue::Text(value.to_string())
    }
}

impl From<String> for RowValue {
    fn from(value: String) -> Self {
        RowValue::Text(value)
    }
}

impl From<&String> for RowValue {
    fn from(value: &String) -> Self {
        RowValue::Text(value.clone())
    }
}

impl From<i64> for RowValue {
    fn from(value: i64) -> Self {
        RowValue::Integer(value)
    }
}

impl From<u32> for RowValue {
    fn from(value: u32) -> Self {
        RowValue::Integer(i64::from(value))
    }
}

impl From<bool> for RowValue {
    fn from(value: bool) -> Self {
        RowValue::Integer(i64::from(value))
    }
}

impl<T: Into<RowValue>> From<Option<T>> for RowValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValue::Null, Into::into)
    }
}

/// One row keyed by column name. Columns absent from the map insert NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: BTreeMap<&'static str, RowValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: &'static str, value: impl Into<RowValue>) -> Self {
        self.values.insert(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&RowValue> {
        self.values.get(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(RowValue::as_text)
    }

    /// Value for `column`, NULL when unset.
    pub fn value_or_null(&self, column: &str) -> RowValue {
        self.get(column).cloned().unwrap_or(RowValue::Null)
    }
}

/// Rows grouped by target table, in insertion order per table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRows {
    tables: BTreeMap<TtTable, Vec<Row>>,
}

impl TableRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, table: TtTable, row: Row) {
        self.tables.entry(table).or_default().push(row);
    }

    pub fn rows(&self, table: TtTable) -> &[Row] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn extend(&mut self, other: TableRows) {
        for (table, rows) in other.tables {
            self.tables.entry(table).or_default().extend(rows);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TtTable, &[Row])> {
        self.tables
            .iter()
            .map(|(table, rows)| (*table, rows.as_slice()))
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// Which rows a scoped delete removes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeleteScope {
    /// Every row of one variable.
    Variable(String),
    /// Every source-variable row belonging to one sample.
    SampleSvars(String),
    /// The `tt_last_updated` row of one export unit.
    Unit(String),
}

/// A delete issued before a unit's inserts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub table: TtTable,
    pub scope: DeleteScope,
}

impl DeleteStatement {
    pub fn new(table: TtTable, scope: DeleteScope) -> Self {
        Self { table, scope }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_keys_exist_as_columns() {
        for table in TtTable::ALL {
            let schema = table.schema();
            for key in schema.primary_key {
                assert!(schema.has_column(key), "{table} missing key {key}");
            }
            for index in schema.indexes {
                for column in index.columns {
                    assert!(schema.has_column(column), "{table} index {}", index.name);
                }
            }
            assert_eq!(table.is_variable_scoped(), schema.has_column("variable"));
        }
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(RowValue::numeric(""), RowValue::Integer(0));
        assert_eq!(RowValue::numeric(" 3 "), RowValue::Integer(3));
        assert_eq!(RowValue::numeric("Y"), RowValue::Text("Y".into()));
    }

    #[test]
    fn table_rows_merge_in_order() {
        let mut first = TableRows::new();
        first.push(TtTable::Recodings, Row::new().with("inputcode", "1"));
        let mut second = TableRows::new();
        second.push(TtTable::Recodings, Row::new().with("inputcode", "2"));
        second.push(TtTable::LastUpdated, Row::new().with("sample_or_variable", "AGE"));
        first.extend(second);

        let codes: Vec<_> = first
            .rows(TtTable::Recodings)
            .iter()
            .filter_map(|row| row.text("inputcode"))
            .collect();
        assert_eq!(codes, ["1", "2"]);
        assert_eq!(first.row_count(), 3);
        assert!(first.rows(TtTable::Sources).is_empty());
    }
}
