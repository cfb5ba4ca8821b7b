//! Transactional writes into the translation-table cache.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info, info_span, warn};

use ttx_model::{DeleteStatement, Row, TableRows, TtTable};

use crate::error::{CacheError, CacheWriteError, Result};
use crate::schema::{PROJECT_TABLE, delete_sql, insert_sql, schema_statements, sql_value};

/// Deletes and rows committed together.
///
/// Integrated variables of one run share a unit; every sample is its own
/// unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitBatch {
    unit_id: String,
    deletes: Vec<DeleteStatement>,
    rows: TableRows,
}

impl UnitBatch {
    pub fn new(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            ..Self::default()
        }
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn deletes(&self) -> &[DeleteStatement] {
        &self.deletes
    }

    pub fn rows(&self) -> &TableRows {
        &self.rows
    }

    pub fn add_deletes(&mut self, deletes: impl IntoIterator<Item = DeleteStatement>) {
        self.deletes.extend(deletes);
    }

    pub fn add_rows(&mut self, rows: TableRows) {
        self.rows.extend(rows);
    }

    pub fn push_row(&mut self, table: TtTable, row: Row) {
        self.rows.push(table, row);
    }

    /// Appends another batch's deletes and rows, keeping this unit's id.
    pub fn merge(&mut self, other: UnitBatch) {
        self.deletes.extend(other.deletes);
        self.rows.extend(other.rows);
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.rows.is_empty()
    }
}

/// Counts from one committed unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub deleted: usize,
    pub inserted: usize,
}

/// A child-table variable with no `tt_samplevariables` row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InvalidRow {
    pub table: TtTable,
    pub variable: String,
}

/// Owner of the cache database connection.
pub struct CacheWriter {
    conn: Connection,
}

impl CacheWriter {
    /// Opens (creating if needed) the cache at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        let writer = Self { conn };
        writer.ensure_tables()?;
        info!(path = %path.display(), "opened translation-table cache");
        Ok(writer)
    }

    pub fn open_in_memory() -> Result<Self> {
        let writer = Self {
            conn: Connection::open_in_memory()?,
        };
        writer.ensure_tables()?;
        Ok(writer)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates missing tables and indexes.
    pub fn ensure_tables(&self) -> Result<()> {
        for statement in schema_statements() {
            self.conn.execute(&statement, [])?;
        }
        Ok(())
    }

    /// Refuses a cache that was built for another project.
    pub fn check_project(&self, name: &str) -> Result<()> {
        let found: Option<String> = self
            .conn
            .query_row(&format!("SELECT name FROM {PROJECT_TABLE} LIMIT 1"), [], |row| {
                row.get(0)
            })
            .optional()?;
        match found {
            Some(found) if found != name => Err(CacheError::ProjectMismatch {
                expected: name.to_string(),
                found,
            }),
            Some(_) => Ok(()),
            None => {
                self.conn.execute(
                    &format!("INSERT INTO {PROJECT_TABLE} (name) VALUES (?1)"),
                    params![name],
                )?;
                Ok(())
            }
        }
    }

    /// Commits one unit: its deletes in order, then every table's rows.
    ///
    /// Nothing from the unit is kept when any statement fails.
    pub fn flush(&mut self, batch: &UnitBatch) -> std::result::Result<FlushStats, CacheWriteError> {
        let span = info_span!("flush", unit = %batch.unit_id);
        let _guard = span.enter();
        self.flush_unit(batch).map_err(|source| {
            warn!(error = %source, "cache unit rolled back");
            CacheWriteError {
                unit: batch.unit_id.clone(),
                source,
            }
        })
    }

    fn flush_unit(&mut self, batch: &UnitBatch) -> Result<FlushStats> {
        let tx = self.conn.transaction()?;
        let mut stats = FlushStats::default();
        let mut issued = HashSet::new();
        for delete in &batch.deletes {
            if !issued.insert(delete) {
                continue;
            }
            let (sql, arg) = delete_sql(delete);
            stats.deleted += tx.execute(&sql, params![arg])?;
        }
        for (table, rows) in batch.rows.iter() {
            let schema = table.schema();
            let mut statement = tx.prepare_cached(&insert_sql(schema))?;
            for row in rows {
                let values = schema
                    .column_names()
                    .map(|column| sql_value(row.value_or_null(column)));
                statement.execute(params_from_iter(values))?;
                stats.inserted += 1;
            }
        }
        tx.commit()?;
        debug!(
            deleted = stats.deleted,
            inserted = stats.inserted,
            "cache unit committed"
        );
        Ok(stats)
    }

    /// Child-table variables with no `tt_samplevariables` row.
    pub fn invalid_rows(&self) -> Result<Vec<InvalidRow>> {
        let mut invalid = Vec::new();
        for table in TtTable::ALL {
            if !table.is_variable_scoped() || table == TtTable::SampleVariables {
                continue;
            }
            let sql = format!(
                "SELECT DISTINCT variable FROM {table} \
                 WHERE variable NOT IN (SELECT variable FROM tt_samplevariables) \
                 ORDER BY variable"
            );
            let mut statement = self.conn.prepare(&sql)?;
            let variables = statement.query_map([], |row| row.get::<_, String>(0))?;
            for variable in variables {
                let variable = variable?;
                warn!(%table, %variable, "cache rows without a sample variable");
                invalid.push(InvalidRow { table, variable });
            }
        }
        Ok(invalid)
    }

    /// Integrated variables present in the cache.
    pub fn integrated_variables(&self) -> Result<BTreeSet<String>> {
        let mut statement = self.conn.prepare(
            "SELECT variable FROM tt_samplevariables WHERE is_svar = 0 \
             UNION \
             SELECT variable FROM tt_variable_labels \
             WHERE variable NOT IN (SELECT variable FROM tt_samplevariables WHERE is_svar = 1)",
        )?;
        let variables = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(variables)
    }

    /// Removes every row of the named variables, in one transaction.
    pub fn remove_variables(&mut self, names: &[String]) -> Result<usize> {
        if names.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        for name in names {
            for table in TtTable::ALL {
                let column = if table.is_variable_scoped() {
                    "variable"
                } else {
                    "sample_or_variable"
                };
                removed += tx.execute(
                    &format!("DELETE FROM {table} WHERE {column} = ?1"),
                    params![name],
                )?;
            }
            info!(variable = %name, "removed variable from cache");
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: TtTable) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
