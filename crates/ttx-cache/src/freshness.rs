//! Export freshness: which artifacts changed since their last export.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::schema::{FRESHNESS_TABLE, schema_statements};

/// Last export of one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessRecord {
    pub artifact_id: String,
    pub source_mtime: DateTime<Utc>,
    pub last_export_time: DateTime<Utc>,
    /// False when the artifact was only assessed and nothing was published.
    pub exported: bool,
}

/// Persistence for freshness records.
pub trait FreshnessStore {
    fn get(&self, artifact_id: &str) -> Result<Option<FreshnessRecord>>;

    fn put(&mut self, record: FreshnessRecord) -> Result<()>;
}

/// Records held in memory, for tests and runs without a cache database.
#[derive(Debug, Clone, Default)]
pub struct MemoryFreshnessStore {
    records: BTreeMap<String, FreshnessRecord>,
}

impl MemoryFreshnessStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FreshnessStore for MemoryFreshnessStore {
    fn get(&self, artifact_id: &str) -> Result<Option<FreshnessRecord>> {
        Ok(self.records.get(artifact_id).cloned())
    }

    fn put(&mut self, record: FreshnessRecord) -> Result<()> {
        self.records.insert(record.artifact_id.clone(), record);
        Ok(())
    }
}

/// Records in the `tt_export_freshness` table of the cache database.
pub struct SqliteFreshnessStore {
    conn: Connection,
    /// False for a read-only cache that predates the freshness table.
    has_table: bool,
}

impl SqliteFreshnessStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Opens an existing cache without creating or changing anything.
    /// Writes through this store fail.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let has_table = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![FRESHNESS_TABLE],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        debug!(path = %path.display(), has_table, "opened freshness records read-only");
        Ok(Self { conn, has_table })
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        for statement in schema_statements() {
            conn.execute(&statement, [])?;
        }
        Ok(Self {
            conn,
            has_table: true,
        })
    }
}

impl FreshnessStore for SqliteFreshnessStore {
    fn get(&self, artifact_id: &str) -> Result<Option<FreshnessRecord>> {
        if !self.has_table {
            return Ok(None);
        }
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT artifact_id, source_mtime, last_export_time, exported \
                     FROM {FRESHNESS_TABLE} WHERE artifact_id = ?1"
                ),
                params![artifact_id],
                |row| {
                    Ok(FreshnessRecord {
                        artifact_id: row.get(0)?,
                        source_mtime: row.get(1)?,
                        last_export_time: row.get(2)?,
                        exported: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn put(&mut self, record: FreshnessRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {FRESHNESS_TABLE} \
                 (artifact_id, source_mtime, last_export_time, exported) \
                 VALUES (?1, ?2, ?3, ?4)"
            ),
            params![
                record.artifact_id,
                record.source_mtime,
                record.last_export_time,
                record.exported
            ],
        )?;
        Ok(())
    }
}

/// Freshness id of an integrated variable.
pub fn variable_artifact(variable: &str) -> String {
    format!("integrated:{}", variable.to_uppercase())
}

/// Freshness id of a sample's source variables.
pub fn sample_artifact(sample: &str) -> String {
    format!("sample:{}", sample.to_lowercase())
}

impl<S: FreshnessStore + ?Sized> FreshnessStore for Box<S> {
    fn get(&self, artifact_id: &str) -> Result<Option<FreshnessRecord>> {
        (**self).get(artifact_id)
    }

    fn put(&mut self, record: FreshnessRecord) -> Result<()> {
        (**self).put(record)
    }
}

/// Outcome of [`FreshnessTracker::sample_decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDecision {
    /// Exported since the dictionary last changed.
    Current,
    Export,
    /// Stale, but nothing would be published; record it as assessed.
    Assessed,
}

/// Export decisions over a [`FreshnessStore`].
pub struct FreshnessTracker<S> {
    store: S,
    force: bool,
    publishes_svars: bool,
}

impl<S: FreshnessStore> FreshnessTracker<S> {
    pub fn new(store: S, force: bool, publishes_svars: bool) -> Self {
        Self {
            store,
            force,
            publishes_svars,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// True when the artifact was never exported or its source changed
    /// after the last export. Always true when forced.
    pub fn needs_export(&self, artifact_id: &str, source_mtime: SystemTime) -> Result<bool> {
        if self.force {
            return Ok(true);
        }
        let Some(record) = self.store.get(artifact_id)? else {
            debug!(artifact = artifact_id, "no export record");
            return Ok(true);
        };
        Ok(DateTime::<Utc>::from(source_mtime) > record.last_export_time)
    }

    /// Sample variant of [`needs_export`](Self::needs_export).
    ///
    /// When the project does not publish source variables a stale sample is
    /// only worth exporting if its dictionary recodes something;
    /// `has_recodes` is called only in that case.
    pub fn sample_decision<E>(
        &self,
        sample: &str,
        source_mtime: SystemTime,
        has_recodes: impl FnOnce() -> std::result::Result<bool, E>,
    ) -> std::result::Result<SampleDecision, E>
    where
        E: From<CacheError>,
    {
        if !self.needs_export(&sample_artifact(sample), source_mtime)? {
            return Ok(SampleDecision::Current);
        }
        if self.publishes_svars || has_recodes()? {
            Ok(SampleDecision::Export)
        } else {
            Ok(SampleDecision::Assessed)
        }
    }

    /// Whether a sample export publishes anything; otherwise it is only
    /// recorded as assessed.
    pub fn sample_exported_flag(&self) -> bool {
        self.publishes_svars
    }

    /// Records a successful export. Call only after the cache write
    /// committed.
    pub fn mark_exported(
        &mut self,
        artifact_id: &str,
        source_mtime: SystemTime,
        exported: bool,
    ) -> Result<()> {
        self.store.put(FreshnessRecord {
            artifact_id: artifact_id.to_string(),
            source_mtime: DateTime::<Utc>::from(source_mtime),
            last_export_time: Utc::now(),
            exported,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tracker(force: bool, publishes_svars: bool) -> FreshnessTracker<MemoryFreshnessStore> {
        FreshnessTracker::new(MemoryFreshnessStore::new(), force, publishes_svars)
    }

    #[test]
    fn unseen_artifacts_need_export() {
        let tracker = tracker(false, true);
        assert!(tracker.needs_export("integrated:AGE", SystemTime::now()).unwrap());
    }

    #[test]
    fn marked_artifacts_are_fresh_until_source_changes() {
        let mut tracker = tracker(false, true);
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        tracker.mark_exported("integrated:AGE", mtime, true).unwrap();
        assert!(!tracker.needs_export("integrated:AGE", mtime).unwrap());

        let later = SystemTime::now() + Duration::from_secs(3_600);
        assert!(tracker.needs_export("integrated:AGE", later).unwrap());
    }

    #[test]
    fn force_overrides_records() {
        let mut tracker = tracker(true, true);
        tracker
            .mark_exported("integrated:AGE", SystemTime::UNIX_EPOCH, true)
            .unwrap();
        assert!(tracker.needs_export("integrated:AGE", SystemTime::UNIX_EPOCH).unwrap());
    }

    #[test]
    fn non_publishing_projects_check_recodes_lazily() {
        let tracker = tracker(false, false);
        let mut calls = 0;
        let decision = tracker
            .sample_decision::<CacheError>("us2000a", SystemTime::now(), || {
                calls += 1;
                Ok(false)
            })
            .unwrap();
        assert_eq!(decision, SampleDecision::Assessed);
        assert_eq!(calls, 1);

        let publishing = self::tracker(false, true);
        let decision = publishing
            .sample_decision::<CacheError>("us2000a", SystemTime::now(), || {
                panic!("recodes checked for a publishing project")
            })
            .unwrap();
        assert_eq!(decision, SampleDecision::Export);
    }

    #[test]
    fn current_samples_skip_the_recode_check() {
        let mut tracker = tracker(false, false);
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        tracker
            .mark_exported(&sample_artifact("us2000a"), mtime, false)
            .unwrap();
        let decision = tracker
            .sample_decision::<CacheError>("us2000a", mtime, || {
                panic!("recodes checked for a current sample")
            })
            .unwrap();
        assert_eq!(decision, SampleDecision::Current);
    }

    #[test]
    fn read_only_store_leaves_the_cache_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.db");
        Connection::open(&path)
            .unwrap()
            .execute("CREATE TABLE project (name TEXT)", [])
            .unwrap();

        let mut store = SqliteFreshnessStore::open_read_only(&path).unwrap();
        assert!(store.get("integrated:AGE").unwrap().is_none());
        let stamp = DateTime::<Utc>::from(SystemTime::UNIX_EPOCH);
        let write = store.put(FreshnessRecord {
            artifact_id: "integrated:AGE".into(),
            source_mtime: stamp,
            last_export_time: stamp,
            exported: true,
        });
        assert!(write.is_err());

        let tables: i64 = Connection::open(&path)
            .unwrap()
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn read_only_store_sees_committed_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.db");
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        {
            let mut tracker =
                FreshnessTracker::new(SqliteFreshnessStore::open(&path).unwrap(), false, true);
            tracker.mark_exported("integrated:AGE", mtime, true).unwrap();
        }
        let tracker =
            FreshnessTracker::new(SqliteFreshnessStore::open_read_only(&path).unwrap(), false, true);
        assert!(!tracker.needs_export("integrated:AGE", mtime).unwrap());
        assert!(tracker.needs_export("integrated:SEX", mtime).unwrap());
    }

    #[test]
    fn sqlite_store_round_trips_records() {
        let mut store = SqliteFreshnessStore::open_in_memory().unwrap();
        let stamp = DateTime::<Utc>::from(SystemTime::UNIX_EPOCH + Duration::from_secs(60));
        store
            .put(FreshnessRecord {
                artifact_id: sample_artifact("US2000A"),
                source_mtime: stamp,
                last_export_time: stamp,
                exported: false,
            })
            .unwrap();
        let record = store.get("sample:us2000a").unwrap().unwrap();
        assert_eq!(record.source_mtime, stamp);
        assert!(!record.exported);
        assert!(store.get("sample:us2001a").unwrap().is_none());
    }
}
