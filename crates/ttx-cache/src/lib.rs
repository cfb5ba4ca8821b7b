//! Translation-table cache.
//!
//! - **writer**: schema creation and transactional per-unit flushes
//! - **freshness**: export decisions from source modification times

mod error;
pub mod freshness;
mod schema;
pub mod writer;

pub use error::{CacheError, CacheWriteError, Result};
pub use freshness::{
    FreshnessRecord, FreshnessStore, FreshnessTracker, MemoryFreshnessStore, SampleDecision,
    SqliteFreshnessStore, sample_artifact, variable_artifact,
};
pub use writer::{CacheWriter, FlushStats, InvalidRow, UnitBatch};
