use thiserror::Error;

/// Failure talking to the cache database.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cache database belongs to project {found}, not {expected}")]
    ProjectMismatch { expected: String, found: String },
}

/// A unit whose flush was rolled back.
#[derive(Debug, Error)]
#[error("cache write for {unit} rolled back: {source}")]
pub struct CacheWriteError {
    pub unit: String,
    #[source]
    pub source: CacheError,
}

pub type Result<T> = std::result::Result<T, CacheError>;
