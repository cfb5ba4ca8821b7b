use std::path::PathBuf;

use thiserror::Error;

/// Failure to build an export record for one variable.
///
/// These are per-item errors: the batch driver records the message and
/// moves on to the next variable.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("sample range goes backwards in time: {token}")]
    SampleRangeDirection { token: String },
    #[error("sample range years must be four digits: {token}")]
    SampleRangeYear { token: String },
    #[error("sample {sample} in universe of {variable} is not a known sample")]
    UnknownSample { variable: String, sample: String },
    #[error("the project's known sample set is empty")]
    EmptySampleCatalog,
    #[error("The svar {svar} is not a NonTab and has a blank ValueSvar")]
    BlankOutputCode { svar: String },
    #[error("svar {svar} not found in data dictionary for {sample}")]
    MissingSourceVariable { svar: String, sample: String },
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Failure reported by a metadata source adapter.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no {kind} found for {name}")]
    NotFound { kind: &'static str, name: String },
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("{0}")]
    Message(String),
}

impl SourceError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        SourceError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

/// Failure to load the project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, TransformError>;
