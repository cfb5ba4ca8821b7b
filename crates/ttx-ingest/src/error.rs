//! Error types for project metadata ingestion.

use std::path::PathBuf;

use thiserror::Error;
use ttx_model::{ConfigError, SourceError};

/// Errors that can occur while reading a project directory.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Directory not found or not readable.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Metadata file for a named item does not exist.
    #[error("no {kind} found for {name} at {path}")]
    FileNotFound {
        kind: &'static str,
        name: String,
        path: PathBuf,
    },

    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Parsing Errors ===
    #[error("failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    #[error("failed to parse JSON {path}: {message}")]
    JsonParse { path: PathBuf, message: String },

    /// Required column not found in a metadata CSV.
    #[error("required column '{column}' not found in {path}")]
    MissingColumn { column: String, path: PathBuf },

    // === Lookup Errors ===
    /// No data dictionary defines the source variable.
    #[error("no data dictionary defines svar {svar}")]
    UnknownSvar { svar: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<IngestError> for SourceError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::FileNotFound { kind, name, .. } => SourceError::NotFound { kind, name },
            IngestError::UnknownSvar { svar } => SourceError::not_found("sample for svar", svar),
            IngestError::FileRead { path, source } => SourceError::Read { path, source },
            IngestError::CsvParse { path, message } | IngestError::JsonParse { path, message } => {
                SourceError::Parse { path, message }
            }
            other => SourceError::Message(other.to_string()),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
