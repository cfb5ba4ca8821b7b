//! Shared types for translation-table export.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod record;
pub mod samples;
pub mod source;
pub mod tables;

pub use config::{ExportSection, FeatureFlags, PROJECT_CONFIG_FILE, ProjectConfig, ProjectSection};
pub use diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
pub use error::{ConfigError, Result, SourceError, TransformError};
pub use record::{
    ColumnRange, ExportRecord, OutputCode, Recoding, SAMPLE_STATEMENT_ALL, SAMPLE_STATEMENT_LIST,
    SampleBlock, UNKNOWN_UNIVERSE, UniverseEntry, VariableKind,
};
pub use samples::SampleCatalog;
pub use source::{
    DataDictionary, InMemorySource, InputCodeRow, MetadataSource, OutputValueRow, SampleColumn,
    SourceVariable, TranslationTable, UniverseRow, ValueRow, VariableEntry,
};
pub use tables::{
    Column, DeleteScope, DeleteStatement, Index, Row, RowValue, TableRows, TableSchema, TtTable,
};
