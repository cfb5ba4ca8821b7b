use std::fmt;
use std::path::PathBuf;

use ttx_cache::InvalidRow;
use ttx_model::Diagnostics;

/// The two export phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Integrated,
    Samples,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Integrated => "Integrated variables",
            Phase::Samples => "Source variables",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub exported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub files_written: usize,
    pub rows_inserted: usize,
}

impl PhaseSummary {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            exported: 0,
            skipped: 0,
            failed: 0,
            files_written: 0,
            rows_inserted: 0,
        }
    }
}

/// One failed variable, svar or sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub item: String,
    pub message: String,
}

impl ItemError {
    pub fn new(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "! {} : {}", self.item, self.message)
    }
}

#[derive(Debug)]
pub struct ExportResult {
    pub project: String,
    pub output_root: PathBuf,
    pub database: Option<PathBuf>,
    pub dry_run: bool,
    pub phases: Vec<PhaseSummary>,
    /// Exported items, or the items a dry run would export.
    pub exported: Vec<String>,
    pub errors: Vec<ItemError>,
    pub diagnostics: Diagnostics,
    pub removed_files: Vec<PathBuf>,
    pub removed_variables: Vec<String>,
}

impl ExportResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseSummary> {
        self.phases.iter().find(|summary| summary.phase == phase)
    }
}

#[derive(Debug)]
pub struct CheckResult {
    pub database: PathBuf,
    pub invalid_rows: Vec<InvalidRow>,
}
