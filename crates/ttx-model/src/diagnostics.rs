//! Warning collection scoped to one export run.
//!
//! Each worker owns a [`Diagnostics`] value; the batch driver merges them
//! after the parallel phase and reports the result once.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

/// A non-fatal problem found while exporting one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Variable or sample the message is about.
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.subject, self.message)
    }
}

/// Deduplicating collector of diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    seen: BTreeSet<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.push(DiagnosticLevel::Warning, subject.into(), message.into());
    }

    pub fn error(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.push(DiagnosticLevel::Error, subject.into(), message.into());
    }

    fn push(&mut self, level: DiagnosticLevel, subject: String, message: String) {
        let diagnostic = Diagnostic {
            level,
            subject,
            message,
        };
        if !self.seen.insert(diagnostic.clone()) {
            return;
        }
        match level {
            DiagnosticLevel::Warning => {
                tracing::warn!(subject = %diagnostic.subject, "{}", diagnostic.message);
            }
            DiagnosticLevel::Error => {
                tracing::error!(subject = %diagnostic.subject, "{}", diagnostic.message);
            }
        }
        self.entries.push(diagnostic);
    }

    /// Appends `other`, dropping entries already collected.
    pub fn merge(&mut self, other: Diagnostics) {
        for diagnostic in other.entries {
            if self.seen.insert(diagnostic.clone()) {
                self.entries.push(diagnostic);
            }
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn count(&self, level: DiagnosticLevel) -> usize {
        self.entries
            .iter()
            .filter(|diagnostic| diagnostic.level == level)
            .count()
    }
}
