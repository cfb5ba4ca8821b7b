//! The export record shared by every serializer.
//!
//! An [`ExportRecord`] is built once per variable by the transform engine
//! and consumed immediately by the markup, structured and relational
//! serializers. It is never patched in place.

use serde::{Deserialize, Serialize};

/// Sample statement that marks a universe as applying to every sample.
pub const SAMPLE_STATEMENT_ALL: &str = "[all]";
/// Sample statement that asks consumers to print the sample list.
pub const SAMPLE_STATEMENT_LIST: &str = "[list]";
/// Universe text substituted when a sample has no resolvable universe.
pub const UNKNOWN_UNIVERSE: &str = "UNKNOWN!";

/// Which source an export record was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// Harmonized variable sourced from a translation table.
    Integrated,
    /// Sample-specific variable sourced from a data dictionary.
    Source,
}

impl VariableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableKind::Integrated => "integrated",
            VariableKind::Source => "svar",
        }
    }

    pub fn is_source(self) -> bool {
        self == VariableKind::Source
    }
}

/// One universe statement with the samples it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub sample_statement: String,
    pub universe_statement: String,
    /// `[list]` statements print the sample list.
    pub has_sample_list: bool,
    /// `[all]` statements suppress the sample statement.
    pub no_sample_statement: bool,
    /// Lowercased sample ids in order of appearance.
    pub samples: Vec<String>,
}

impl UniverseEntry {
    /// Builds an entry, deriving the statement flags from `sample_statement`.
    pub fn new(
        sample_statement: impl Into<String>,
        universe_statement: impl Into<String>,
        samples: Vec<String>,
    ) -> Self {
        let sample_statement = sample_statement.into();
        let no_sample_statement = sample_statement == SAMPLE_STATEMENT_ALL;
        let has_sample_list = !no_sample_statement && sample_statement == SAMPLE_STATEMENT_LIST;
        Self {
            sample_statement,
            universe_statement: universe_statement.into(),
            has_sample_list,
            no_sample_statement,
            samples,
        }
    }
}

/// One entry of the output code catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputCode {
    /// 1-based position in the catalog.
    pub id: u32,
    /// Empty for label-only rows.
    pub target_code: String,
    pub is_label_only: bool,
    pub label: String,
    pub indent: u32,
    pub generic_label: String,
    pub generic_indent: u32,
    pub syntax: String,
    pub code_type: String,
    pub missing_flag: String,
}

/// An inclusive column span in the sample's raw data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub begin: String,
    pub end: String,
}

impl ColumnRange {
    pub fn new(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
        }
    }
}

/// Mapping from one raw input code to an output code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recoding {
    pub input_code: String,
    pub output_code: String,
    pub input_label: String,
    pub frequency: String,
}

/// Per-sample detail of an export record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBlock {
    /// Lowercased sample id.
    pub sample_id: String,
    pub record_type: String,
    pub has_no_recode: bool,
    pub is_hidden: bool,
    pub restricted_flag: Option<String>,
    /// Explicit source variables feeding this sample.
    pub source_variable_ids: Vec<String>,
    /// Project-level sourcing text used when no explicit list exists.
    pub source_fallback: String,
    pub input_variable: String,
    pub anchor_form: String,
    pub source_doc: String,
    pub anchor_instrument: String,
    pub universe_text: String,
    pub column_ranges: Vec<ColumnRange>,
    /// `None` when the sample is not recoded.
    pub recodings: Option<Vec<Recoding>>,
}

impl SampleBlock {
    /// Sourcing text as published: the explicit list or the fallback.
    pub fn sourcing_text(&self) -> String {
        if self.source_variable_ids.is_empty() {
            self.source_fallback.clone()
        } else {
            self.source_variable_ids.join(" ")
        }
    }

    pub fn recodings(&self) -> &[Recoding] {
        self.recodings.as_deref().unwrap_or_default()
    }
}

/// Canonical in-memory form of one variable's translation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub variable_name: String,
    pub variable_label: String,
    pub kind: VariableKind,
    pub universe_entries: Vec<UniverseEntry>,
    pub output_codes: Vec<OutputCode>,
    pub sample_blocks: Vec<SampleBlock>,
}

impl ExportRecord {
    pub fn is_source(&self) -> bool {
        self.kind.is_source()
    }

    /// Looks up the catalog entry for a target code.
    pub fn output_code(&self, target_code: &str) -> Option<&OutputCode> {
        self.output_codes
            .iter()
            .find(|code| !code.is_label_only && code.target_code == target_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_entry_flags_follow_statement() {
        let all = UniverseEntry::new("[all]", "All persons", vec![]);
        assert!(all.no_sample_statement);
        assert!(!all.has_sample_list);

        let list = UniverseEntry::new("[list]", "Persons age 15+", vec!["us2000a".into()]);
        assert!(list.has_sample_list);
        assert!(!list.no_sample_statement);

        let free = UniverseEntry::new("Persons in households", "", vec![]);
        assert!(!free.has_sample_list);
        assert!(!free.no_sample_statement);
    }

    #[test]
    fn sourcing_text_prefers_explicit_list() {
        let mut block = SampleBlock {
            sample_id: "us2000a".into(),
            record_type: "P".into(),
            has_no_recode: false,
            is_hidden: false,
            restricted_flag: None,
            source_variable_ids: vec![],
            source_fallback: "fallback".into(),
            input_variable: String::new(),
            anchor_form: String::new(),
            source_doc: String::new(),
            anchor_instrument: String::new(),
            universe_text: String::new(),
            column_ranges: vec![],
            recodings: None,
        };
        assert_eq!(block.sourcing_text(), "fallback");
        block.source_variable_ids = vec!["US2000A_1000".into(), "US2000A_1001".into()];
        assert_eq!(block.sourcing_text(), "US2000A_1000 US2000A_1001");
        assert!(block.recodings().is_empty());
    }
}
