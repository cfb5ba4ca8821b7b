//! Normalized source model consumed by the transform engine.
//!
//! Adapters turn authored artifacts into [`TranslationTable`] and
//! [`DataDictionary`] values and expose them through [`MetadataSource`].

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::samples::SampleCatalog;

/// One row of a translation table's universe block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseRow {
    /// Sample list in universe grammar; rows without one are ignored.
    #[serde(default)]
    pub samples: Option<String>,
    #[serde(default)]
    pub sample_statement: String,
    #[serde(default)]
    pub universe_statement: String,
}

/// One row of a translation table's output code block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputValueRow {
    pub code: String,
    #[serde(default)]
    pub label_only: bool,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub generic_label: String,
    #[serde(default)]
    pub syntax: String,
    #[serde(default)]
    pub code_type: String,
    #[serde(default)]
    pub missing: String,
}

/// A sample's input code and the output code it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCodeRow {
    pub input_code: String,
    /// `None` when the authored table leaves the output cell empty.
    #[serde(default)]
    pub output_code: Option<String>,
    #[serde(default)]
    pub input_label: String,
    #[serde(default)]
    pub frequency: String,
}

/// One sample column of a translation table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleColumn {
    pub sample: String,
    pub record_type: String,
    pub no_recode: bool,
    pub hide: bool,
    /// Explicit source variables for this sample.
    pub svars: Vec<String>,
    /// Project-level sourcing text.
    pub sourcing: String,
    pub svar_doc: String,
    pub anchor_form: String,
    pub anchor_instrument: String,
    pub restricted: String,
    /// Universe text; `None` when it cannot be resolved.
    pub universe: Option<String>,
    /// Column locations, `begin=end` ranges separated by `;`.
    pub columns: String,
    pub recodes: Vec<InputCodeRow>,
}

/// Normalized translation table of one integrated variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationTable {
    #[serde(default)]
    pub variable: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub universe: Vec<UniverseRow>,
    #[serde(default)]
    pub output_values: Vec<OutputValueRow>,
    #[serde(default)]
    pub samples: Vec<SampleColumn>,
}

impl TranslationTable {
    pub fn sample(&self, sample: &str) -> Option<&SampleColumn> {
        self.samples
            .iter()
            .find(|column| column.sample.eq_ignore_ascii_case(sample))
    }
}

/// One value row of a source variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueRow {
    /// Raw value as it appears in the data.
    pub value: String,
    /// Output code assigned to the value.
    pub output_code: String,
    /// Output label, possibly indented.
    pub output_label: String,
    /// Label of the raw value.
    pub input_label: String,
    pub code_type: String,
    pub frequency: String,
}

/// One source variable of a data dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceVariable {
    pub name: String,
    pub label: String,
    pub universe: String,
    pub non_tabulated: bool,
    /// Raw no-recode cell.
    pub no_recode: String,
    pub record_type: String,
    pub hide: bool,
    /// Present only when the dictionary tracks restricted data.
    pub restricted: Option<String>,
    pub start: u32,
    pub width: u32,
    pub values: Vec<ValueRow>,
}

impl SourceVariable {
    /// True when the variable carries recodings.
    pub fn is_recoded(&self) -> bool {
        self.no_recode.trim() != "1"
    }
}

/// Normalized data dictionary of one sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDictionary {
    #[serde(default)]
    pub sample: String,
    #[serde(default)]
    pub svars: Vec<SourceVariable>,
}

impl DataDictionary {
    /// Case-insensitive lookup.
    pub fn svar(&self, name: &str) -> Option<&SourceVariable> {
        self.svars
            .iter()
            .find(|svar| svar.name.eq_ignore_ascii_case(name))
    }

    pub fn svar_names(&self) -> impl Iterator<Item = &str> {
        self.svars.iter().map(|svar| svar.name.as_str())
    }

    /// True when at least one variable maps values to output codes.
    pub fn has_recodes(&self) -> bool {
        self.svars
            .iter()
            .any(|svar| svar.is_recoded() && !svar.values.is_empty())
    }
}

/// A published variable and the translation table it is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableEntry {
    pub variable: String,
    /// Name of the translation table when it differs from `variable`.
    #[serde(default)]
    pub display_variable: Option<String>,
}

impl VariableEntry {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            display_variable: None,
        }
    }

    /// Name of the translation table to read.
    pub fn table_name(&self) -> &str {
        self.display_variable
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.variable)
    }
}

/// Access to a project's authored metadata.
///
/// Implementations must be shareable across worker threads.
pub trait MetadataSource: Sync {
    /// Samples the project knows about.
    fn known_samples(&self) -> Result<SampleCatalog, SourceError>;

    /// Published integrated variables.
    fn variables(&self) -> Result<Vec<VariableEntry>, SourceError>;

    /// Samples with a data dictionary.
    fn samples(&self) -> Result<Vec<String>, SourceError>;

    fn translation_table(&self, variable: &str) -> Result<TranslationTable, SourceError>;

    fn data_dictionary(&self, sample: &str) -> Result<DataDictionary, SourceError>;

    /// Sample whose dictionary defines `svar`.
    fn svar_sample(&self, svar: &str) -> Result<String, SourceError>;

    fn translation_table_modified(&self, variable: &str) -> Result<SystemTime, SourceError>;

    fn data_dictionary_modified(&self, sample: &str) -> Result<SystemTime, SourceError>;
}

/// Metadata held in memory, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub catalog: SampleCatalog,
    pub variables: Vec<VariableEntry>,
    pub tables: BTreeMap<String, TranslationTable>,
    pub dictionaries: BTreeMap<String, DataDictionary>,
    pub modified: BTreeMap<String, SystemTime>,
}

impl InMemorySource {
    pub fn new(catalog: SampleCatalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: TranslationTable) -> Self {
        let key = table.variable.to_uppercase();
        if !self.variables.iter().any(|entry| entry.variable == key) {
            self.variables.push(VariableEntry::new(key.clone()));
        }
        self.tables.insert(key, table);
        self
    }

    #[must_use]
    pub fn with_dictionary(mut self, dictionary: DataDictionary) -> Self {
        self.dictionaries
            .insert(dictionary.sample.to_lowercase(), dictionary);
        self
    }

    /// Records a modification time for a variable or sample.
    pub fn touch(&mut self, name: &str, when: SystemTime) {
        self.modified.insert(name.to_lowercase(), when);
    }

    fn modified_at(&self, name: &str) -> SystemTime {
        self.modified
            .get(&name.to_lowercase())
            .copied()
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }
}

impl MetadataSource for InMemorySource {
    fn known_samples(&self) -> Result<SampleCatalog, SourceError> {
        Ok(self.catalog.clone())
    }

    fn variables(&self) -> Result<Vec<VariableEntry>, SourceError> {
        Ok(self.variables.clone())
    }

    fn samples(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.dictionaries.keys().cloned().collect())
    }

    fn translation_table(&self, variable: &str) -> Result<TranslationTable, SourceError> {
        self.tables
            .get(&variable.to_uppercase())
            .cloned()
            .ok_or_else(|| SourceError::not_found("translation table", variable))
    }

    fn data_dictionary(&self, sample: &str) -> Result<DataDictionary, SourceError> {
        self.dictionaries
            .get(&sample.to_lowercase())
            .cloned()
            .ok_or_else(|| SourceError::not_found("data dictionary", sample))
    }

    fn svar_sample(&self, svar: &str) -> Result<String, SourceError> {
        self.dictionaries
            .iter()
            .find(|(_, dictionary)| dictionary.svar(svar).is_some())
            .map(|(sample, _)| sample.clone())
            .ok_or_else(|| SourceError::not_found("sample for svar", svar))
    }

    fn translation_table_modified(&self, variable: &str) -> Result<SystemTime, SourceError> {
        Ok(self.modified_at(variable))
    }

    fn data_dictionary_modified(&self, sample: &str) -> Result<SystemTime, SourceError> {
        Ok(self.modified_at(sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_table_deserializes_with_defaults() {
        let json = r#"{
            "variable": "AGE",
            "label": "Age",
            "universe": [{"samples": "us2000a", "sample_statement": "[all]"}],
            "output_values": [{"code": "001", "label": "1 year"}],
            "samples": [{"sample": "us2000a", "columns": "10=12"}]
        }"#;
        let table: TranslationTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.universe[0].universe_statement, "");
        assert!(!table.output_values[0].label_only);
        let column = table.sample("US2000A").unwrap();
        assert_eq!(column.columns, "10=12");
        assert!(column.universe.is_none());
        assert!(column.recodes.is_empty());
    }

    #[test]
    fn dictionary_recode_detection() {
        let mut dictionary = DataDictionary {
            sample: "us2000a".into(),
            svars: vec![SourceVariable {
                name: "US2000A_1000".into(),
                no_recode: "1".into(),
                values: vec![ValueRow::default()],
                ..SourceVariable::default()
            }],
        };
        assert!(!dictionary.has_recodes());
        dictionary.svars[0].no_recode = String::new();
        assert!(dictionary.has_recodes());
        assert!(dictionary.svar("us2000a_1000").is_some());
    }

    #[test]
    fn in_memory_source_resolves_svar_sample() {
        let source = InMemorySource::new(SampleCatalog::new(["us2000a"])).with_dictionary(
            DataDictionary {
                sample: "US2000A".into(),
                svars: vec![SourceVariable {
                    name: "US2000A_1000".into(),
                    ..SourceVariable::default()
                }],
            },
        );
        assert_eq!(source.svar_sample("us2000a_1000").unwrap(), "us2000a");
        assert!(matches!(
            source.translation_table("AGE"),
            Err(SourceError::NotFound { .. })
        ));
    }

    #[test]
    fn display_variable_selects_table() {
        let mut entry = VariableEntry::new("AGE");
        assert_eq!(entry.table_name(), "AGE");
        entry.display_variable = Some("AGE_ORIG".into());
        assert_eq!(entry.table_name(), "AGE_ORIG");
    }
}
