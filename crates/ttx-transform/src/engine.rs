//! Builds [`ExportRecord`]s from a [`MetadataSource`].

use tracing::debug;

use ttx_model::{
    DataDictionary, Diagnostics, ExportRecord, MetadataSource, ProjectConfig, Recoding, Result,
    SAMPLE_STATEMENT_LIST, SampleBlock, SampleCatalog, SampleColumn, SourceVariable,
    TransformError, TranslationTable, UNKNOWN_UNIVERSE, UniverseEntry, VariableEntry, VariableKind,
};

use crate::codes::{
    SUPPRESS_MARKER, blank_to_zero, integrated_codes, is_valid_value, source_codes,
};
use crate::columns::{parse_column_ranges, source_column_range};
use crate::universe::integrated_universe;

const RESTRICTED: &str = "restricted";

/// Transform engine bound to one project.
///
/// The engine holds no mutable state and may be shared by worker threads.
pub struct TransformEngine<'a> {
    source: &'a dyn MetadataSource,
    config: &'a ProjectConfig,
    catalog: SampleCatalog,
}

impl<'a> TransformEngine<'a> {
    /// Resolves the project's sample set.
    ///
    /// An empty sample set is fatal for the whole run.
    pub fn new(source: &'a dyn MetadataSource, config: &'a ProjectConfig) -> Result<Self> {
        let catalog = source.known_samples()?;
        if catalog.is_empty() {
            return Err(TransformError::EmptySampleCatalog);
        }
        Ok(Self {
            source,
            config,
            catalog,
        })
    }

    pub fn source(&self) -> &'a dyn MetadataSource {
        self.source
    }

    pub fn config(&self) -> &ProjectConfig {
        self.config
    }

    pub fn catalog(&self) -> &SampleCatalog {
        &self.catalog
    }

    /// Builds the record of an integrated variable from its translation table.
    pub fn build_integrated(
        &self,
        variable: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<ExportRecord> {
        let table = self.source.translation_table(variable)?;
        self.integrated_record(&table, diagnostics)
    }

    /// Builds a published variable, reading its display table when it has
    /// one. The record is named after the published variable.
    pub fn build_entry(
        &self,
        entry: &VariableEntry,
        diagnostics: &mut Diagnostics,
    ) -> Result<ExportRecord> {
        let table = self.source.translation_table(entry.table_name())?;
        let mut record = self.integrated_record(&table, diagnostics)?;
        record.variable_name = entry.variable.to_uppercase();
        Ok(record)
    }

    pub fn integrated_record(
        &self,
        table: &TranslationTable,
        diagnostics: &mut Diagnostics,
    ) -> Result<ExportRecord> {
        let variable = table.variable.as_str();
        debug!(variable, samples = table.samples.len(), "building integrated record");
        let universe_entries = integrated_universe(variable, &table.universe, &self.catalog)?;
        let output_codes = integrated_codes(variable, &table.output_values, diagnostics);
        let sample_blocks = table
            .samples
            .iter()
            .map(|column| self.integrated_sample(variable, column, diagnostics))
            .collect();
        Ok(ExportRecord {
            variable_name: table.variable.clone(),
            variable_label: table.label.clone(),
            kind: VariableKind::Integrated,
            universe_entries,
            output_codes,
            sample_blocks,
        })
    }

    fn integrated_sample(
        &self,
        variable: &str,
        column: &SampleColumn,
        diagnostics: &mut Diagnostics,
    ) -> SampleBlock {
        let sample_id = column.sample.to_lowercase();
        let universe_text = match &column.universe {
            Some(universe) => universe.clone(),
            None => {
                diagnostics.warn(variable, format!("no universe found for sample {sample_id}"));
                UNKNOWN_UNIVERSE.to_string()
            }
        };
        let restricted_flag = (self.config.has_restricted_data()
            && column.restricted.trim() == RESTRICTED)
            .then(|| RESTRICTED.to_string());
        let (anchor_form, anchor_instrument) = if self.config.uses_anchor_form() {
            (column.anchor_form.clone(), column.anchor_instrument.clone())
        } else {
            (String::new(), String::new())
        };
        let source_doc = if self.config.uses_svar_doc() {
            column.svar_doc.clone()
        } else {
            String::new()
        };
        let recodings =
            (!column.no_recode).then(|| integrated_recodings(variable, column, diagnostics));
        SampleBlock {
            sample_id,
            record_type: column.record_type.clone(),
            has_no_recode: column.no_recode,
            is_hidden: column.hide,
            restricted_flag,
            source_variable_ids: column.svars.clone(),
            source_fallback: column.sourcing.clone(),
            input_variable: String::new(),
            anchor_form,
            source_doc,
            anchor_instrument,
            universe_text,
            column_ranges: parse_column_ranges(&column.columns),
            recodings,
        }
    }

    /// Builds the record of a source variable, resolving its sample.
    pub fn build_source(&self, svar: &str, diagnostics: &mut Diagnostics) -> Result<ExportRecord> {
        let sample = self.source.svar_sample(svar)?;
        let dictionary = self.source.data_dictionary(&sample)?;
        self.build_source_from(&dictionary, svar, diagnostics)
    }

    /// Builds the record of a source variable from an already loaded dictionary.
    pub fn build_source_from(
        &self,
        dictionary: &DataDictionary,
        svar: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<ExportRecord> {
        let sample = dictionary.sample.to_lowercase();
        let info = dictionary
            .svar(svar)
            .ok_or_else(|| TransformError::MissingSourceVariable {
                svar: svar.to_uppercase(),
                sample: sample.clone(),
            })?;
        let output_codes = source_codes(info, diagnostics)?;
        let universe = UniverseEntry::new(
            SAMPLE_STATEMENT_LIST,
            info.universe.clone(),
            vec![sample.clone()],
        );
        Ok(ExportRecord {
            variable_name: svar.to_uppercase(),
            variable_label: info.label.clone(),
            kind: VariableKind::Source,
            universe_entries: vec![universe],
            output_codes,
            sample_blocks: vec![source_sample(sample, info)],
        })
    }
}

fn integrated_recodings(
    variable: &str,
    column: &SampleColumn,
    diagnostics: &mut Diagnostics,
) -> Vec<Recoding> {
    let mut recodings = Vec::with_capacity(column.recodes.len());
    for row in column
        .recodes
        .iter()
        .filter(|row| is_valid_value(&row.input_code))
    {
        let Some(output_code) = &row.output_code else {
            diagnostics.error(
                variable,
                format!(
                    "input code with no output code Sample: {} Input Code: {}",
                    column.sample, row.input_code
                ),
            );
            continue;
        };
        recodings.push(Recoding {
            input_code: row.input_code.clone(),
            output_code: output_code.clone(),
            input_label: row.input_label.clone(),
            frequency: row.frequency.clone(),
        });
    }
    recodings
}

fn source_sample(sample_id: String, info: &SourceVariable) -> SampleBlock {
    let has_no_recode = blank_to_zero(info.no_recode.trim()) == "1";
    let recodings = (!has_no_recode).then(|| {
        info.values
            .iter()
            .filter(|row| {
                is_valid_value(&row.value) && !row.output_code.starts_with(SUPPRESS_MARKER)
            })
            .map(|row| Recoding {
                input_code: row.value.clone(),
                output_code: row.output_code.clone(),
                input_label: row.input_label.clone(),
                frequency: row.frequency.clone(),
            })
            .collect()
    });
    SampleBlock {
        sample_id,
        record_type: blank_to_zero(&info.record_type).to_string(),
        has_no_recode,
        is_hidden: info.hide,
        restricted_flag: info.restricted.clone(),
        source_variable_ids: Vec::new(),
        source_fallback: String::new(),
        input_variable: String::new(),
        anchor_form: String::new(),
        source_doc: String::new(),
        anchor_instrument: String::new(),
        universe_text: info.universe.clone(),
        column_ranges: vec![source_column_range(info.start, info.width)],
        recodings,
    }
}
