//! Relational rows for the translation-table cache.
//!
//! One export record yields rows for the six per-variable tables. Rows
//! whose key was already produced for the same record are dropped with a
//! warning; the markup keeps them.

use std::collections::BTreeSet;

use ttx_model::{
    DeleteScope, DeleteStatement, Diagnostics, ExportRecord, Row, RowValue, TableRows, TtTable,
};

/// Pseudo-source of a source variable's own column location.
pub const COLUMNS_SOURCE: &str = "columns";

/// Builds the six per-variable tables' rows for one record.
pub fn to_relational_rows(
    record: &ExportRecord,
    stamp: &str,
    diagnostics: &mut Diagnostics,
) -> TableRows {
    let mut builder = RowBuilder {
        record,
        stamp,
        diagnostics,
        seen: BTreeSet::new(),
        rows: TableRows::new(),
    };
    builder.sample_variables();
    builder.sources();
    builder.recodings();
    builder.labels();
    builder.universes();
    builder.rows
}

/// The `tt_last_updated` row of one export unit.
pub fn last_updated_row(unit_id: &str, stamp: &str) -> Row {
    Row::new()
        .with("sample_or_variable", unit_id)
        .with("date_created", stamp)
}

/// Deletes issued before an integrated unit's inserts.
pub fn integrated_deletes<'a>(
    variables: impl IntoIterator<Item = &'a str>,
) -> Vec<DeleteStatement> {
    let mut deletes = Vec::new();
    for variable in variables {
        for table in TtTable::ALL {
            let scope = if table.is_variable_scoped() {
                DeleteScope::Variable(variable.to_string())
            } else {
                DeleteScope::Unit(variable.to_string())
            };
            deletes.push(DeleteStatement::new(table, scope));
        }
    }
    deletes
}

/// Deletes issued before a sample unit's inserts.
///
/// The current svars are removed by name, then every svar row still
/// attached to the sample, so renamed or dropped svars do not linger.
/// `tt_samplevariables` goes last because the sample-scoped deletes look
/// up svar names through it.
pub fn sample_deletes<'a>(
    sample: &str,
    svars: impl IntoIterator<Item = &'a str>,
) -> Vec<DeleteStatement> {
    let mut deletes = Vec::new();
    for svar in svars {
        for table in TtTable::ALL {
            if table.is_variable_scoped() {
                deletes.push(DeleteStatement::new(
                    table,
                    DeleteScope::Variable(svar.to_uppercase()),
                ));
            }
        }
    }
    for table in [
        TtTable::Recodings,
        TtTable::UniverseDisplayIdSamples,
        TtTable::VariableLabels,
        TtTable::UniverseDisplayIds,
        TtTable::Sources,
        TtTable::SampleVariables,
    ] {
        deletes.push(DeleteStatement::new(
            table,
            DeleteScope::SampleSvars(sample.to_lowercase()),
        ));
    }
    deletes.push(DeleteStatement::new(
        TtTable::LastUpdated,
        DeleteScope::Unit(sample.to_lowercase()),
    ));
    deletes
}

struct RowBuilder<'a> {
    record: &'a ExportRecord,
    stamp: &'a str,
    diagnostics: &'a mut Diagnostics,
    seen: BTreeSet<(&'static str, Vec<String>)>,
    rows: TableRows,
}

impl RowBuilder<'_> {
    fn variable(&self) -> &str {
        &self.record.variable_name
    }

    fn is_svar(&self) -> bool {
        self.record.is_source()
    }

    fn unique(&mut self, label: &'static str, key: Vec<String>) -> bool {
        let message = format!(
            "duplicate metadata found updating {label}: {}",
            key.join(", ")
        );
        if self.seen.insert((label, key)) {
            true
        } else {
            self.diagnostics.warn(&self.record.variable_name, message);
            false
        }
    }

    fn row(&self) -> Row {
        Row::new()
            .with("variable", self.variable())
            .with("date_created", self.stamp)
    }

    fn sample_variables(&mut self) {
        let record = self.record;
        for block in &record.sample_blocks {
            let key = vec![self.variable().to_string(), block.sample_id.clone()];
            if !self.unique("variable samples", key) {
                continue;
            }
            let row = self
                .row()
                .with("sample", &block.sample_id)
                .with("is_svar", self.is_svar())
                .with("hide", block.is_hidden)
                .with("svar_doc", &block.source_doc)
                .with("rectype", &block.record_type)
                .with("norecode", block.has_no_recode)
                .with("anchor_inst", &block.anchor_instrument)
                .with("univ", &block.universe_text)
                .with("anchor_form", &block.anchor_form)
                .with(
                    "restricted",
                    block.restricted_flag.as_deref().unwrap_or_default(),
                );
            self.rows.push(TtTable::SampleVariables, row);
        }
    }

    fn sources(&mut self) {
        let record = self.record;
        for block in &record.sample_blocks {
            let sources: Vec<&str> = if self.is_svar() {
                vec![COLUMNS_SOURCE]
            } else {
                block
                    .source_variable_ids
                    .iter()
                    .map(String::as_str)
                    .collect()
            };
            let bounds = self
                .is_svar()
                .then(|| block.column_ranges.first())
                .flatten();
            for (position, source) in sources.into_iter().enumerate() {
                let key = vec![
                    self.variable().to_string(),
                    block.sample_id.clone(),
                    source.to_string(),
                ];
                if !self.unique("sample sources", key) {
                    continue;
                }
                let (start, end) = match bounds {
                    Some(range) => (
                        RowValue::numeric(&range.begin),
                        RowValue::numeric(&range.end),
                    ),
                    None => (RowValue::Null, RowValue::Null),
                };
                let row = self
                    .row()
                    .with("sample", &block.sample_id)
                    .with("source", source)
                    .with("is_svar", self.is_svar())
                    .with("source_order", (position + 1) as i64)
                    .with("col_start", start)
                    .with("col_end", end);
                self.rows.push(TtTable::Sources, row);
            }
        }
    }

    fn recodings(&mut self) {
        let record = self.record;
        for block in &record.sample_blocks {
            for recoding in block.recodings() {
                let key = vec![
                    block.sample_id.clone(),
                    self.variable().to_string(),
                    recoding.input_code.clone(),
                ];
                if !self.unique("recodings", key) {
                    continue;
                }
                let row = self
                    .row()
                    .with("sample", &block.sample_id)
                    .with("outputcode", &recoding.output_code)
                    .with("inputcode", &recoding.input_code);
                self.rows.push(TtTable::Recodings, row);
            }
        }
    }

    fn labels(&mut self) {
        let record = self.record;
        for code in &record.output_codes {
            let key = vec![self.variable().to_string(), code.id.to_string()];
            if !self.unique("output labels", key) {
                continue;
            }
            let row = self
                .row()
                .with("labelid", code.id)
                .with("labelonly", code.is_label_only)
                .with("label", &code.label)
                .with("indent", code.indent)
                .with("genlab", &code.generic_label)
                .with("indentgen", code.generic_indent)
                .with("syntax", &code.syntax)
                .with("codetype", &code.code_type)
                .with("missing", RowValue::numeric(&code.missing_flag))
                .with("outputcode", &code.target_code);
            self.rows.push(TtTable::VariableLabels, row);
        }
    }

    fn universes(&mut self) {
        let record = self.record;
        for (index, entry) in record.universe_entries.iter().enumerate() {
            let display_id = (index + 1) as i64;
            let row = self
                .row()
                .with("universedisplayid", display_id)
                .with("nosampstatement", entry.no_sample_statement)
                .with(
                    "makesampstatement",
                    if entry.has_sample_list { "1" } else { "0" },
                )
                .with("sampstatement", &entry.sample_statement)
                .with("univstatement", &entry.universe_statement);
            self.rows.push(TtTable::UniverseDisplayIds, row);

            for sample in &entry.samples {
                let key = vec![
                    self.variable().to_string(),
                    sample.clone(),
                    display_id.to_string(),
                ];
                if !self.unique("universe samples", key) {
                    continue;
                }
                let row = self
                    .row()
                    .with("sample", sample)
                    .with("universedisplayid", display_id);
                self.rows.push(TtTable::UniverseDisplayIdSamples, row);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttx_model::{ColumnRange, OutputCode, Recoding, SampleBlock, UniverseEntry, VariableKind};

    const STAMP: &str = "2026-01-01 00:00:00.000000";

    fn block(sample: &str) -> SampleBlock {
        SampleBlock {
            sample_id: sample.into(),
            record_type: "P".into(),
            has_no_recode: false,
            is_hidden: false,
            restricted_flag: None,
            source_variable_ids: vec!["US2000A_1010".into(), "US2000A_1011".into()],
            source_fallback: String::new(),
            input_variable: String::new(),
            anchor_form: String::new(),
            source_doc: String::new(),
            anchor_instrument: String::new(),
            universe_text: "All persons".into(),
            column_ranges: vec![ColumnRange::new("101", "102")],
            recodings: Some(vec![
                Recoding {
                    input_code: "1".into(),
                    output_code: "1".into(),
                    input_label: "one".into(),
                    frequency: String::new(),
                },
                Recoding {
                    input_code: "1".into(),
                    output_code: "2".into(),
                    input_label: "again".into(),
                    frequency: String::new(),
                },
            ]),
        }
    }

    fn code(id: u32, target: &str) -> OutputCode {
        OutputCode {
            id,
            target_code: target.into(),
            is_label_only: target.is_empty(),
            label: format!("label {id}"),
            indent: 0,
            generic_label: String::new(),
            generic_indent: 0,
            syntax: String::new(),
            code_type: "n".into(),
            missing_flag: String::new(),
        }
    }

    fn record(kind: VariableKind) -> ExportRecord {
        ExportRecord {
            variable_name: "MARST".into(),
            variable_label: "Marital status".into(),
            kind,
            universe_entries: vec![UniverseEntry::new(
                "[list]",
                "Persons",
                vec!["us2000a".into(), "us2000a".into()],
            )],
            output_codes: vec![code(1, ""), code(2, "1")],
            sample_blocks: vec![block("us2000a")],
        }
    }

    #[test]
    fn integrated_rows_dedupe_with_warnings() {
        let mut diagnostics = Diagnostics::new();
        let rows = to_relational_rows(&record(VariableKind::Integrated), STAMP, &mut diagnostics);

        assert_eq!(rows.rows(TtTable::SampleVariables).len(), 1);
        assert_eq!(rows.rows(TtTable::Recodings).len(), 1);
        assert_eq!(rows.rows(TtTable::UniverseDisplayIdSamples).len(), 1);
        assert_eq!(rows.rows(TtTable::VariableLabels).len(), 2);
        assert!(rows.rows(TtTable::LastUpdated).is_empty());

        let messages: Vec<_> = diagnostics
            .entries()
            .iter()
            .map(|entry| entry.message.as_str())
            .collect();
        assert_eq!(
            messages,
            [
                "duplicate metadata found updating recodings: us2000a, MARST, 1",
                "duplicate metadata found updating universe samples: MARST, us2000a, 1",
            ]
        );
    }

    #[test]
    fn integrated_sources_list_svars_without_bounds() {
        let rows = to_relational_rows(
            &record(VariableKind::Integrated),
            STAMP,
            &mut Diagnostics::new(),
        );
        let sources = rows.rows(TtTable::Sources);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].text("source"), Some("US2000A_1011"));
        assert_eq!(sources[1].get("source_order"), Some(&RowValue::Integer(2)));
        assert_eq!(sources[0].get("col_start"), Some(&RowValue::Null));
        assert_eq!(sources[0].get("is_svar"), Some(&RowValue::Integer(0)));
    }

    #[test]
    fn source_record_uses_columns_pseudo_source() {
        let rows = to_relational_rows(
            &record(VariableKind::Source),
            STAMP,
            &mut Diagnostics::new(),
        );
        let sources = rows.rows(TtTable::Sources);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].text("source"), Some(COLUMNS_SOURCE));
        assert_eq!(sources[0].get("col_start"), Some(&RowValue::Integer(101)));
        assert_eq!(sources[0].get("col_end"), Some(&RowValue::Integer(102)));
        assert_eq!(
            rows.rows(TtTable::SampleVariables)[0].get("is_svar"),
            Some(&RowValue::Integer(1))
        );
    }

    #[test]
    fn label_rows_coerce_blank_missing_to_zero() {
        let rows = to_relational_rows(
            &record(VariableKind::Integrated),
            STAMP,
            &mut Diagnostics::new(),
        );
        let labels = rows.rows(TtTable::VariableLabels);
        assert_eq!(labels[0].get("missing"), Some(&RowValue::Integer(0)));
        assert_eq!(labels[0].get("labelonly"), Some(&RowValue::Integer(1)));
        assert_eq!(labels[0].text("outputcode"), Some(""));
        assert_eq!(labels[1].get("labelid"), Some(&RowValue::Integer(2)));
    }

    #[test]
    fn sample_deletes_clear_samplevariables_last() {
        let deletes = sample_deletes("US2000A", ["us2000a_1010"]);
        assert_eq!(
            deletes[0],
            DeleteStatement::new(
                TtTable::SampleVariables,
                DeleteScope::Variable("US2000A_1010".into())
            )
        );
        let tail: Vec<_> = deletes[deletes.len() - 2..].to_vec();
        assert_eq!(
            tail,
            [
                DeleteStatement::new(
                    TtTable::SampleVariables,
                    DeleteScope::SampleSvars("us2000a".into())
                ),
                DeleteStatement::new(TtTable::LastUpdated, DeleteScope::Unit("us2000a".into())),
            ]
        );
        assert_eq!(deletes.len(), 6 + 6 + 1);
    }

    #[test]
    fn integrated_deletes_cover_every_table() {
        let deletes = integrated_deletes(["AGE"]);
        assert_eq!(deletes.len(), TtTable::ALL.len());
        assert!(deletes.contains(&DeleteStatement::new(
            TtTable::LastUpdated,
            DeleteScope::Unit("AGE".into())
        )));
    }
}
