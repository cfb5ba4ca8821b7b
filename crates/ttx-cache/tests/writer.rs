//! Cache writer tests over real export records.

use std::collections::BTreeMap;

use ttx_cache::{CacheWriter, UnitBatch};
use ttx_model::{
    ColumnRange, Diagnostics, ExportRecord, OutputCode, Recoding, SampleBlock, TtTable,
    UniverseEntry, VariableKind,
};
use ttx_output::{
    integrated_deletes, last_updated_row, sample_deletes, to_relational_rows,
};

const STAMP: &str = "2026-10-19 09:30:00.000000";

fn record(name: &str, kind: VariableKind, sample: &str) -> ExportRecord {
    ExportRecord {
        variable_name: name.to_string(),
        variable_label: format!("{name} label"),
        kind,
        universe_entries: vec![UniverseEntry::new(
            "[list]",
            "All persons",
            vec![sample.to_string()],
        )],
        output_codes: vec![OutputCode {
            id: 1,
            target_code: "1".to_string(),
            is_label_only: false,
            label: "Yes".to_string(),
            indent: 0,
            generic_label: String::new(),
            generic_indent: 0,
            syntax: String::new(),
            code_type: "n".to_string(),
            missing_flag: String::new(),
        }],
        sample_blocks: vec![SampleBlock {
            sample_id: sample.to_string(),
            record_type: "P".to_string(),
            has_no_recode: false,
            is_hidden: false,
            restricted_flag: None,
            source_variable_ids: vec![],
            source_fallback: String::new(),
            input_variable: String::new(),
            anchor_form: String::new(),
            source_doc: String::new(),
            anchor_instrument: String::new(),
            universe_text: "All persons".to_string(),
            column_ranges: vec![ColumnRange::new("10", "10")],
            recodings: Some(vec![Recoding {
                input_code: "1".to_string(),
                output_code: "1".to_string(),
                input_label: "yes".to_string(),
                frequency: "5".to_string(),
            }]),
        }],
    }
}

fn integrated_unit(variables: &[&str]) -> UnitBatch {
    let mut batch = UnitBatch::new("integrated");
    for variable in variables {
        let record = record(variable, VariableKind::Integrated, "us2000a");
        batch.add_deletes(integrated_deletes([*variable]));
        batch.add_rows(to_relational_rows(&record, STAMP, &mut Diagnostics::new()));
        batch.push_row(TtTable::LastUpdated, last_updated_row(variable, STAMP));
    }
    batch
}

fn sample_unit(sample: &str, svars: &[&str]) -> UnitBatch {
    let mut batch = UnitBatch::new(sample);
    batch.add_deletes(sample_deletes(sample, svars.iter().copied()));
    for svar in svars {
        let record = record(svar, VariableKind::Source, sample);
        batch.add_rows(to_relational_rows(&record, STAMP, &mut Diagnostics::new()));
    }
    batch.push_row(TtTable::LastUpdated, last_updated_row(sample, STAMP));
    batch
}

#[test]
fn flushing_twice_replaces_rows() {
    let mut writer = CacheWriter::open_in_memory().unwrap();
    let batch = integrated_unit(&["AGE", "SEX"]);
    writer.flush(&batch).unwrap();
    writer.flush(&batch).unwrap();

    assert_eq!(writer.row_count(TtTable::SampleVariables).unwrap(), 2);
    assert_eq!(writer.row_count(TtTable::Recodings).unwrap(), 2);
    assert_eq!(writer.row_count(TtTable::LastUpdated).unwrap(), 2);
    assert!(writer.invalid_rows().unwrap().is_empty());
}

fn rows_of(writer: &CacheWriter, table: TtTable, name: &str) -> i64 {
    let column = if table.is_variable_scoped() {
        "variable"
    } else {
        "sample_or_variable"
    };
    writer
        .connection()
        .query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1"),
            [name],
            |row| row.get(0),
        )
        .unwrap()
}

fn table_counts(writer: &CacheWriter) -> Vec<usize> {
    TtTable::ALL
        .into_iter()
        .map(|table| writer.row_count(table).unwrap())
        .collect()
}

#[test]
fn failed_unit_rolls_back_without_touching_committed_units() {
    let mut writer = CacheWriter::open_in_memory().unwrap();
    writer.flush(&integrated_unit(&["AGE"])).unwrap();
    let committed = table_counts(&writer);

    // Every SEX row is inserted before the duplicate tt_last_updated key.
    let mut broken = integrated_unit(&["SEX"]);
    broken.push_row(TtTable::LastUpdated, last_updated_row("SEX", STAMP));
    let error = writer.flush(&broken).unwrap_err();
    assert_eq!(error.unit, "integrated");

    for table in TtTable::ALL {
        assert_eq!(rows_of(&writer, table, "SEX"), 0, "{table} kept SEX rows");
    }
    assert_eq!(table_counts(&writer), committed);
    assert_eq!(rows_of(&writer, TtTable::LastUpdated, "AGE"), 1);

    writer.flush(&sample_unit("us2000a", &["US2000A_0010"])).unwrap();
    assert_eq!(writer.row_count(TtTable::SampleVariables).unwrap(), 2);
}

#[test]
fn recodings_round_trip_through_the_cache() {
    let mut record = record("INCOME", VariableKind::Integrated, "us2000a");
    record.sample_blocks[0].recodings = Some(
        [("1", "10"), ("2", "20")]
            .into_iter()
            .map(|(input, output)| Recoding {
                input_code: input.to_string(),
                output_code: output.to_string(),
                input_label: String::new(),
                frequency: String::new(),
            })
            .collect(),
    );
    let mut batch = UnitBatch::new("integrated");
    batch.add_deletes(integrated_deletes(["INCOME"]));
    batch.add_rows(to_relational_rows(&record, STAMP, &mut Diagnostics::new()));
    let mut writer = CacheWriter::open_in_memory().unwrap();
    writer.flush(&batch).unwrap();

    let mut statement = writer
        .connection()
        .prepare(
            "SELECT inputcode, outputcode FROM tt_samplevariables_recodings \
             WHERE variable = 'INCOME' AND sample = 'us2000a'",
        )
        .unwrap();
    let mapping: BTreeMap<String, String> = statement
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        mapping,
        BTreeMap::from([
            ("1".to_string(), "10".to_string()),
            ("2".to_string(), "20".to_string()),
        ])
    );
}

#[test]
fn sample_unit_drops_svars_that_disappeared() {
    let mut writer = CacheWriter::open_in_memory().unwrap();
    writer.flush(&integrated_unit(&["AGE"])).unwrap();
    writer
        .flush(&sample_unit("us2000a", &["US2000A_0010", "US2000A_0011"]))
        .unwrap();
    assert_eq!(writer.row_count(TtTable::SampleVariables).unwrap(), 3);

    writer.flush(&sample_unit("us2000a", &["US2000A_0010"])).unwrap();
    assert_eq!(writer.row_count(TtTable::SampleVariables).unwrap(), 2);
    assert_eq!(writer.row_count(TtTable::VariableLabels).unwrap(), 2);
    assert_eq!(writer.row_count(TtTable::Sources).unwrap(), 1);
    assert!(writer.invalid_rows().unwrap().is_empty());

    let integrated = writer.integrated_variables().unwrap();
    assert_eq!(integrated.into_iter().collect::<Vec<_>>(), ["AGE"]);
}

#[test]
fn removed_variables_leave_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metadata.db");
    {
        let mut writer = CacheWriter::open(&path).unwrap();
        writer.flush(&integrated_unit(&["AGE", "SEX"])).unwrap();
    }
    let mut writer = CacheWriter::open(&path).unwrap();
    let removed = writer.remove_variables(&["SEX".to_string()]).unwrap();
    assert!(removed > 0);
    assert_eq!(writer.row_count(TtTable::SampleVariables).unwrap(), 1);
    assert_eq!(writer.row_count(TtTable::LastUpdated).unwrap(), 1);
}
