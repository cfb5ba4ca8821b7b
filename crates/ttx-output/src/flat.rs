//! User-facing recoding tables as CSV.

use anyhow::{Result, anyhow};
use serde::Serialize;

use ttx_model::ExportRecord;

#[derive(Debug, Serialize)]
struct FlatRow<'a> {
    variable: &'a str,
    sample: &'a str,
    input_code: &'a str,
    output_code: &'a str,
    output_label: &'a str,
    input_label: &'a str,
}

const HEADER: [&str; 6] = [
    "variable",
    "sample",
    "input_code",
    "output_code",
    "output_label",
    "input_label",
];

/// One row per recoding, with the output label looked up in the record's
/// code catalog. Hidden samples and frequencies are not published.
pub fn to_flat_csv(record: &ExportRecord) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut rows = 0;
    for block in record.sample_blocks.iter().filter(|block| !block.is_hidden) {
        for recoding in block.recodings() {
            let output_label = record
                .output_code(&recoding.output_code)
                .map(|code| code.label.as_str())
                .unwrap_or_default();
            writer.serialize(FlatRow {
                variable: &record.variable_name,
                sample: &block.sample_id,
                input_code: &recoding.input_code,
                output_code: &recoding.output_code,
                output_label,
                input_label: &recoding.input_label,
            })?;
            rows += 1;
        }
    }
    if rows == 0 {
        writer.write_record(HEADER)?;
    }
    writer
        .into_inner()
        .map_err(|error| anyhow!("flush user translation table: {}", error.error()))
}
