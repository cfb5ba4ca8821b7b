//! Translation-table serializers.
//!
//! Every export record is written through the same field layout:
//!
//! - **Markup**: the legacy tab-indented XML consumed by downstream sites
//! - **Structured**: the same fields as ASCII-only JSON
//! - **Relational**: rows and scoped deletes for the translation-table cache
//! - **Flat**: a user-facing recoding table in CSV

mod fields;
mod flat;
mod markup;
mod paths;
mod relational;
mod structured;

pub use flat::to_flat_csv;
pub use markup::to_markup;
pub use paths::{
    ExportLayout, OutputFormat, WriteOutcome, remove_all_files, remove_stale_files,
    write_if_changed,
};
pub use relational::{
    COLUMNS_SOURCE, integrated_deletes, last_updated_row, sample_deletes, to_relational_rows,
};
pub use structured::to_structured;

use anyhow::Result;
use ttx_model::ExportRecord;

/// Serializes `record` in the given file format.
pub fn serialize(record: &ExportRecord, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Markup => to_markup(record),
        OutputFormat::Structured => to_structured(record),
    }
}
