//! Project-level CSV lists: known samples and published variables.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use ttx_model::{SampleCatalog, VariableEntry};

use crate::error::{IngestError, Result};

#[derive(Debug, Deserialize)]
struct SampleRow {
    sample: String,
}

#[derive(Debug, Deserialize)]
struct VariableRow {
    variable: String,
    #[serde(default)]
    display_variable: String,
}

/// Reads `samples.csv` (`sample`, `description`).
pub fn load_sample_catalog(path: &Path) -> Result<SampleCatalog> {
    let rows: Vec<SampleRow> = read_rows(path, "sample list", "sample")?;
    let catalog = SampleCatalog::new(rows.iter().map(|row| row.sample.as_str()));
    debug!(path = %path.display(), samples = catalog.len(), "loaded sample list");
    Ok(catalog)
}

/// Reads `variables.csv` (`variable`, `display_variable`).
///
/// Names are uppercased and blank rows skipped, keeping file order.
pub fn load_variable_list(path: &Path) -> Result<Vec<VariableEntry>> {
    let rows: Vec<VariableRow> = read_rows(path, "variable list", "variable")?;
    let entries: Vec<VariableEntry> = rows
        .into_iter()
        .filter(|row| !row.variable.is_empty())
        .map(|row| VariableEntry {
            variable: row.variable.to_uppercase(),
            display_variable: (!row.display_variable.is_empty())
                .then(|| row.display_variable.to_uppercase()),
        })
        .collect();
    debug!(path = %path.display(), variables = entries.len(), "loaded variable list");
    Ok(entries)
}

fn read_rows<T: DeserializeOwned>(
    path: &Path,
    kind: &'static str,
    required: &str,
) -> Result<Vec<T>> {
    if !path.is_file() {
        return Err(IngestError::FileNotFound {
            kind,
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
        });
    }
    let parse_error = |err: csv::Error| IngestError::CsvParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(parse_error)?;
    let headers = reader.headers().map_err(parse_error)?;
    if !headers.iter().any(|header| header == required) {
        return Err(IngestError::MissingColumn {
            column: required.to_string(),
            path: path.to_path_buf(),
        });
    }
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(parse_error)
}
