//! Output code catalogs and the cell conventions they rely on.

use std::collections::BTreeSet;

use ttx_model::{Diagnostics, OutputCode, OutputValueRow, Result, SourceVariable, TransformError};

/// Codes starting with this marker carry a label but no target code.
pub const LABEL_ONLY_MARKER: char = '#';
/// Codes starting with this marker are left out of every output.
pub const SUPPRESS_MARKER: char = '~';

/// Splits leading whitespace off a label.
///
/// The indent level is the whitespace length divided by three, rounded
/// half to even.
pub fn calculate_indent(raw: &str) -> (u32, String) {
    let label = raw.trim_start();
    let padding = raw.chars().count() - label.chars().count();
    (round_half_even_thirds(padding), label.to_string())
}

fn round_half_even_thirds(padding: usize) -> u32 {
    let quotient = padding / 3;
    let remainder = padding % 3;
    // n/3 never lands on .5, so the remainder alone decides.
    let rounded = if remainder == 2 { quotient + 1 } else { quotient };
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Empty cells read as `"0"`.
pub fn blank_to_zero(value: &str) -> &str {
    if value.is_empty() { "0" } else { value }
}

/// `""`, `"*"` and `"nan"` all mean "no value".
pub fn is_valid_value(value: &str) -> bool {
    !matches!(value, "" | "*" | "nan")
}

/// Catalog of an integrated variable, in source row order.
pub(crate) fn integrated_codes(
    variable: &str,
    rows: &[OutputValueRow],
    diagnostics: &mut Diagnostics,
) -> Vec<OutputCode> {
    let mut seen = BTreeSet::new();
    let mut codes = Vec::with_capacity(rows.len());
    for row in rows {
        let code = row.code.as_str();
        if code.starts_with(SUPPRESS_MARKER) {
            continue;
        }
        if !seen.insert(code) {
            diagnostics.warn(variable, format!("duplicate output code {code} dropped"));
            continue;
        }
        let is_label_only = row.label_only || code.starts_with(LABEL_ONLY_MARKER);
        let target_code = if code.starts_with(LABEL_ONLY_MARKER) {
            String::new()
        } else {
            code.to_string()
        };
        let (indent, label) = calculate_indent(&row.label);
        let (generic_indent, generic_label) = calculate_indent(&row.generic_label);
        codes.push(OutputCode {
            id: next_id(&codes),
            target_code,
            is_label_only,
            label,
            indent,
            generic_label,
            generic_indent,
            syntax: row.syntax.trim().to_string(),
            code_type: row.code_type.trim().to_string(),
            missing_flag: row.missing.trim().to_string(),
        });
    }
    codes
}

/// Catalog of a source variable.
///
/// Fails when a tabulated variable has a value row without an output code.
pub(crate) fn source_codes(
    svar: &SourceVariable,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<OutputCode>> {
    let name = svar.name.to_uppercase();
    let mut seen = BTreeSet::new();
    let mut codes = Vec::with_capacity(svar.values.len());
    for row in &svar.values {
        if !svar.non_tabulated && row.output_code.is_empty() {
            return Err(TransformError::BlankOutputCode { svar: name });
        }
        let code = row.output_code.as_str();
        if code.starts_with(SUPPRESS_MARKER) {
            continue;
        }
        let is_label_only = code.starts_with(LABEL_ONLY_MARKER);
        if !is_label_only && !seen.insert(code) {
            diagnostics.warn(&name, format!("duplicate output code {code} dropped"));
            continue;
        }
        let (indent, label) = calculate_indent(&row.output_label);
        codes.push(OutputCode {
            id: next_id(&codes),
            target_code: if is_label_only {
                String::new()
            } else {
                code.to_string()
            },
            is_label_only,
            label,
            indent,
            generic_label: String::new(),
            generic_indent: 0,
            syntax: String::new(),
            code_type: row.code_type.trim().to_string(),
            missing_flag: String::new(),
        });
    }
    Ok(codes)
}

fn next_id(codes: &[OutputCode]) -> u32 {
    u32::try_from(codes.len() + 1).unwrap_or(u32::MAX)
}
