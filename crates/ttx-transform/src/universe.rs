//! Universe statements and the sample-range grammar.

use std::sync::LazyLock;

use regex::Regex;

use ttx_model::{Result, SampleCatalog, TransformError, UniverseEntry, UniverseRow};

/// Four-digit year inside a sample id.
static YEAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}").expect("Invalid year regex"));

/// Expands a whitespace-separated sample list.
///
/// Tokens of the form `BEGIN=END` expand to one sample per year between
/// the years embedded in `BEGIN` and `END`, inclusive. The result is
/// uppercase.
///
/// ```
/// use ttx_transform::explode_universe_string;
///
/// let samples = explode_universe_string("us2010a=us2012a us2015a").unwrap();
/// assert_eq!(samples, ["US2010A", "US2011A", "US2012A", "US2015A"]);
/// ```
pub fn explode_universe_string(text: &str) -> Result<Vec<String>> {
    let upper = text.to_uppercase();
    let mut samples = Vec::new();
    for token in upper.split_whitespace() {
        if token.contains('=') {
            expand_range(token, &mut samples)?;
        } else {
            samples.push(token.to_string());
        }
    }
    Ok(samples)
}

fn expand_range(token: &str, samples: &mut Vec<String>) -> Result<()> {
    let (begin, end) = token
        .split_once('=')
        .filter(|(_, end)| !end.contains('='))
        .ok_or_else(|| TransformError::SampleRangeYear {
            token: token.to_string(),
        })?;
    let begin_year = embedded_year(begin, token)?;
    let end_year = embedded_year(end, token)?;
    if begin_year > end_year {
        return Err(TransformError::SampleRangeDirection {
            token: token.to_string(),
        });
    }
    if begin_year < 1000 || end_year < 1000 {
        return Err(TransformError::SampleRangeYear {
            token: token.to_string(),
        });
    }
    for year in begin_year..=end_year {
        samples.push(YEAR_REGEX.replace_all(begin, year.to_string()).into_owned());
    }
    Ok(())
}

fn embedded_year(side: &str, token: &str) -> Result<u64> {
    let digits: String = side.chars().filter(char::is_ascii_digit).collect();
    digits
        .parse::<u64>()
        .map_err(|_| TransformError::SampleRangeYear {
            token: token.to_string(),
        })
}

/// Builds the universe entries of an integrated variable.
///
/// Rows without a sample list are skipped. Every sample must be known to
/// the project.
pub(crate) fn integrated_universe(
    variable: &str,
    rows: &[UniverseRow],
    catalog: &SampleCatalog,
) -> Result<Vec<UniverseEntry>> {
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(sample_text) = row.samples.as_deref() else {
            continue;
        };
        let mut samples = Vec::new();
        for sample in explode_universe_string(sample_text)? {
            let sample = sample.to_lowercase();
            if !catalog.contains(&sample) {
                return Err(TransformError::UnknownSample {
                    variable: variable.to_string(),
                    sample,
                });
            }
            samples.push(sample);
        }
        entries.push(UniverseEntry::new(
            row.sample_statement.clone(),
            row.universe_statement.clone(),
            samples,
        ));
    }
    Ok(entries)
}
