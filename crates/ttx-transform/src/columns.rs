use ttx_model::ColumnRange;

/// Parses `begin=end` ranges separated by `;`. A bare number is a
/// one-column range.
pub fn parse_column_ranges(text: &str) -> Vec<ColumnRange> {
    text.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut locations = part.split('=').map(str::trim);
            let begin = locations.next().unwrap_or_default();
            let end = locations.next().unwrap_or(begin);
            ColumnRange::new(begin, end)
        })
        .collect()
}

/// The single range `[start, start + width - 1]` of a source variable.
pub fn source_column_range(start: u32, width: u32) -> ColumnRange {
    let end = i64::from(start) + i64::from(width) - 1;
    ColumnRange::new(start.to_string(), end.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_and_single_columns() {
        let ranges = parse_column_ranges("10=12; 15 ;20 = 21");
        assert_eq!(
            ranges,
            [
                ColumnRange::new("10", "12"),
                ColumnRange::new("15", "15"),
                ColumnRange::new("20", "21"),
            ]
        );
    }

    #[test]
    fn empty_text_has_no_ranges() {
        assert!(parse_column_ranges("").is_empty());
        assert!(parse_column_ranges(" ; ").is_empty());
    }

    #[test]
    fn source_range_is_inclusive() {
        assert_eq!(source_column_range(101, 3), ColumnRange::new("101", "103"));
        assert_eq!(source_column_range(7, 1), ColumnRange::new("7", "7"));
    }
}
