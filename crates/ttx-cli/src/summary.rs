use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use ttx_cli::types::{CheckResult, ExportResult, PhaseSummary};
use ttx_model::{Diagnostic, DiagnosticLevel};

pub fn print_summary(result: &ExportResult) {
    println!("Project: {}", result.project);
    println!("Output: {}", result.output_root.display());
    match &result.database {
        Some(path) => println!("Cache: {}", path.display()),
        None => println!("Cache: disabled"),
    }
    if result.dry_run {
        println!("DRYRUN: no exports occurred");
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Phase"),
        header_cell(if result.dry_run { "Would export" } else { "Exported" }),
        header_cell("Skipped"),
        header_cell("Failed"),
        header_cell("Files"),
        header_cell("Rows"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..=5 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    let mut total = Totals::default();
    for phase in &result.phases {
        total.add(phase);
        table.add_row(vec![
            Cell::new(phase.phase.label())
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            count_cell(phase.exported, Color::Green),
            dim_cell(phase.skipped),
            count_cell(phase.failed, Color::Red),
            dim_cell(phase.files_written),
            dim_cell(phase.rows_inserted),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        count_cell(total.exported, Color::Green).add_attribute(Attribute::Bold),
        Cell::new(total.skipped).add_attribute(Attribute::Bold),
        count_cell(total.failed, Color::Red).add_attribute(Attribute::Bold),
        Cell::new(total.files_written).add_attribute(Attribute::Bold),
        Cell::new(total.rows_inserted).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");

    if result.dry_run && !result.exported.is_empty() {
        println!("These items would be exported:");
        for item in &result.exported {
            println!("  {item}");
        }
    }
    if !result.removed_variables.is_empty() {
        println!("Removed unlisted variables:");
        for variable in &result.removed_variables {
            println!("  {}", variable.to_lowercase());
        }
    }
    print_diagnostic_table(result.diagnostics.entries());
    if !result.errors.is_empty() {
        eprintln!("-------------------------------------");
        eprintln!("These are the errors that were found:");
        for error in &result.errors {
            eprintln!("{error}");
        }
    }
}

pub fn print_check(result: &CheckResult) {
    println!("Cache: {}", result.database.display());
    if result.invalid_rows.is_empty() {
        println!("No invalid rows found");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("Table"), header_cell("Variable")]);
    apply_table_style(&mut table);
    for row in &result.invalid_rows {
        table.add_row(vec![
            Cell::new(row.table.name()),
            Cell::new(&row.variable).fg(Color::Yellow),
        ]);
    }
    println!("{table}");
}

#[derive(Default)]
struct Totals {
    exported: usize,
    skipped: usize,
    failed: usize,
    files_written: usize,
    rows_inserted: usize,
}

impl Totals {
    fn add(&mut self, phase: &PhaseSummary) {
        self.exported += phase.exported;
        self.skipped += phase.skipped;
        self.failed += phase.failed;
        self.files_written += phase.files_written;
        self.rows_inserted += phase.rows_inserted;
    }
}

fn print_diagnostic_table(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    let mut ordered: Vec<&Diagnostic> = diagnostics.iter().collect();
    ordered.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.subject.cmp(&b.subject)));
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Level"),
        header_cell("Subject"),
        header_cell("Message"),
    ]);
    apply_diagnostic_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Center);
    for diagnostic in ordered {
        table.add_row(vec![
            level_cell(diagnostic.level),
            Cell::new(&diagnostic.subject),
            Cell::new(&diagnostic.message),
        ]);
    }
    println!();
    println!("Diagnostics:");
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
}

fn apply_diagnostic_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(160);
    if table.column_count() >= 3 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Fixed(9)),
            ColumnConstraint::UpperBoundary(Width::Fixed(16)),
            ColumnConstraint::UpperBoundary(Width::Percentage(80)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn level_cell(level: DiagnosticLevel) -> Cell {
    match level {
        DiagnosticLevel::Error => Cell::new("ERROR")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
        DiagnosticLevel::Warning => Cell::new("WARN").fg(Color::Yellow),
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
