use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::Table;
use tracing::info_span;

use ttx_cache::CacheWriter;
use ttx_ingest::ProjectSource;
use ttx_model::MetadataSource;
use ttx_output::OutputFormat;

use ttx_cli::pipeline::{self, ExportOptions, Selection};
use ttx_cli::types::{CheckResult, ExportResult};

use crate::cli::{CheckArgs, ExportArgs, FormatArg, ProjectArgs};
use crate::summary::apply_table_style;

fn open_project(project: &Path) -> Result<ProjectSource> {
    ProjectSource::open(project).with_context(|| format!("open project {}", project.display()))
}

pub fn run_export(args: &ExportArgs) -> Result<ExportResult> {
    let project = open_project(&args.project.project)?;
    let config = project.config();
    let selection = Selection {
        variables: args.variable.clone(),
        all_variables: args.all || args.all_vars,
        samples: args.sample.clone(),
        all_samples: args.all || args.all_samples,
    };
    if selection.is_empty() {
        bail!("specify --variable, --sample, --all-vars, --all-samples or --all");
    }
    // A single named variable is always exported.
    let single_variable = !selection.all_variables && selection.variables.len() == 1;
    let uses_cache = config.uses_sqlite() && !args.no_sqlite;
    let options = ExportOptions {
        force: args.force || single_variable,
        dry_run: args.dry_run,
        jobs: if args.serial {
            1
        } else {
            args.jobs.unwrap_or(config.export.jobs)
        },
        formats: output_formats(args.format),
        output_root: args
            .output_dir
            .clone()
            .unwrap_or_else(|| project.output_root()),
        database: uses_cache.then(|| {
            args.db_file
                .clone()
                .unwrap_or_else(|| project.database_path())
        }),
        selection,
    };
    pipeline::run_export(&project, config, &options)
}

pub fn run_variables(args: &ProjectArgs) -> Result<()> {
    let project = open_project(&args.project)?;
    let variables = project.variables().context("read variable list")?;
    let mut table = Table::new();
    table.set_header(vec!["Variable", "Translation table"]);
    apply_table_style(&mut table);
    for entry in &variables {
        table.add_row(vec![
            entry.variable.to_lowercase(),
            entry.table_name().to_lowercase(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_check(args: &CheckArgs) -> Result<CheckResult> {
    let project = open_project(&args.project.project)?;
    let database = args
        .db_file
        .clone()
        .unwrap_or_else(|| project.database_path());
    let span = info_span!("check", database = %database.display());
    let _guard = span.enter();
    if !database.is_file() {
        bail!("no cache database at {}", database.display());
    }
    let cache =
        CacheWriter::open(&database).with_context(|| format!("open cache {}", database.display()))?;
    cache
        .check_project(project.config().name())
        .with_context(|| format!("check cache {}", database.display()))?;
    let invalid_rows = cache.invalid_rows().context("check cache integrity")?;
    Ok(CheckResult {
        database,
        invalid_rows,
    })
}

fn output_formats(format: FormatArg) -> Vec<OutputFormat> {
    match format {
        FormatArg::Xml => vec![OutputFormat::Markup],
        FormatArg::Json => vec![OutputFormat::Structured],
        FormatArg::Both => vec![OutputFormat::Markup, OutputFormat::Structured],
    }
}
