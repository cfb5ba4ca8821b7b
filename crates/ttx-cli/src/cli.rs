//! CLI argument definitions for the translation-table exporter.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "ttx",
    version,
    about = "Export translation tables to markup, JSON and the relational cache",
    long_about = "Export a project's translation tables.\n\n\
                  Integrated variables are read from translation tables and source\n\
                  variables from per-sample data dictionaries. Each is written as\n\
                  legacy markup and/or JSON and mirrored into a SQLite cache."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Export translation tables of variables and samples.
    Export(ExportArgs),

    /// List the project's integrated variables.
    Variables(ProjectArgs),

    /// Report cache rows whose variable has no sample variable entry.
    Check(CheckArgs),
}

#[derive(Args)]
pub struct ProjectArgs {
    /// Project directory containing project.toml.
    #[arg(long = "project", short = 'p', value_name = "DIR", default_value = ".")]
    pub project: PathBuf,
}

#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Integrated variable to export (repeatable). A single variable is always exported.
    #[arg(long = "variable", value_name = "VAR")]
    pub variable: Vec<String>,

    /// Sample whose source variables are exported (repeatable).
    #[arg(long = "sample", short = 's', value_name = "SAMPLE")]
    pub sample: Vec<String>,

    /// Export every listed integrated variable.
    #[arg(long = "all-vars")]
    pub all_vars: bool,

    /// Export every sample with a data dictionary.
    #[arg(long = "all-samples")]
    pub all_samples: bool,

    /// Export all variables and all samples.
    #[arg(long = "all", short = 'a')]
    pub all: bool,

    /// Export even when outputs are newer than their sources.
    #[arg(long = "force", short = 'f')]
    pub force: bool,

    /// Report what would be exported without writing anything.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Run with a single worker.
    #[arg(long = "serial")]
    pub serial: bool,

    /// Worker count (default: export.jobs from project.toml).
    #[arg(long = "jobs", short = 'j', value_name = "N")]
    pub jobs: Option<usize>,

    /// Cache database (default: export.database or <OUTPUT_DIR>/metadata.db).
    #[arg(long = "db-file", value_name = "PATH")]
    pub db_file: Option<PathBuf>,

    /// Skip the relational cache for this run.
    #[arg(long = "no-sqlite")]
    pub no_sqlite: bool,

    /// Output root (default: export.output_root from project.toml).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// File format to write.
    #[arg(long = "format", value_enum, default_value = "xml")]
    pub format: FormatArg,
}

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Cache database (default: export.database or <OUTPUT_DIR>/metadata.db).
    #[arg(long = "db-file", value_name = "PATH")]
    pub db_file: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Xml,
    Json,
    Both,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
