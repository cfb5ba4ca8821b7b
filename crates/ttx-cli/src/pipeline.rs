//! Export pipeline.
//!
//! A run has two phases, source-variable samples then integrated
//! variables. Each phase decides freshness sequentially, computes records,
//! files and cache rows on a worker pool, then applies the cache units one
//! at a time on the calling thread. Freshness is recorded only after a
//! unit commits.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use ttx_cache::{
    CacheWriter, FreshnessStore, FreshnessTracker, MemoryFreshnessStore, SampleDecision,
    SqliteFreshnessStore, UnitBatch, sample_artifact, variable_artifact,
};
use ttx_model::{
    DataDictionary, Diagnostics, MetadataSource, ProjectConfig, TableRows, TtTable, VariableEntry,
};
use ttx_output::{
    ExportLayout, OutputFormat, WriteOutcome, integrated_deletes, last_updated_row,
    remove_all_files, remove_stale_files, sample_deletes, serialize, to_flat_csv,
    to_relational_rows, write_if_changed,
};
use ttx_transform::TransformEngine;

use crate::types::{ExportResult, ItemError, Phase, PhaseSummary};

/// Unit id shared by the integrated variables of one run.
pub const INTEGRATED_UNIT: &str = "integrated";

/// `date_created` format of the cache rows.
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

type Tracker = FreshnessTracker<Box<dyn FreshnessStore>>;

/// Which variables and samples a run exports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub variables: Vec<String>,
    pub all_variables: bool,
    pub samples: Vec<String>,
    pub all_samples: bool,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.samples.is_empty()
            && !self.all_variables
            && !self.all_samples
    }

    fn has_variables(&self) -> bool {
        self.all_variables || !self.variables.is_empty()
    }

    fn has_samples(&self) -> bool {
        self.all_samples || !self.samples.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub selection: Selection,
    pub force: bool,
    pub dry_run: bool,
    pub jobs: usize,
    pub formats: Vec<OutputFormat>,
    pub output_root: PathBuf,
    /// Cache database; `None` runs without the relational cache.
    pub database: Option<PathBuf>,
}

/// What one worker produced for a variable or sample.
#[derive(Debug)]
pub struct ItemOutcome {
    pub item: String,
    pub artifact: String,
    pub source_mtime: SystemTime,
    pub diagnostics: Diagnostics,
    pub result: std::result::Result<ItemOutput, Vec<ItemError>>,
}

#[derive(Debug)]
pub struct ItemOutput {
    pub batch: UnitBatch,
    pub files_written: usize,
}

/// Runs one export over `source`.
///
/// Per-item failures are collected in the result. Errors returned here are
/// fatal for the run: no known samples, an unusable cache or a failed
/// freshness write.
pub fn run_export(
    source: &dyn MetadataSource,
    config: &ProjectConfig,
    options: &ExportOptions,
) -> Result<ExportResult> {
    let span = info_span!("export", project = config.name(), dry_run = options.dry_run);
    let _guard = span.enter();
    let start = Instant::now();

    let engine = TransformEngine::new(source, config).context("resolve known samples")?;
    let layout = ExportLayout::new(&options.output_root);
    let stamp = chrono::Local::now().format(STAMP_FORMAT).to_string();
    let cache = open_cache(config, options)?;
    let tracker = FreshnessTracker::new(
        open_freshness_store(options)?,
        options.force,
        config.publishes_svars(),
    );
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.max(1))
        .build()
        .context("build worker pool")?;

    let mut run = ExportRun {
        worker: Worker {
            engine: &engine,
            layout: &layout,
            formats: &options.formats,
            stamp: &stamp,
        },
        pool,
        tracker,
        cache,
        options,
        result: ExportResult {
            project: config.name().to_string(),
            output_root: options.output_root.clone(),
            database: options.database.clone(),
            dry_run: options.dry_run,
            phases: Vec::new(),
            exported: Vec::new(),
            errors: Vec::new(),
            diagnostics: Diagnostics::new(),
            removed_files: Vec::new(),
            removed_variables: Vec::new(),
        },
    };

    if options.selection.has_samples() {
        let samples = select_samples(source, &options.selection)?;
        run.export_samples(samples)?;
    }
    if options.selection.has_variables() {
        let listed = source.variables().context("read variable list")?;
        let entries = select_variables(&listed, &options.selection);
        run.export_integrated(entries)?;
        if options.selection.all_variables && !options.dry_run {
            let valid: BTreeSet<String> = listed
                .iter()
                .map(|entry| entry.variable.to_uppercase())
                .collect();
            run.clean_up(&valid)?;
        }
    }

    let result = run.result;
    info!(
        exported = result.exported.len(),
        failed = result.errors.len(),
        duration_ms = start.elapsed().as_millis(),
        "export complete"
    );
    Ok(result)
}

/// Requested samples, lowercased, first occurrence kept.
fn select_samples(source: &dyn MetadataSource, selection: &Selection) -> Result<Vec<String>> {
    let requested = if selection.all_samples {
        source.samples().context("list data dictionaries")?
    } else {
        selection.samples.clone()
    };
    let mut seen = HashSet::new();
    Ok(requested
        .into_iter()
        .map(|sample| sample.trim().to_lowercase())
        .filter(|sample| seen.insert(sample.clone()))
        .collect())
}

/// Requested variables, resolving display tables from the project list.
///
/// Names repeated in any case are exported once, from their first entry.
fn select_variables(listed: &[VariableEntry], selection: &Selection) -> Vec<VariableEntry> {
    let entries: Vec<VariableEntry> = if selection.all_variables {
        listed.to_vec()
    } else {
        selection
            .variables
            .iter()
            .map(|name| {
                listed
                    .iter()
                    .find(|entry| entry.variable.eq_ignore_ascii_case(name))
                    .cloned()
                    .unwrap_or_else(|| VariableEntry::new(name.to_uppercase()))
            })
            .collect()
    };
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.variable.to_uppercase()))
        .collect()
}

fn open_cache(config: &ProjectConfig, options: &ExportOptions) -> Result<Option<CacheWriter>> {
    let Some(path) = options.database.as_deref().filter(|_| !options.dry_run) else {
        return Ok(None);
    };
    ensure_parent_dir(path)?;
    let writer =
        CacheWriter::open(path).with_context(|| format!("open cache {}", path.display()))?;
    writer
        .check_project(config.name())
        .with_context(|| format!("check cache {}", path.display()))?;
    Ok(Some(writer))
}

/// A dry run reads an existing cache's freshness read-only and never
/// creates one.
fn open_freshness_store(options: &ExportOptions) -> Result<Box<dyn FreshnessStore>> {
    let store = match options.database.as_deref() {
        Some(path) if options.dry_run && path.is_file() => {
            SqliteFreshnessStore::open_read_only(path)
                .with_context(|| format!("read freshness records {}", path.display()))?
        }
        Some(path) if !options.dry_run => {
            ensure_parent_dir(path)?;
            SqliteFreshnessStore::open(path)
                .with_context(|| format!("open freshness records {}", path.display()))?
        }
        _ => return Ok(Box::new(MemoryFreshnessStore::new())),
    };
    Ok(Box::new(store))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    Ok(())
}

struct ExportRun<'a> {
    worker: Worker<'a>,
    pool: rayon::ThreadPool,
    tracker: Tracker,
    cache: Option<CacheWriter>,
    options: &'a ExportOptions,
    result: ExportResult,
}

impl ExportRun<'_> {
    fn export_integrated(&mut self, entries: Vec<VariableEntry>) -> Result<()> {
        let span = info_span!("integrated", variables = entries.len());
        let _guard = span.enter();
        let start = Instant::now();
        let source = self.worker.engine.source();
        let mut summary = PhaseSummary::new(Phase::Integrated);

        let mut pending = Vec::new();
        for entry in entries {
            let item = entry.variable.to_lowercase();
            let mtime = match source.translation_table_modified(entry.table_name()) {
                Ok(mtime) => mtime,
                Err(error) => {
                    summary.failed += 1;
                    self.result.errors.push(ItemError::new(item, error.to_string()));
                    continue;
                }
            };
            if self
                .tracker
                .needs_export(&variable_artifact(&entry.variable), mtime)?
            {
                pending.push((entry, mtime));
            } else {
                debug!(variable = %item, "export current");
                summary.skipped += 1;
            }
        }

        if self.options.dry_run {
            summary.exported = pending.len();
            self.result
                .exported
                .extend(pending.iter().map(|(entry, _)| entry.variable.to_lowercase()));
            self.result.phases.push(summary);
            return Ok(());
        }

        let worker = &self.worker;
        let outcomes: Vec<ItemOutcome> = self.pool.install(|| {
            pending
                .par_iter()
                .map(|(entry, mtime)| worker.integrated(entry, *mtime))
                .collect()
        });

        let mut unit = UnitBatch::new(INTEGRATED_UNIT);
        let mut built = Vec::new();
        for outcome in outcomes {
            self.result.diagnostics.merge(outcome.diagnostics);
            match outcome.result {
                Ok(output) => {
                    summary.files_written += output.files_written;
                    unit.merge(output.batch);
                    built.push((outcome.item, outcome.artifact, outcome.source_mtime));
                }
                Err(errors) => {
                    summary.failed += 1;
                    self.result.errors.extend(errors);
                }
            }
        }

        if let Some(cache) = self.cache.as_mut()
            && !unit.is_empty()
        {
            match cache.flush(&unit) {
                Ok(stats) => summary.rows_inserted += stats.inserted,
                Err(error) => {
                    let message = error.to_string();
                    for (item, ..) in built.drain(..) {
                        summary.failed += 1;
                        self.result.errors.push(ItemError::new(item, message.clone()));
                    }
                }
            }
        }

        for (item, artifact, mtime) in built {
            self.tracker
                .mark_exported(&artifact, mtime, true)
                .with_context(|| format!("record export of {item}"))?;
            summary.exported += 1;
            self.result.exported.push(item);
        }
        info!(
            exported = summary.exported,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_ms = start.elapsed().as_millis(),
            "integrated variables done"
        );
        self.result.phases.push(summary);
        Ok(())
    }

    fn export_samples(&mut self, samples: Vec<String>) -> Result<()> {
        let span = info_span!("samples", samples = samples.len());
        let _guard = span.enter();
        let start = Instant::now();
        let source = self.worker.engine.source();
        let mut summary = PhaseSummary::new(Phase::Samples);

        let mut pending = Vec::new();
        for sample in samples {
            let decision = source
                .data_dictionary_modified(&sample)
                .map_err(anyhow::Error::from)
                .and_then(|mtime| {
                    let decision = self.tracker.sample_decision(&sample, mtime, || -> Result<bool> {
                        Ok(source.data_dictionary(&sample)?.has_recodes())
                    })?;
                    Ok((decision, mtime))
                });
            match decision {
                Ok((SampleDecision::Export, mtime)) => pending.push((sample, mtime)),
                Ok((SampleDecision::Current, _)) => summary.skipped += 1,
                Ok((SampleDecision::Assessed, mtime)) => {
                    summary.skipped += 1;
                    if !self.options.dry_run {
                        debug!(%sample, "no recodes to publish");
                        self.tracker
                            .mark_exported(&sample_artifact(&sample), mtime, false)
                            .with_context(|| format!("record assessment of {sample}"))?;
                    }
                }
                Err(error) => {
                    summary.failed += 1;
                    self.result
                        .errors
                        .push(ItemError::new(sample, format!("{error:#}")));
                }
            }
        }

        if self.options.dry_run {
            summary.exported = pending.len();
            self.result
                .exported
                .extend(pending.iter().map(|(sample, _)| sample.clone()));
            self.result.phases.push(summary);
            return Ok(());
        }

        let worker = &self.worker;
        let outcomes: Vec<ItemOutcome> = self.pool.install(|| {
            pending
                .par_iter()
                .map(|(sample, mtime)| worker.sample(sample, *mtime))
                .collect()
        });

        let exported_flag = self.tracker.sample_exported_flag();
        for outcome in outcomes {
            self.result.diagnostics.merge(outcome.diagnostics);
            let output = match outcome.result {
                Ok(output) => output,
                Err(errors) => {
                    warn!(sample = %outcome.item, "sample failed");
                    summary.failed += 1;
                    self.result.errors.extend(errors);
                    continue;
                }
            };
            summary.files_written += output.files_written;
            if let Some(cache) = self.cache.as_mut() {
                match cache.flush(&output.batch) {
                    Ok(stats) => summary.rows_inserted += stats.inserted,
                    Err(error) => {
                        summary.failed += 1;
                        self.result
                            .errors
                            .push(ItemError::new(outcome.item, error.to_string()));
                        continue;
                    }
                }
            }
            self.tracker
                .mark_exported(&outcome.artifact, outcome.source_mtime, exported_flag)
                .with_context(|| format!("record export of {}", outcome.item))?;
            summary.exported += 1;
            self.result.exported.push(outcome.item);
        }
        info!(
            exported = summary.exported,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_ms = start.elapsed().as_millis(),
            "samples done"
        );
        self.result.phases.push(summary);
        Ok(())
    }

    /// Removes outputs and cache rows of integrated variables that are no
    /// longer listed.
    fn clean_up(&mut self, valid: &BTreeSet<String>) -> Result<()> {
        let dir = self.worker.layout.integrated_dir();
        let mut cruft = BTreeSet::new();
        for format in [OutputFormat::Markup, OutputFormat::Structured] {
            let removed = remove_stale_files(&dir, format, valid)?;
            cruft.extend(removed.iter().filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| stem.strip_suffix("_tt"))
                    .map(str::to_uppercase)
            }));
            self.result.removed_files.extend(removed);
        }
        if let Some(cache) = self.cache.as_mut() {
            let cached = cache
                .integrated_variables()
                .context("list cached integrated variables")?;
            cruft.extend(cached.into_iter().filter(|name| !valid.contains(name)));
            let names: Vec<String> = cruft.iter().cloned().collect();
            let rows = cache
                .remove_variables(&names)
                .context("remove unlisted variables from cache")?;
            if !names.is_empty() {
                info!(variables = names.len(), rows, "removed unlisted variables");
            }
        }
        self.result.removed_variables = cruft.into_iter().collect();
        Ok(())
    }
}

/// Shared, read-only state of the compute phase.
struct Worker<'a> {
    engine: &'a TransformEngine<'a>,
    layout: &'a ExportLayout,
    formats: &'a [OutputFormat],
    stamp: &'a str,
}

impl Worker<'_> {
    fn integrated(&self, entry: &VariableEntry, source_mtime: SystemTime) -> ItemOutcome {
        let span = info_span!("variable", variable = %entry.variable);
        let _guard = span.enter();
        let item = entry.variable.to_lowercase();
        let mut diagnostics = Diagnostics::new();
        let result = self
            .integrated_output(entry, &mut diagnostics)
            .map_err(|error| vec![ItemError::new(item.clone(), format!("{error:#}"))]);
        ItemOutcome {
            item,
            artifact: variable_artifact(&entry.variable),
            source_mtime,
            diagnostics,
            result,
        }
    }

    fn integrated_output(
        &self,
        entry: &VariableEntry,
        diagnostics: &mut Diagnostics,
    ) -> Result<ItemOutput> {
        let record = self.engine.build_entry(entry, diagnostics)?;
        let variable = record.variable_name.as_str();
        let mut files_written = 0;
        for &format in self.formats {
            let bytes = serialize(&record, format)?;
            files_written += write_file(&self.layout.integrated_path(variable, format), &bytes)?;
        }
        if self.engine.config().publishes_user_trans_tables() {
            let bytes = to_flat_csv(&record)?;
            files_written += write_file(&self.layout.user_table_path(variable), &bytes)?;
        }
        let mut batch = UnitBatch::new(variable);
        batch.add_deletes(integrated_deletes([variable]));
        batch.add_rows(to_relational_rows(&record, self.stamp, diagnostics));
        batch.push_row(TtTable::LastUpdated, last_updated_row(variable, self.stamp));
        debug!(files_written, rows = batch.rows().row_count(), "variable built");
        Ok(ItemOutput {
            batch,
            files_written,
        })
    }

    fn sample(&self, sample: &str, source_mtime: SystemTime) -> ItemOutcome {
        let span = info_span!("sample", sample);
        let _guard = span.enter();
        let mut diagnostics = Diagnostics::new();
        let result = self.sample_output(sample, &mut diagnostics);
        ItemOutcome {
            item: sample.to_string(),
            artifact: sample_artifact(sample),
            source_mtime,
            diagnostics,
            result,
        }
    }

    /// Every svar of the sample in one unit. One failed svar fails the
    /// sample, though the other svars' files are still written.
    fn sample_output(
        &self,
        sample: &str,
        diagnostics: &mut Diagnostics,
    ) -> std::result::Result<ItemOutput, Vec<ItemError>> {
        let fail = |error: anyhow::Error| vec![ItemError::new(sample, format!("{error:#}"))];
        let dictionary = self
            .engine
            .source()
            .data_dictionary(sample)
            .map_err(|error| fail(error.into()))?;
        let mut svars: Vec<String> = dictionary.svar_names().map(str::to_uppercase).collect();
        svars.sort();
        svars.dedup();
        if svars.is_empty() {
            return Err(fail(anyhow!("{sample} Data Dictionary has no svars!")));
        }

        let publishes = self.engine.config().publishes_svars();
        let mut batch = UnitBatch::new(sample);
        batch.add_deletes(sample_deletes(sample, svars.iter().map(String::as_str)));
        let mut files_written = 0;
        let mut errors = Vec::new();
        for svar in &svars {
            match self.svar_output(&dictionary, sample, svar, publishes, diagnostics) {
                Ok((rows, written)) => {
                    batch.add_rows(rows);
                    files_written += written;
                }
                Err(error) => errors.push(ItemError::new(svar.clone(), format!("{error:#}"))),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let sample_dir = self.layout.sample_dir(sample);
        if !publishes {
            remove_all_files(&sample_dir, OutputFormat::Markup).map_err(fail)?;
        }
        let keep: BTreeSet<String> = svars.iter().cloned().collect();
        for &format in self.formats {
            if format == OutputFormat::Markup && !publishes {
                continue;
            }
            remove_stale_files(&sample_dir, format, &keep).map_err(fail)?;
        }
        batch.push_row(TtTable::LastUpdated, last_updated_row(sample, self.stamp));
        debug!(
            svars = svars.len(),
            files_written,
            rows = batch.rows().row_count(),
            "sample built"
        );
        Ok(ItemOutput {
            batch,
            files_written,
        })
    }

    /// Markup is written only for projects that publish svars.
    fn svar_output(
        &self,
        dictionary: &DataDictionary,
        sample: &str,
        svar: &str,
        publishes: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<(TableRows, usize)> {
        let record = self.engine.build_source_from(dictionary, svar, diagnostics)?;
        let mut written = 0;
        for &format in self.formats {
            if format == OutputFormat::Markup && !publishes {
                continue;
            }
            let bytes = serialize(&record, format)?;
            written += write_file(
                &self.layout.svar_path(sample, &record.variable_name, format),
                &bytes,
            )?;
        }
        Ok((to_relational_rows(&record, self.stamp, diagnostics), written))
    }
}

/// 1 when the file changed, 0 when it already held `bytes`.
fn write_file(path: &Path, bytes: &[u8]) -> Result<usize> {
    let outcome = write_if_changed(path, bytes)?;
    Ok(usize::from(outcome == WriteOutcome::Written))
}
