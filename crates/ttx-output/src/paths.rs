//! Output locations and file writing.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const TT_SUFFIX: &str = "_tt";

/// Serialized file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markup,
    Structured,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markup => "xml",
            OutputFormat::Structured => "json",
        }
    }
}

/// Directory layout under the project's output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    root: PathBuf,
}

impl ExportLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn trans_tables_dir(&self) -> PathBuf {
        self.root.join("trans_tables")
    }

    pub fn integrated_dir(&self) -> PathBuf {
        self.trans_tables_dir().join("integrated_variables")
    }

    pub fn sample_dir(&self, sample: &str) -> PathBuf {
        self.trans_tables_dir().join(sample.to_lowercase())
    }

    pub fn user_tables_dir(&self) -> PathBuf {
        self.root.join("user_trans_tables")
    }

    /// `integrated_variables/<var>_tt.<ext>`, lowercase.
    pub fn integrated_path(&self, variable: &str, format: OutputFormat) -> PathBuf {
        self.integrated_dir().join(format!(
            "{}{TT_SUFFIX}.{}",
            variable.to_lowercase(),
            format.extension()
        ))
    }

    /// `<sample>/<SVAR>_tt.<ext>`; the svar keeps its uppercase name.
    pub fn svar_path(&self, sample: &str, svar: &str, format: OutputFormat) -> PathBuf {
        self.sample_dir(sample).join(format!(
            "{}{TT_SUFFIX}.{}",
            svar.to_uppercase(),
            format.extension()
        ))
    }

    pub fn user_table_path(&self, variable: &str) -> PathBuf {
        self.user_tables_dir()
            .join(format!("{}{TT_SUFFIX}.csv", variable.to_lowercase()))
    }
}

/// Result of [`write_if_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Writes `contents` unless the file already holds exactly those bytes.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> Result<WriteOutcome> {
    if let Ok(existing) = fs::read(path)
        && existing == contents
    {
        debug!(path = %path.display(), "content unchanged");
        return Ok(WriteOutcome::Unchanged);
    }
    ensure_parent_dir(path)?;
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(WriteOutcome::Written)
}

/// Removes `<name>_tt.<ext>` files in `dir` whose name is not in `keep`.
///
/// Names compare case-insensitively. A missing directory has nothing stale.
pub fn remove_stale_files(
    dir: &Path,
    format: OutputFormat,
    keep: &BTreeSet<String>,
) -> Result<Vec<PathBuf>> {
    let keep: BTreeSet<String> = keep.iter().map(|name| name.to_lowercase()).collect();
    remove_matching(dir, format, |name| !keep.contains(&name.to_lowercase()))
}

/// Removes every `*_tt.<ext>` file in `dir`.
pub fn remove_all_files(dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
    remove_matching(dir, format, |_| true)
}

fn remove_matching(
    dir: &Path,
    format: OutputFormat,
    should_remove: impl Fn(&str) -> bool,
) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut removed = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("read {}", dir.display()))?
            .path();
        if !path.is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some(format.extension())
        {
            continue;
        }
        let Some(name) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.strip_suffix(TT_SUFFIX))
        else {
            continue;
        };
        if should_remove(name) {
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
            info!(path = %path.display(), "removed stale translation table");
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    Ok(())
}
