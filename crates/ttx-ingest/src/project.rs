//! [`MetadataSource`] over a project directory.
//!
//! ```text
//! <project>/project.toml
//! <project>/metadata/samples.csv
//! <project>/metadata/variables.csv
//! <project>/metadata/translation_tables/<VAR>_tt.json
//! <project>/metadata/data_dictionaries/<sample>_dd.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use ttx_model::{
    DataDictionary, MetadataSource, PROJECT_CONFIG_FILE, ProjectConfig, SampleCatalog,
    SourceError, TranslationTable, VariableEntry,
};

use crate::catalog::{load_sample_catalog, load_variable_list};
use crate::error::{IngestError, Result};

const METADATA_DIR: &str = "metadata";
const TRANSLATION_TABLES_DIR: &str = "translation_tables";
const DATA_DICTIONARIES_DIR: &str = "data_dictionaries";
const TT_SUFFIX: &str = "_tt.json";
const DD_SUFFIX: &str = "_dd.json";
const DEFAULT_DATABASE: &str = "metadata.db";

/// A project directory with its configuration and catalog lists loaded.
///
/// Translation tables and data dictionaries are read on demand, so one
/// instance can serve every worker of a run.
#[derive(Debug, Clone)]
pub struct ProjectSource {
    root: PathBuf,
    config: ProjectConfig,
    catalog: SampleCatalog,
    variables: Vec<VariableEntry>,
}

impl ProjectSource {
    /// Loads `project.toml` and the sample and variable lists under `root`.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(IngestError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }
        let config = ProjectConfig::load(&root.join(PROJECT_CONFIG_FILE))?;
        let metadata = root.join(METADATA_DIR);
        let catalog = load_sample_catalog(&metadata.join("samples.csv"))?;
        let variables = load_variable_list(&metadata.join("variables.csv"))?;
        info!(
            project = config.name(),
            samples = catalog.len(),
            variables = variables.len(),
            "opened project"
        );
        Ok(Self {
            root: root.to_path_buf(),
            config,
            catalog,
            variables,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Export root, resolved against the project directory.
    pub fn output_root(&self) -> PathBuf {
        self.root.join(&self.config.export.output_root)
    }

    /// Cache database; `<output_root>/metadata.db` unless configured.
    pub fn database_path(&self) -> PathBuf {
        match &self.config.export.database {
            Some(path) => self.root.join(path),
            None => self.output_root().join(DEFAULT_DATABASE),
        }
    }

    fn tables_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR).join(TRANSLATION_TABLES_DIR)
    }

    fn dictionaries_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR).join(DATA_DICTIONARIES_DIR)
    }

    /// `<VAR>_tt.json`, falling back to a lowercase file name.
    pub fn translation_table_path(&self, variable: &str) -> Result<PathBuf> {
        let dir = self.tables_dir();
        let upper = dir.join(format!("{}{TT_SUFFIX}", variable.to_uppercase()));
        if upper.is_file() {
            return Ok(upper);
        }
        let lower = dir.join(format!("{}{TT_SUFFIX}", variable.to_lowercase()));
        if lower.is_file() {
            return Ok(lower);
        }
        Err(IngestError::FileNotFound {
            kind: "translation table",
            name: variable.to_uppercase(),
            path: upper,
        })
    }

    pub fn data_dictionary_path(&self, sample: &str) -> Result<PathBuf> {
        let path = self
            .dictionaries_dir()
            .join(format!("{}{DD_SUFFIX}", sample.to_lowercase()));
        if path.is_file() {
            Ok(path)
        } else {
            Err(IngestError::FileNotFound {
                kind: "data dictionary",
                name: sample.to_lowercase(),
                path,
            })
        }
    }

    /// Samples with a dictionary file, sorted.
    pub fn dictionary_samples(&self) -> Result<Vec<String>> {
        let dir = self.dictionaries_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| IngestError::DirectoryRead {
            path: dir.clone(),
            source,
        })?;
        let mut samples = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| IngestError::DirectoryRead {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            if let Some(sample) = name.to_str().and_then(|name| name.strip_suffix(DD_SUFFIX)) {
                samples.push(sample.to_lowercase());
            }
        }
        samples.sort();
        samples.dedup();
        Ok(samples)
    }

    pub fn load_translation_table(&self, variable: &str) -> Result<TranslationTable> {
        let path = self.translation_table_path(variable)?;
        let mut table: TranslationTable = read_json(&path)?;
        if table.variable.is_empty() {
            table.variable = variable.to_uppercase();
        }
        Ok(table)
    }

    pub fn load_data_dictionary(&self, sample: &str) -> Result<DataDictionary> {
        let path = self.data_dictionary_path(sample)?;
        let mut dictionary: DataDictionary = read_json(&path)?;
        if dictionary.sample.is_empty() {
            dictionary.sample = sample.to_lowercase();
        }
        Ok(dictionary)
    }

    /// Sample whose dictionary defines `svar`.
    ///
    /// Svars are conventionally prefixed with their sample id; other names
    /// are looked up dictionary by dictionary.
    pub fn find_svar_sample(&self, svar: &str) -> Result<String> {
        if let Some((prefix, _)) = svar.split_once('_') {
            let sample = prefix.to_lowercase();
            if self.catalog.contains(&sample) && self.data_dictionary_path(&sample).is_ok() {
                return Ok(sample);
            }
        }
        for sample in self.dictionary_samples()? {
            if self.load_data_dictionary(&sample)?.svar(svar).is_some() {
                debug!(svar, %sample, "resolved svar by dictionary scan");
                return Ok(sample);
            }
        }
        Err(IngestError::UnknownSvar {
            svar: svar.to_uppercase(),
        })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|err| IngestError::JsonParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn modified(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_err(|source| IngestError::FileRead {
            path: path.to_path_buf(),
            source,
        })
}

impl MetadataSource for ProjectSource {
    fn known_samples(&self) -> std::result::Result<SampleCatalog, SourceError> {
        Ok(self.catalog.clone())
    }

    fn variables(&self) -> std::result::Result<Vec<VariableEntry>, SourceError> {
        Ok(self.variables.clone())
    }

    fn samples(&self) -> std::result::Result<Vec<String>, SourceError> {
        Ok(self.dictionary_samples()?)
    }

    fn translation_table(&self, variable: &str) -> std::result::Result<TranslationTable, SourceError> {
        Ok(self.load_translation_table(variable)?)
    }

    fn data_dictionary(&self, sample: &str) -> std::result::Result<DataDictionary, SourceError> {
        Ok(self.load_data_dictionary(sample)?)
    }

    fn svar_sample(&self, svar: &str) -> std::result::Result<String, SourceError> {
        Ok(self.find_svar_sample(svar)?)
    }

    fn translation_table_modified(
        &self,
        variable: &str,
    ) -> std::result::Result<SystemTime, SourceError> {
        Ok(modified(&self.translation_table_path(variable)?)?)
    }

    fn data_dictionary_modified(&self, sample: &str) -> std::result::Result<SystemTime, SourceError> {
        Ok(modified(&self.data_dictionary_path(sample)?)?)
    }
}
