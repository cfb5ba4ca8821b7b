//! Project configuration.
//!
//! Per-project behavior (anchor forms, source-variable docs, restricted
//! data, publication of source-variable tables) is read from
//! `project.toml` rather than keyed on the project name.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the project configuration inside a project directory.
pub const PROJECT_CONFIG_FILE: &str = "project.toml";

const DEFAULT_JOBS: usize = 32;

/// Immutable configuration passed to every transform call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub export: ExportSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    pub name: String,
}

/// Feature switches that gate optional sample-block fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureFlags {
    /// Emit the restricted flag on samples marked `restricted`.
    pub restricted_data: bool,
    /// Emit anchor form and anchor instrument fields.
    pub anchor_form: bool,
    /// Emit the source-variable documentation reference.
    pub svar_doc: bool,
    /// Write markup for source variables.
    pub publish_svars: bool,
    /// Write the flat CSV recoding table for integrated variables.
    pub publish_user_trans_tables: bool,
    /// Maintain the relational cache.
    pub sqlite: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            restricted_data: false,
            anchor_form: false,
            svar_doc: true,
            publish_svars: true,
            publish_user_trans_tables: false,
            sqlite: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSection {
    /// Worker count for the compute phase.
    pub jobs: usize,
    /// Export root, relative to the project directory.
    pub output_root: PathBuf,
    /// Cache database, relative to the project directory.
    pub database: Option<PathBuf>,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_JOBS,
            output_root: PathBuf::from("output"),
            database: None,
        }
    }
}

impl ProjectConfig {
    /// Configuration with default features for the named project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            project: ProjectSection { name: name.into() },
            features: FeatureFlags::default(),
            export: ExportSection::default(),
        }
    }

    #[must_use]
    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Loads and validates `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: ProjectConfig =
            toml::from_str(text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.project.name.trim().is_empty() {
            return Err(ConfigError::Invalid("project.name must not be empty".into()));
        }
        if self.export.jobs == 0 {
            return Err(ConfigError::Invalid("export.jobs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.project.name
    }

    pub fn has_restricted_data(&self) -> bool {
        self.features.restricted_data
    }

    pub fn uses_anchor_form(&self) -> bool {
        self.features.anchor_form
    }

    pub fn uses_svar_doc(&self) -> bool {
        self.features.svar_doc
    }

    pub fn publishes_svars(&self) -> bool {
        self.features.publish_svars
    }

    pub fn publishes_user_trans_tables(&self) -> bool {
        self.features.publish_user_trans_tables
    }

    pub fn uses_sqlite(&self) -> bool {
        self.features.sqlite
    }
}

impl FromStr for ProjectConfig {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text, Path::new(PROJECT_CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: ProjectConfig = "[project]\nname = \"usa\"\n".parse().unwrap();
        assert_eq!(config.name(), "usa");
        assert!(config.uses_svar_doc());
        assert!(config.publishes_svars());
        assert!(!config.uses_anchor_form());
        assert!(!config.has_restricted_data());
        assert_eq!(config.export.jobs, 32);
    }

    #[test]
    fn feature_flags_override_defaults() {
        let text = r#"
[project]
name = "usa"

[features]
anchor_form = true
restricted_data = true
publish_svars = false

[export]
jobs = 4
database = "cache/metadata.db"
"#;
        let config: ProjectConfig = text.parse().unwrap();
        assert!(config.uses_anchor_form());
        assert!(config.has_restricted_data());
        assert!(!config.publishes_svars());
        assert_eq!(config.export.jobs, 4);
        assert_eq!(
            config.export.database.as_deref(),
            Some(Path::new("cache/metadata.db"))
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let text = "[project]\nname = \"usa\"\n[features]\nanchorform = true\n";
        assert!(matches!(
            text.parse::<ProjectConfig>(),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn zero_jobs_is_invalid() {
        let text = "[project]\nname = \"usa\"\n[export]\njobs = 0\n";
        assert!(matches!(
            text.parse::<ProjectConfig>(),
            Err(ConfigError::Invalid(_))
        ));
    }
}
