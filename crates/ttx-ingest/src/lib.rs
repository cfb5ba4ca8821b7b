//! Project directory ingestion.
//!
//! Reads a project's configuration, sample and variable lists, and serves
//! its translation tables and data dictionaries through
//! [`ttx_model::MetadataSource`].
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use ttx_ingest::ProjectSource;
//! use ttx_model::MetadataSource;
//!
//! let project = ProjectSource::open(Path::new("projects/usa"))?;
//! let table = project.translation_table("AGE")?;
//! ```

mod catalog;
mod error;
mod project;

pub use catalog::{load_sample_catalog, load_variable_list};
pub use error::{IngestError, Result};
pub use project::ProjectSource;
