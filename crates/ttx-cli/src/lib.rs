//! CLI library components for the translation-table exporter.

pub mod logging;
pub mod pipeline;
pub mod types;
