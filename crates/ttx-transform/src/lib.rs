//! Translation-table transform engine.
//!
//! This crate turns normalized source metadata into export records:
//!
//! - **engine**: integrated and source-variable record builders
//! - **universe**: universe statements and the sample-range grammar
//! - **codes**: output code catalogs, label indentation, cell conventions
//! - **columns**: column location parsing

pub mod codes;
pub mod columns;
pub mod engine;
pub mod universe;

pub use codes::{
    LABEL_ONLY_MARKER, SUPPRESS_MARKER, blank_to_zero, calculate_indent, is_valid_value,
};
pub use columns::{parse_column_ranges, source_column_range};
pub use engine::TransformEngine;
pub use universe::explode_universe_string;
