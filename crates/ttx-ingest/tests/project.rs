//! Tests for reading a project directory.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use ttx_ingest::{IngestError, ProjectSource};
use ttx_model::{MetadataSource, SourceError};

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "project.toml",
        "[project]\nname = \"usa\"\n\n[export]\noutput_root = \"out\"\n",
    );
    write(
        root,
        "metadata/samples.csv",
        "sample,description\nus2000a,2000 5%\nus2001a,2001 ACS\n",
    );
    write(
        root,
        "metadata/variables.csv",
        "variable,display_variable\nAGE,\nRELATE,RELATED\n",
    );
    write(
        root,
        "metadata/translation_tables/AGE_tt.json",
        r#"{"variable": "AGE", "label": "Age", "samples": [{"sample": "us2000a", "columns": "10=12"}]}"#,
    );
    write(
        root,
        "metadata/translation_tables/related_tt.json",
        r#"{"label": "Relationship"}"#,
    );
    write(
        root,
        "metadata/data_dictionaries/us2000a_dd.json",
        r#"{"sample": "us2000a", "svars": [
            {"name": "US2000A_1000", "label": "Record type", "start": 1, "width": 1},
            {"name": "RECTYPE_H", "label": "Household record", "start": 2, "width": 1}
        ]}"#,
    );
    dir
}

#[test]
fn opens_project_and_resolves_paths() {
    let dir = project();
    let source = ProjectSource::open(dir.path()).unwrap();
    assert_eq!(source.config().name(), "usa");
    assert_eq!(source.output_root(), dir.path().join("out"));
    assert_eq!(source.database_path(), dir.path().join("out/metadata.db"));
    assert_eq!(source.known_samples().unwrap().len(), 2);

    let variables = source.variables().unwrap();
    assert_eq!(variables.len(), 2);
    assert_eq!(variables[1].table_name(), "RELATED");
}

#[test]
fn reads_tables_and_dictionaries_on_demand() {
    let dir = project();
    let source = ProjectSource::open(dir.path()).unwrap();

    let table = source.translation_table("age").unwrap();
    assert_eq!(table.label, "Age");
    assert_eq!(table.samples[0].columns, "10=12");

    let related = source.translation_table("RELATED").unwrap();
    assert_eq!(related.variable, "RELATED");

    let dictionary = source.data_dictionary("US2000A").unwrap();
    assert_eq!(dictionary.svars.len(), 2);
    assert_eq!(source.samples().unwrap(), ["us2000a"]);
    assert!(source.translation_table_modified("AGE").is_ok());
    assert!(source.data_dictionary_modified("us2000a").is_ok());
}

#[test]
fn missing_artifacts_are_not_found() {
    let dir = project();
    let source = ProjectSource::open(dir.path()).unwrap();
    assert!(matches!(
        source.translation_table("SEX"),
        Err(SourceError::NotFound { .. })
    ));
    assert!(matches!(
        source.data_dictionary("us2001a"),
        Err(SourceError::NotFound { .. })
    ));
}

#[test]
fn svar_sample_uses_prefix_then_scans() {
    let dir = project();
    let source = ProjectSource::open(dir.path()).unwrap();
    assert_eq!(source.svar_sample("US2000A_1000").unwrap(), "us2000a");
    assert_eq!(source.svar_sample("rectype_h").unwrap(), "us2000a");
    assert!(matches!(
        source.svar_sample("US2001A_1000"),
        Err(SourceError::NotFound { .. })
    ));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let dir = project();
    write(dir.path(), "metadata/translation_tables/SEX_tt.json", "{not json");
    let source = ProjectSource::open(dir.path()).unwrap();
    assert!(matches!(
        source.translation_table("SEX"),
        Err(SourceError::Parse { .. })
    ));
}

#[test]
fn missing_project_directory_is_reported() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        ProjectSource::open(&dir.path().join("nope")),
        Err(IngestError::DirectoryNotFound { .. })
    ));
    assert!(matches!(
        ProjectSource::open(dir.path()),
        Err(IngestError::Config(_))
    ));
}
