use std::fs;

use mptools_engine::{ensure_state_dir, read_optional, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let state = temp.path().join("nested").join("state");
    assert!(!state.exists());
    ensure_state_dir(&state).unwrap();
    assert!(state.is_dir());
}

#[test]
fn state_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();
    assert!(matches!(
        ensure_state_dir(&file_path),
        Err(PersistError::StateDir(_))
    ));
}

#[test]
fn atomic_write_replaces_previous_content() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("class.json", r#"{"url":"https://a.example"}"#).unwrap();
    assert_eq!(first.file_name().unwrap(), "class.json");

    let second = writer.write("class.json", r#"{"url":"https://b.example"}"#).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        read_optional(temp.path(), "class.json").unwrap().as_deref(),
        Some(r#"{"url":"https://b.example"}"#)
    );
}

#[test]
fn failed_write_leaves_nothing_behind() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("class.json", "{}").is_err());
    assert!(!file_path.with_file_name("class.json").exists());
}

#[test]
fn missing_file_reads_as_none() {
    let temp = TempDir::new().unwrap();
    assert_eq!(read_optional(temp.path(), "absent.ron").unwrap(), None);
}
