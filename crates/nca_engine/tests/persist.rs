use std::fs;

use nca_engine::{ensure_dir, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_cache_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("cache").join("titles");
    assert!(!new_dir.exists());
    ensure_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn ensure_dir_refuses_a_plain_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("finder.cache");
    fs::write(&file_path, "x").unwrap();
    match ensure_dir(&file_path) {
        Err(PersistError::NotADirectory { path }) => assert_eq!(path, file_path),
        other => panic!("expected NotADirectory, got {other:?}"),
    }
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path());

    let first = writer.write(".manifest", b"{}").unwrap();
    assert_eq!(first.file_name().unwrap(), ".manifest");
    assert_eq!(fs::read_to_string(&first).unwrap(), "{}");

    let second = writer.write(".manifest", b"{\"files\":[]}").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "{\"files\":[]}");

    // Only the target remains; no temp files are left behind.
    let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn writer_for_a_file_uses_its_parent_directory() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("batches").join("batch-abc.json");

    let written = AtomicFileWriter::for_file(&target)
        .write("batch-abc.json", b"[]")
        .unwrap();
    assert_eq!(written, target);
    assert_eq!(fs::read(&target).unwrap(), b"[]");
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let err = writer.write("page-1.json", b"data").unwrap_err();
    assert!(err.to_string().contains("not_a_dir"), "{err}");
    assert!(!file_path.with_file_name("page-1.json").exists());
}
