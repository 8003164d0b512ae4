use std::fs;

use picker_engine::{ensure_output_dir, AtomicFileWriter, ConflictAction, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("downloads");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn existing_names_are_uniquified() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("photo.jpg", b"one").unwrap();
    let second = writer.write("photo.jpg", b"two").unwrap();
    let third = writer.write("photo.jpg", b"three").unwrap();

    assert_eq!(first.file_name().unwrap(), "photo.jpg");
    assert_eq!(second.file_name().unwrap(), "photo (1).jpg");
    assert_eq!(third.file_name().unwrap(), "photo (2).jpg");
    assert_eq!(fs::read(&first).unwrap(), b"one");
    assert_eq!(fs::read(&third).unwrap(), b"three");
}

#[test]
fn overwrite_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer =
        AtomicFileWriter::new(temp.path().to_path_buf()).with_conflict_action(ConflictAction::Overwrite);

    let first = writer.write("clip.mp4", b"old").unwrap();
    let second = writer.write("clip.mp4", b"new").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"new");
}

#[test]
fn path_separators_are_rejected() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());
    let err = writer.write("../escape.jpg", b"x").unwrap_err();
    assert!(matches!(err, PersistError::InvalidName(_)));
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("photo.jpg", b"data").is_err());
    assert!(!file_path.with_file_name("photo.jpg").exists());
}
