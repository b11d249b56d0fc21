use autosort_core::{ColorLabel, CoreError, DateField, FileDescriptor, OrganizeConfig};
use std::fs;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

#[test]
fn test_descriptor_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("notes.txt");
    fs::write(&path, b"hello world").unwrap();

    let file = FileDescriptor::from_path(&path).unwrap();
    assert_eq!(file.path, path);
    assert_eq!(file.name, "notes.txt");
    assert_eq!(file.extension.as_deref(), Some("txt"));
    assert_eq!(file.size, 11);
    assert_eq!(file.parent, temp_dir.path());
    assert!(!file.is_dir);
    assert!(!file.read_only);
    assert_eq!(file.color, ColorLabel::None);

    let age = SystemTime::now()
        .duration_since(file.timestamps.modified)
        .unwrap_or_default();
    assert!(age < Duration::from_secs(60));
}

#[test]
fn test_descriptor_for_directory() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("photos");
    fs::create_dir(&dir).unwrap();

    let file = FileDescriptor::from_path(&dir).unwrap();
    assert!(file.is_dir);
    assert_eq!(file.size, 0);
}

#[test]
fn test_descriptor_missing_path() {
    let temp_dir = TempDir::new().unwrap();
    let err = FileDescriptor::from_path(temp_dir.path().join("missing.bin")).unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[test]
fn test_descriptor_read_only_flag() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("locked.txt");
    fs::write(&path, b"x").unwrap();

    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&path, perms.clone()).unwrap();

    let file = FileDescriptor::from_path(&path).unwrap();
    assert!(file.read_only);

    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(&path, perms).unwrap();
}

#[test]
fn test_date_field_display() {
    assert_eq!(DateField::Created.to_string(), "created");
    assert_eq!(DateField::default(), DateField::Modified);
}

#[test]
fn test_config_with_dry_run_keeps_patterns() {
    let config = OrganizeConfig::builder()
        .ignore_patterns(vec!["*.tmp".to_string()])
        .build()
        .unwrap();
    let preview = config.with_dry_run(true);

    assert!(preview.dry_run);
    assert!(preview.should_ignore("download.tmp"));
    assert!(config.validate().is_ok());
}
