//! Round-trip tests for the storage layer against a temporary data
//! directory.

use std::fs;

use rx_registry::models::SerialNumber;
use rx_registry::storage::{ArchiveWriter, AuditEntry, AuditLog, BackupManager, Checkpoint};
use rx_registry::{DatasetStore, PharmacistRecord};

fn record(serial: u64, reg: &str, name: &str) -> PharmacistRecord {
    PharmacistRecord::new(
        Some(SerialNumber::Number(serial)),
        reg,
        name,
        "Father",
        "BPharm",
    )
    .unwrap()
}

#[test]
fn dataset_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::with_dir(dir.path(), "rx.json").unwrap();
    assert!(!store.exists());

    let records = vec![
        record(1, "TS000001", "Ravi Kumar"),
        record(2, "TS000002", "Latha Devi"),
    ];
    let path = store.save(&records).unwrap();
    assert!(path.exists());

    let loaded = store.load().unwrap();
    assert_eq!(loaded, records);

    // The file is a pretty-printed array with a trailing newline.
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with('['));
    assert!(text.ends_with('\n'));
}

#[test]
fn dataset_load_skips_unusable_entries_and_normalizes_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::with_dir(dir.path(), "rx.json").unwrap();

    fs::write(
        store.dataset_path(),
        r#"[
            {"serial_number": 1, "registration_number": "ts000001",
             "name": "ravi kumar", "father_name": "KRISHNA", "category": "B.PHARM"},
            {"serial_number": 2, "registration_number": "??",
             "name": "Broken", "father_name": "", "category": "BPharm"},
            "not-a-record"
        ]"#,
    )
    .unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].registration_number, "TS000001");
    assert_eq!(loaded[0].name, "Ravi Kumar");
    assert_eq!(loaded[0].category, "BPharm");
}

#[test]
fn missing_dataset_is_an_error_unless_opted_out() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::with_dir(dir.path(), "rx.json").unwrap();
    assert!(store.load().is_err());
    assert!(store.load_or_empty().unwrap().is_empty());
}

#[test]
fn backups_are_created_verified_and_detect_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::with_dir(dir.path(), "rx.json").unwrap();
    store.save(&[record(1, "TS000001", "Ravi Kumar")]).unwrap();

    let backups = BackupManager::new(dir.path()).unwrap();
    let backup = backups.create(&store.dataset_path()).unwrap();
    assert!(backup.exists());
    backups.verify(&backup).unwrap();

    fs::write(&backup, "tampered").unwrap();
    assert!(backups.verify(&backup).is_err());
}

#[test]
fn backup_cleanup_removes_only_expired_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::with_dir(dir.path(), "rx.json").unwrap();
    store.save(&[record(1, "TS000001", "Ravi Kumar")]).unwrap();

    let backups = BackupManager::new(dir.path()).unwrap();
    let fresh = backups.create(&store.dataset_path()).unwrap();

    let stale = backups.backup_dir().join("rx_backup_20200101_000000.json");
    fs::write(&stale, "[]").unwrap();
    fs::write(
        backups.backup_dir().join("rx_backup_20200101_000000.json.sha256"),
        "0000  rx_backup_20200101_000000.json\n",
    )
    .unwrap();

    let removed = backups.cleanup(30).unwrap();
    assert_eq!(removed, 1);
    assert!(!stale.exists());
    assert!(fresh.exists());
}

#[test]
fn audit_log_appends_json_lines_with_capped_samples() {
    let dir = tempfile::tempdir().unwrap();
    let log = AuditLog::new(dir.path().join("sync_audit.log"));

    let many: Vec<String> = (0..8).map(|i| format!("TS00000{i}")).collect();
    let entry = AuditEntry::new(&dir.path().join("rx.json"), &many, &[]);
    assert_eq!(entry.new_count, 8);
    assert_eq!(entry.new_registrations.len(), 5);

    log.append(&entry).unwrap();
    log.append(&entry).unwrap();

    let text = fs::read_to_string(log.path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        let parsed: AuditEntry = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.new_count, 8);
    }
}

#[test]
fn archive_writer_snapshots_the_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let archives = ArchiveWriter::new(dir.path());
    let path = archives
        .write_snapshot(&[record(1, "TS000001", "Ravi Kumar")])
        .unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("rx_snapshot_"));
    assert!(name.ends_with(".json"));

    let parsed: Vec<PharmacistRecord> =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed.len(), 1);
}

#[test]
fn checkpoint_resumes_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scraping_progress.json");

    let mut checkpoint = Checkpoint::load(&path).unwrap();
    assert!(checkpoint.completed.is_empty());

    checkpoint.record_completed("TS000001");
    checkpoint.record_failed("TS000002");
    checkpoint.last_index = 2;
    checkpoint.save().unwrap();

    let reloaded = Checkpoint::load(&path).unwrap();
    assert_eq!(reloaded.completed, vec!["TS000001"]);
    assert_eq!(reloaded.failed, vec!["TS000002"]);
    assert_eq!(reloaded.last_index, 2);
    assert!(reloaded.timestamp.is_some());
    assert!(reloaded.seen("TS000001"));
    assert!(reloaded.seen("TS000002"));
    assert!(!reloaded.seen("TS000003"));
}
