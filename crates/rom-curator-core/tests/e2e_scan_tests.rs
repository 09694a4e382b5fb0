use std::fs;
use std::path::Path;
use tempfile::tempdir;

use rom_curator_core::catalog::{CatalogEntry, CatalogFlags};
use rom_curator_core::storage::{Database, RomKey};
use rom_curator_core::{
    find_missing, AppConfig, Crc32, RomStatus, ScanEngine, ScanSummary, SilentReporter,
};

const FOO_DATA: &[u8] = b"foo rom payload";
const BAR_DATA: &[u8] = b"bar rom payload!";

/// A catalog with Foo (matching FOO_DATA) and Bar (matching BAR_DATA).
fn setup_catalog() -> (Database, i64) {
    let db = Database::open_in_memory().unwrap();
    let system_id = db.add_system("Test System", "test.dat").unwrap();
    for (name, data) in [("Foo", FOO_DATA), ("Bar", BAR_DATA)] {
        db.add_game(
            system_id,
            &CatalogEntry {
                id: 0,
                system_id,
                name: name.to_string(),
                rom_name: format!("{}.bin", name),
                major_name: name.to_string(),
                region: None,
                languages: None,
                size: data.len() as u64,
                crc32: Crc32::of(data),
                flags: CatalogFlags::default(),
                verified_dump: true,
            },
        )
        .unwrap();
    }
    (db, system_id)
}

fn write(dir: &Path, name: &str, data: &[u8]) {
    fs::write(dir.join(name), data).unwrap();
}

fn statuses(outcomes: &[rom_curator_core::ScanOutcome]) -> Vec<(String, RomStatus)> {
    outcomes
        .iter()
        .map(|o| {
            (
                o.path.file_name().unwrap().to_string_lossy().into_owned(),
                o.status,
            )
        })
        .collect()
}

#[test]
fn test_identical_copies_first_enumerated_wins() {
    let (db, system_id) = setup_catalog();
    let folder = tempdir().unwrap();
    write(folder.path(), "Foo.bin", FOO_DATA);
    write(folder.path(), "Bar.bin", FOO_DATA);

    let engine = ScanEngine::new(AppConfig::default()).unwrap();
    let outcomes = engine
        .scan(&db, folder.path(), system_id, &SilentReporter)
        .unwrap();

    // "Bar.bin" sorts first, so it claims Foo's entry under the wrong name.
    assert_eq!(
        statuses(&outcomes),
        vec![
            ("Bar.bin".to_string(), RomStatus::WrongFilename),
            ("Foo.bin".to_string(), RomStatus::Duplicate),
        ]
    );
    for outcome in &outcomes {
        assert_eq!(outcome.matched.as_ref().unwrap().name, "Foo");
    }
}

#[test]
fn test_renamed_file_is_wrong_filename() {
    let (db, system_id) = setup_catalog();
    let folder = tempdir().unwrap();
    write(folder.path(), "Wrong.bin", FOO_DATA);

    let engine = ScanEngine::new(AppConfig::default()).unwrap();
    let outcomes = engine
        .scan(&db, folder.path(), system_id, &SilentReporter)
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, RomStatus::WrongFilename);
    assert_eq!(outcomes[0].matched.as_ref().unwrap().name, "Foo");
}

#[test]
fn test_match_presence_follows_status() {
    let (db, system_id) = setup_catalog();
    let folder = tempdir().unwrap();
    write(folder.path(), "Foo.bin", FOO_DATA);
    write(folder.path(), "copy.bin", FOO_DATA);
    write(folder.path(), "renamed.bin", BAR_DATA);
    write(folder.path(), "junk.bin", b"nothing like it");

    let engine = ScanEngine::new(AppConfig::default()).unwrap();
    let outcomes = engine
        .scan(&db, folder.path(), system_id, &SilentReporter)
        .unwrap();

    assert_eq!(outcomes.len(), 4);
    for outcome in &outcomes {
        assert_eq!(outcome.matched.is_some(), outcome.status.has_catalog_match());
    }
}

#[test]
fn test_empty_folder_reports_every_entry_missing() {
    let (db, system_id) = setup_catalog();
    let folder = tempdir().unwrap();

    let engine = ScanEngine::new(AppConfig::default()).unwrap();
    let outcomes = engine
        .scan(&db, folder.path(), system_id, &SilentReporter)
        .unwrap();
    assert!(outcomes.is_empty());

    let missing = find_missing(&db, system_id, &outcomes).unwrap();
    let names: Vec<&str> = missing.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Foo", "Bar"]);
}

#[test]
fn test_scan_store_and_summarise() {
    let (db, system_id) = setup_catalog();
    let folder = tempdir().unwrap();
    write(folder.path(), "Foo.bin", FOO_DATA);
    write(folder.path(), "copy.bin", FOO_DATA);
    write(folder.path(), "mystery.bin", b"unknown bytes");
    // Consumer-managed folders are not scanned.
    fs::create_dir(folder.path().join("extra")).unwrap();
    write(&folder.path().join("extra"), "Bar.bin", BAR_DATA);

    let engine = ScanEngine::new(AppConfig {
        recursive: true,
        ..AppConfig::default()
    })
    .unwrap();
    let outcomes = engine
        .scan(&db, folder.path(), system_id, &SilentReporter)
        .unwrap();
    let missing = find_missing(&db, system_id, &outcomes).unwrap();

    db.store_scan_results(system_id, &outcomes).unwrap();
    db.record_missing(system_id, &missing).unwrap();

    let stored = db.get_scan_summary(system_id).unwrap();
    let mut expected = ScanSummary::from_outcomes(&outcomes);
    expected.add(RomStatus::Missing, missing.len());
    assert_eq!(stored, expected);
    assert_eq!(stored.correct, 1);
    assert_eq!(stored.duplicate, 1);
    assert_eq!(stored.not_recognized, 1);
    assert_eq!(stored.missing, 1);
}

#[test]
fn test_rescan_keeps_ignored_missing_entry() {
    let (db, system_id) = setup_catalog();
    let folder = tempdir().unwrap();
    write(folder.path(), "Foo.bin", FOO_DATA);
    let engine = ScanEngine::new(AppConfig::default()).unwrap();

    let outcomes = engine
        .scan(&db, folder.path(), system_id, &SilentReporter)
        .unwrap();
    let missing = find_missing(&db, system_id, &outcomes).unwrap();
    db.store_scan_results(system_id, &outcomes).unwrap();
    db.record_missing(system_id, &missing).unwrap();

    let bar_crc = Crc32::of(BAR_DATA);
    db.mark_ignored(system_id, &RomKey::Crc(bar_crc)).unwrap();

    // Bar shows up on disk; the rescan must not resurrect it.
    write(folder.path(), "Bar.bin", BAR_DATA);
    let outcomes = engine
        .scan(&db, folder.path(), system_id, &SilentReporter)
        .unwrap();
    assert!(outcomes.iter().any(|o| o.status == RomStatus::Correct && o.crc32 == Some(bar_crc)));
    db.store_scan_results(system_id, &outcomes).unwrap();
    let missing = find_missing(&db, system_id, &outcomes).unwrap();
    db.record_missing(system_id, &missing).unwrap();

    let summary = db.get_scan_summary(system_id).unwrap();
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.ignored, 1);
    assert_eq!(summary.missing, 0);

    db.unignore(system_id, &RomKey::Crc(bar_crc)).unwrap();
    let bar = db.get_rom_by_crc32(system_id, bar_crc).unwrap().unwrap();
    assert_eq!(bar.status, RomStatus::Missing);
}

#[test]
fn test_unreadable_root_fails_without_outcomes() {
    let (db, system_id) = setup_catalog();
    let folder = tempdir().unwrap();
    let engine = ScanEngine::new(AppConfig::default()).unwrap();

    let result = engine.scan(&db, &folder.path().join("absent"), system_id, &SilentReporter);
    assert!(matches!(result, Err(rom_curator_core::Error::ScanFailed { .. })));
    assert!(db.get_all_scanned_roms(system_id).unwrap().is_empty());
}

#[test]
fn test_fingerprint_is_stable_across_scans() {
    let (db, system_id) = setup_catalog();
    let folder = tempdir().unwrap();
    write(folder.path(), "big.bin", &vec![0x5Au8; 300_000]);

    let small_chunks = ScanEngine::new(AppConfig {
        chunk_size: 4096,
        ..AppConfig::default()
    })
    .unwrap();
    let default_chunks = ScanEngine::new(AppConfig::default()).unwrap();

    let a = small_chunks
        .scan(&db, folder.path(), system_id, &SilentReporter)
        .unwrap();
    let b = default_chunks
        .scan(&db, folder.path(), system_id, &SilentReporter)
        .unwrap();
    assert_eq!(a[0].crc32, b[0].crc32);
    assert_eq!(a[0].size, 300_000);
    assert_eq!(a[0].crc32, Some(Crc32::of(&vec![0x5Au8; 300_000])));
}
