//! File lifecycle: lazy load, defaults on failure, and the atomic
//! rename-on-write sequence with its recovery rule.

mod common;

use std::fs;

use common::{open_database, TEST_DB};
use configdb::Database;
use pretty_assertions::assert_eq;

fn simple_int(db: &Database) -> i64 {
    db.open_store(0)
        .unwrap()
        .root()
        .find_property("simpleInt")
        .unwrap()
        .value_i64()
        .unwrap()
}

fn write_simple_int(db: &Database, value: &str) {
    let updater = db.open_store_for_update(0).unwrap();
    assert!(updater
        .root()
        .find_property("simpleInt")
        .unwrap()
        .set_from_text(Some(value)));
}

#[test]
fn missing_file_loads_defaults() {
    let (_dir, db) = open_database();
    assert_eq!(simple_int(&db), -1);
}

#[test]
fn commit_writes_one_file_per_store() {
    let (dir, db) = open_database();
    write_simple_int(&db, "12");

    assert!(dir.path().join("_root.json").exists());
    assert!(!dir.path().join("colors.json").exists());

    {
        let updater = db.open_store_for_update(1).unwrap();
        let union = updater.root().find_object("color1").unwrap();
        union.select_variant("hsv").unwrap();
    }
    assert!(dir.path().join("colors.json").exists());
}

#[test]
fn clean_updater_does_not_touch_disk() {
    let (dir, db) = open_database();
    {
        let _updater = db.open_store_for_update(0).unwrap();
        // No mutation: nothing to persist.
    }
    assert!(!dir.path().join("_root.json").exists());
}

#[test]
fn corrupt_file_falls_back_to_defaults() {
    let (dir, db) = open_database();
    fs::write(dir.path().join("_root.json"), "{ not json !").unwrap();

    assert_eq!(simple_int(&db), -1);
}

#[test]
fn replacement_leaves_no_torn_file() {
    let (dir, db) = open_database();
    let path = dir.path().join("_root.json");

    write_simple_int(&db, "21");
    let first = fs::read_to_string(&path).unwrap();
    write_simple_int(&db, "22");
    let second = fs::read_to_string(&path).unwrap();

    // The previous content survives as `.old`; the primary is the new
    // serialization, never a mix.
    assert_ne!(first, second);
    assert_eq!(fs::read_to_string(dir.path().join("_root.json.old")).unwrap(), first);
    serde_json::from_str::<serde_json::Value>(&second).expect("intact primary");
    assert!(!dir.path().join("_root.json.new").exists());
}

#[test]
fn interrupted_rename_prefers_the_primary() {
    let (dir, db) = open_database();

    // Crash window where `.new` exists alongside the primary.
    write_simple_int(&db, "31");
    fs::write(dir.path().join("_root.json.new"), "{ half written").unwrap();

    let fresh = Database::new(dir.path(), &TEST_DB);
    assert_eq!(simple_int(&fresh), 31);
}

#[test]
fn orphaned_old_file_is_adopted() {
    let (dir, db) = open_database();
    let path = dir.path().join("_root.json");

    // Crash window after the primary moved to `.old` but before `.new`
    // took its place.
    write_simple_int(&db, "41");
    fs::rename(&path, dir.path().join("_root.json.old")).unwrap();

    let fresh = Database::new(dir.path(), &TEST_DB);
    assert_eq!(simple_int(&fresh), 41);
}

#[test]
fn database_export_and_import_files() {
    let (dir, db) = open_database();
    write_simple_int(&db, "51");

    let snapshot = dir.path().join("snapshot.json");
    db.export_to_file(&snapshot, &Default::default()).unwrap();

    {
        db.open_store_for_update(0).unwrap().clear();
    }
    assert_eq!(simple_int(&db), -1);

    db.import_from_file(&snapshot).unwrap();
    assert_eq!(simple_int(&db), 51);
}

#[test]
fn missing_import_file_is_a_file_error() {
    let (dir, db) = open_database();
    let result = db.import_from_file(dir.path().join("nope.json"));
    assert!(matches!(result, Err(configdb::Error::File(_))));
}
