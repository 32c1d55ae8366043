//! Store sharing, copy-on-write isolation, update conflicts, queued updates
//! and idle cache eviction.

mod common;

use std::cell::Cell;
use std::fs;
use std::rc::Rc;

use common::open_database;
use configdb::{Database, StoreRef};
use pretty_assertions::assert_eq;

fn read_prop(store: &StoreRef, name: &str) -> Option<String> {
    store.root().find_property(name)?.value_text()
}

fn set_prop(db: &Database, name: &str, value: &str) {
    let updater = db.open_store_for_update(0).expect("lock store");
    assert!(updater
        .root()
        .find_property(name)
        .expect("property")
        .set_from_text(Some(value)));
}

#[test]
fn defaults_until_written() {
    let (_dir, db) = open_database();
    let store = db.open_store(0).unwrap();
    assert_eq!(read_prop(&store, "simpleBool").as_deref(), Some("false"));
    assert_eq!(read_prop(&store, "simpleInt").as_deref(), Some("-1"));
    assert_eq!(read_prop(&store, "simpleString").as_deref(), Some("donkey"));
    assert_eq!(read_prop(&store, "simpleFloat").as_deref(), Some("3.1415927"));
    assert_eq!(read_prop(&store, "color").as_deref(), Some("green"));
}

#[test]
fn range_clamp_on_set() {
    let (_dir, db) = open_database();
    let updater = db.open_store_for_update(0).unwrap();
    let root = updater.root();
    let prop = root.find_property("simpleInt").unwrap();

    assert!(prop.set_from_text(Some("101")));
    assert_eq!(prop.value_text().as_deref(), Some("100"));
    assert!(prop.set_from_text(Some("-6")));
    assert_eq!(prop.value_text().as_deref(), Some("-5"));
    assert_eq!(prop.value_i64(), Some(-5));
}

#[test]
fn alias_redirects_to_sibling() {
    let (_dir, db) = open_database();
    let updater = db.open_store_for_update(0).unwrap();
    let root = updater.root();
    assert!(root
        .find_property("simpleInteger")
        .unwrap()
        .set_from_text(Some("42")));
    assert_eq!(root.find_property("simpleInt").unwrap().value_i64(), Some(42));
}

#[test]
fn unknown_enum_value_leaves_state_untouched() {
    let (_dir, db) = open_database();
    let updater = db.open_store_for_update(0).unwrap();
    let prop = updater.root().find_property("color").unwrap();
    assert!(prop.set_from_text(Some("blue")));
    assert!(!prop.set_from_text(Some("mauve")));
    assert_eq!(prop.value_text().as_deref(), Some("blue"));
}

#[test]
fn writes_require_an_updater() {
    let (_dir, db) = open_database();
    let store = db.open_store(0).unwrap();
    assert!(!store
        .root()
        .find_property("simpleBool")
        .unwrap()
        .set_from_text(Some("true")));
    assert_eq!(read_prop(&store, "simpleBool").as_deref(), Some("false"));
}

#[test]
fn snapshot_isolation_across_commit() {
    let (_dir, db) = open_database();

    // A reader opened before the commit keeps its snapshot.
    let reader = db.open_store(0).unwrap();
    assert_eq!(read_prop(&reader, "simpleInt").as_deref(), Some("-1"));

    set_prop(&db, "simpleInt", "7");

    assert_eq!(read_prop(&reader, "simpleInt").as_deref(), Some("-1"));
    let fresh = db.open_store(0).unwrap();
    assert_eq!(read_prop(&fresh, "simpleInt").as_deref(), Some("7"));
}

#[test]
fn second_writer_conflicts() {
    let (_dir, db) = open_database();

    let mut holder = db.open_store(0).unwrap();
    let _active = holder.update().unwrap();

    // Any other open-for-update fails immediately.
    let conflict = db.open_store_for_update(0);
    assert!(matches!(conflict, Err(configdb::Error::UpdateConflict)));

    let mut other = db.open_store(0).unwrap();
    assert!(other.update().is_err());
}

#[test]
fn nested_updaters_share_the_store() {
    let (_dir, db) = open_database();
    let mut store = db.open_store(0).unwrap();
    let first = store.update().unwrap();
    let second = store.update().unwrap();
    let third = second.clone();
    assert!(first.root().find_property("simpleBool").unwrap().set_from_text(Some("true")));
    assert_eq!(third.root().find_property("simpleBool").unwrap().value_text().as_deref(), Some("true"));
}

#[test]
fn queued_update_runs_after_release() {
    let (_dir, db) = open_database();

    let ran = Rc::new(Cell::new(false));
    {
        let mut holder = db.open_store(0).unwrap();
        let active = holder.update().unwrap();
        assert!(active.root().find_property("simpleInt").unwrap().set_from_text(Some("9")));

        // Registered while the writer is live; must not run inline.
        let ran_inner = ran.clone();
        db.queue_update(0, move |updater| {
            let prop = updater.root().find_property("simpleInt").unwrap();
            assert_eq!(prop.value_text().as_deref(), Some("9"));
            assert!(prop.set_from_text(Some("10")));
            ran_inner.set(true);
        });
        assert_eq!(db.pending_updates(), 1);
        assert!(!ran.get());
    }

    assert!(!ran.get());
    assert!(db.poll());
    assert!(ran.get());
    assert_eq!(db.pending_updates(), 0);

    let fresh = db.open_store(0).unwrap();
    assert_eq!(read_prop(&fresh, "simpleInt").as_deref(), Some("10"));
}

#[test]
fn queued_updates_are_fifo() {
    let (_dir, db) = open_database();

    let order = Rc::new(std::cell::RefCell::new(Vec::new()));
    {
        let mut holder = db.open_store(0).unwrap();
        let _active = holder.update().unwrap();
        for tag in ["first", "second"] {
            let order = order.clone();
            db.queue_update(0, move |_updater| order.borrow_mut().push(tag));
        }
    }
    db.poll();
    // The first callback's release schedules the second.
    db.poll();
    assert_eq!(*order.borrow(), vec!["first", "second"]);
}

#[test]
fn commit_is_visible_to_fresh_readers() {
    let (dir, db) = open_database();

    set_prop(&db, "simpleString", "banana");

    // The commit wrote a file; a brand-new database over the same directory
    // loads the committed contents.
    let other = Database::new(dir.path(), &common::TEST_DB);
    let store = other.open_store(0).unwrap();
    assert_eq!(read_prop(&store, "simpleString").as_deref(), Some("banana"));
}

#[test]
fn idle_caches_are_evicted_on_poll() {
    let (dir, db) = open_database();

    set_prop(&db, "simpleInt", "33");
    {
        let store = db.open_store(0).unwrap();
        assert_eq!(read_prop(&store, "simpleInt").as_deref(), Some("33"));
    }
    // The last reference is gone; the sweep runs on the next turn.
    assert!(db.poll());

    // Rewrite the file behind the database's back: only a re-load can see
    // this, so observing it proves the cache slot was dropped.
    let path = dir.path().join("_root.json");
    let text = fs::read_to_string(&path).unwrap().replace("33", "44");
    fs::write(&path, text).unwrap();

    let store = db.open_store(0).unwrap();
    assert_eq!(read_prop(&store, "simpleInt").as_deref(), Some("44"));
}

#[test]
fn clear_restores_schema_defaults() {
    let (_dir, db) = open_database();

    {
        let updater = db.open_store_for_update(0).unwrap();
        let root = updater.root();
        root.find_property("simpleInt").unwrap().set_from_text(Some("55"));
        root.find_property("simpleString").unwrap().set_from_text(Some("zebra"));
        root.find_object("intArray").unwrap().add_item(Some("5"));
        updater.clear();

        assert_eq!(root.find_property("simpleInt").unwrap().value_text().as_deref(), Some("-1"));
        assert_eq!(root.find_property("simpleString").unwrap().value_text().as_deref(), Some("donkey"));
        assert_eq!(root.find_object("intArray").unwrap().item_count(), 0);
        assert!(updater.string_pool_is_empty());
    }
}

#[test]
fn string_interning_is_shared() {
    let (_dir, db) = open_database();
    let updater = db.open_store_for_update(0).unwrap();
    let array = updater.root().find_object("stringArray").unwrap();

    // Three equal items, one arena entry.
    for _ in 0..3 {
        assert!(array.add_item(Some("My String")));
    }
    assert_eq!(array.item_count(), 3);
    let texts: Vec<_> = array
        .iter_properties()
        .map(|item| item.value_text().unwrap())
        .collect();
    assert_eq!(texts, vec!["My String"; 3]);

    updater.with_string_pool(|pool| {
        assert_eq!(pool.as_bytes(), b"My String\0");
    });
}

#[test]
fn object_array_add_remove() {
    let (_dir, db) = open_database();
    let updater = db.open_store_for_update(0).unwrap();
    let array = updater.root().find_object("objectArray").unwrap();

    for (name, value) in [("a", "1"), ("b", "2"), ("c", "3")] {
        let item = array.add_object_item().unwrap();
        assert!(item.find_property("name").unwrap().set_from_text(Some(name)));
        assert!(item.find_property("value").unwrap().set_from_text(Some(value)));
    }
    assert!(array.remove_item(1));
    assert_eq!(array.item_count(), 2);

    let names: Vec<_> = array
        .iter_objects()
        .map(|item| item.find_property("name").unwrap().value_text().unwrap())
        .collect();
    assert_eq!(names, vec!["a", "c"]);
}

#[test]
fn union_variant_selection() {
    let (_dir, db) = open_database();
    let updater = db.open_store_for_update(1).unwrap();
    let union = updater.root().find_object("color1").unwrap();

    assert_eq!(union.tag(), Some(0));
    let rgb = union.get_object(0).unwrap();
    assert_eq!(rgb.name(), "rgb");
    assert!(rgb.find_property("blue").unwrap().set_from_text(Some("123")));

    let hsv = union.select_variant("hsv").unwrap();
    assert_eq!(union.tag(), Some(1));
    assert_eq!(hsv.find_property("hue").unwrap().value_text().as_deref(), Some("0"));
    assert!(hsv.find_property("saturation").unwrap().set_from_text(Some("24")));

    // Switching back re-initializes the variant storage.
    let rgb = union.select_variant("rgb").unwrap();
    assert_eq!(rgb.find_property("blue").unwrap().value_text().as_deref(), Some("0"));
}
