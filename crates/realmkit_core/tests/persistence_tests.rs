//! File-backed realms: recovery, torn tails, corruption and compaction.

use realmkit_core::{
    CoreError, ErrorKind, Fields, PrimaryKey, RealmConfig, RealmRegistry, SequenceNumber, Value,
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

fn named(name: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("name".into(), Value::from(name));
    fields
}

fn populate(path: &Path) {
    let registry = RealmRegistry::new();
    let realm = registry.open("w", RealmConfig::persisted(path)).unwrap();
    realm
        .create_object("Person", Some("a".into()), named("Ada"))
        .unwrap();
    realm
        .create_object("Person", Some("b".into()), named("Bob"))
        .unwrap();
    realm.create_object("Dog", None, named("Rex")).unwrap();
}

#[test]
fn reopen_restores_committed_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.realm");
    populate(&path);

    let registry = RealmRegistry::new();
    let realm = registry.open("r", RealmConfig::persisted(&path)).unwrap();
    let people = realm.all_objects("Person").unwrap();
    let names: Vec<&str> = people
        .iter()
        .filter_map(|p| p.get("name").as_str())
        .collect();
    assert_eq!(names, vec!["Ada", "Bob"]);
    assert_eq!(realm.count("Dog").unwrap(), 1);
    assert_eq!(realm.committed_sequence(), SequenceNumber::new(3));

    // New rows continue after the recovered ones.
    let next = realm.create_object("Dog", None, named("Fido")).unwrap();
    assert!(next.row_id() > people[1].row_id());
}

#[test]
fn cancelled_transactions_are_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cancel.realm");
    {
        let registry = RealmRegistry::new();
        let realm = registry.open("w", RealmConfig::persisted(&path)).unwrap();
        realm
            .create_object("Person", Some("kept".into()), Fields::new())
            .unwrap();
        let mut txn = realm.begin_write().unwrap();
        txn.create_object("Person", Some("dropped".into()), Fields::new())
            .unwrap();
        txn.cancel();
    }

    let registry = RealmRegistry::new();
    let realm = registry.open("r", RealmConfig::persisted(&path)).unwrap();
    assert!(realm.find("Person", &"kept".into()).unwrap().is_some());
    assert!(realm.find("Person", &"dropped".into()).unwrap().is_none());
}

#[test]
fn torn_final_record_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("torn.realm");
    populate(&path);
    let intact = std::fs::metadata(&path).unwrap().len();

    // Half-written frame header: magic plus a fragment.
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"RKLG\x01\x00\x01").unwrap();
    drop(file);

    let registry = RealmRegistry::new();
    let realm = registry.open("r", RealmConfig::persisted(&path)).unwrap();
    assert_eq!(realm.count("Person").unwrap(), 2);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), intact);

    realm.create_object("Person", None, Fields::new()).unwrap();
    drop(realm);
    registry.reset();

    let realm = registry.open("again", RealmConfig::persisted(&path)).unwrap();
    assert_eq!(realm.count("Person").unwrap(), 3);
}

#[test]
fn corrupted_record_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.realm");
    populate(&path);

    let mut bytes = std::fs::read(&path).unwrap();
    // Inside the first record's payload.
    bytes[13] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let registry = RealmRegistry::new();
    let err = registry
        .open("r", RealmConfig::persisted(&path))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corruption);
    assert!(registry.is_empty());
}

#[test]
fn damaged_length_field_fails_open_without_truncating() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("length.realm");
    populate(&path);
    let original = std::fs::read(&path).unwrap();

    // High byte of the first record's length field.
    let mut bytes = original.clone();
    bytes[10] = 0x7f;
    std::fs::write(&path, &bytes).unwrap();

    let registry = RealmRegistry::new();
    let err = registry
        .open("r", RealmConfig::persisted(&path))
        .unwrap_err();
    assert!(matches!(err, CoreError::Corruption { offset: 0, .. }));
    assert_eq!(std::fs::read(&path).unwrap(), bytes);
}

#[test]
fn mid_log_length_overrun_fails_open_without_truncating() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overrun.realm");
    populate(&path);

    let mut bytes = std::fs::read(&path).unwrap();
    let first_len = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]) as usize;
    let second = 11 + first_len + 4;
    // The second record now claims to run past the end of the file.
    let overrun = bytes.len() as u32;
    bytes[second + 7..second + 11].copy_from_slice(&overrun.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let registry = RealmRegistry::new();
    let err = registry
        .open("r", RealmConfig::persisted(&path))
        .unwrap_err();
    assert!(matches!(err, CoreError::Corruption { offset, .. } if offset == second as u64));
    assert_eq!(std::fs::metadata(&path).unwrap().len(), bytes.len() as u64);
}

#[test]
fn compaction_preserves_contents_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("compact.realm");
    {
        let registry = RealmRegistry::new();
        let realm = registry.open("w", RealmConfig::persisted(&path)).unwrap();
        for n in 0..20 {
            realm
                .create_object("Item", Some(n.into()), Fields::new())
                .unwrap();
        }
        for n in 0..10 {
            realm.delete_object("Item", &PrimaryKey::Int(n)).unwrap();
        }
        let before = realm.log_size().unwrap().unwrap();
        let expected = realm.all_objects("Item").unwrap();

        realm.compact().unwrap();
        assert!(realm.log_size().unwrap().unwrap() < before);
        assert_eq!(realm.all_objects("Item").unwrap(), expected);
    }

    let registry = RealmRegistry::new();
    let realm = registry.open("r", RealmConfig::persisted(&path)).unwrap();
    let keys: Vec<i64> = realm
        .all_objects("Item")
        .unwrap()
        .iter()
        .filter_map(|r| r.get("uuid").as_int())
        .collect();
    assert_eq!(keys, (10..20).collect::<Vec<_>>());
    assert_eq!(realm.committed_sequence(), SequenceNumber::new(30));
    assert!(matches!(
        realm.create_object("Item", Some(15.into()), Fields::new()),
        Err(CoreError::DuplicateKey { .. })
    ));
}

#[test]
fn compact_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auto.realm");
    populate(&path);
    let original = std::fs::metadata(&path).unwrap().len();

    let registry = RealmRegistry::new();
    let realm = registry
        .open("r", RealmConfig::persisted(&path).compact_on_open(true))
        .unwrap();
    assert!(realm.log_size().unwrap().unwrap() < original);
    assert_eq!(realm.count("Person").unwrap(), 2);
}

#[test]
fn same_path_shares_store_and_second_registry_is_locked() {
    let dir = tempfile::tempdir().unwrap();
    let registry = RealmRegistry::new();
    let a = registry
        .open("a", RealmConfig::in_directory(dir.path(), Some("shared")))
        .unwrap();
    let b = registry
        .open("b", RealmConfig::persisted(dir.path().join("shared.realm")))
        .unwrap();
    assert_eq!(a.file_path(), b.file_path());
    assert!(a.file_path().unwrap().ends_with("shared.realm"));

    a.create_object("Person", None, Fields::new()).unwrap();
    assert_eq!(b.count("Person").unwrap(), 1);

    let other = RealmRegistry::new();
    let err = other
        .open("c", RealmConfig::in_directory(dir.path(), Some("shared")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreLocked);
}

#[test]
fn delete_all_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wipe.realm");
    populate(&path);
    {
        let registry = RealmRegistry::new();
        let realm = registry.open("w", RealmConfig::persisted(&path)).unwrap();
        realm.delete_all().unwrap();
        realm
            .create_object("Person", Some("a".into()), named("Again"))
            .unwrap();
    }
    let registry = RealmRegistry::new();
    let realm = registry.open("r", RealmConfig::persisted(&path)).unwrap();
    assert_eq!(realm.count("Dog").unwrap(), 0);
    let people = realm.all_objects("Person").unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].get("name"), &Value::from("Again"));
}
