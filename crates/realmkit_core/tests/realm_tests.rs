//! End-to-end tests of the realm API.

use realmkit_core::{
    CoreError, Fields, PrimaryKey, Query, RealmConfig, RealmRegistry, SequenceNumber, Value,
};
use std::sync::mpsc::TryRecvError;

fn fields(pairs: &[(&str, Value)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn open(id: &str) -> (RealmRegistry, std::sync::Arc<realmkit_core::Realm>) {
    let registry = RealmRegistry::new();
    let realm = registry.open(id, RealmConfig::in_memory(id)).unwrap();
    (registry, realm)
}

#[test]
fn find_returns_created_record_until_deleted() {
    let (_registry, realm) = open("find");
    let key = PrimaryKey::from("p-1");
    realm
        .create_object("Person", Some(key.clone()), fields(&[("age", 30.into())]))
        .unwrap();

    let found = realm.find("Person", &key).unwrap().unwrap();
    assert_eq!(found.get("age").as_int(), Some(30));
    assert_eq!(found.primary_key(), Some(&key));

    realm.delete_object("Person", &key).unwrap();
    assert!(realm.find("Person", &key).unwrap().is_none());
    assert!(matches!(
        realm.delete_object("Person", &key),
        Err(CoreError::NotFound { .. })
    ));
}

#[test]
fn duplicate_key_leaves_store_unchanged() {
    let (_registry, realm) = open("dup");
    realm
        .create_object("Person", Some(7.into()), fields(&[("name", "a".into())]))
        .unwrap();
    let before = realm.all_objects("Person").unwrap();

    let err = realm
        .create_object("Person", Some(7.into()), fields(&[("name", "b".into())]))
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateKey { .. }));
    assert_eq!(realm.all_objects("Person").unwrap(), before);

    // Keys are scoped to their class.
    realm
        .create_object("Dog", Some(7.into()), Fields::new())
        .unwrap();
}

#[test]
fn delete_all_empties_every_class() {
    let (_registry, realm) = open("clear");
    for class in ["Person", "Dog", "Cat"] {
        realm.create_object(class, None, Fields::new()).unwrap();
    }
    realm.delete_all().unwrap();
    for class in ["Person", "Dog", "Cat"] {
        assert!(realm.all_objects(class).unwrap().is_empty());
    }
    assert!(realm.class_names().unwrap().is_empty());
}

#[test]
fn failed_transaction_leaves_no_trace() {
    let (_registry, realm) = open("atomic");
    realm
        .create_object("Person", Some("keep".into()), Fields::new())
        .unwrap();
    let seq = realm.committed_sequence();

    let result = realm.write(|txn| {
        txn.create_object("Person", Some("new".into()), Fields::new())?;
        txn.delete_by_key("Person", &"keep".into())?;
        txn.create_object("", None, Fields::new())
    });
    assert!(matches!(result, Err(CoreError::InvalidClass { .. })));

    let people = realm.all_objects("Person").unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].primary_key(), Some(&PrimaryKey::from("keep")));
    assert_eq!(realm.committed_sequence(), seq);
}

#[test]
fn dropped_transaction_is_cancelled() {
    let (_registry, realm) = open("drop");
    {
        let mut txn = realm.begin_write().unwrap();
        txn.create_object("Person", None, Fields::new()).unwrap();
        assert!(matches!(
            realm.begin_write(),
            Err(CoreError::AlreadyInTransaction)
        ));
    }
    assert!(realm.all_objects("Person").unwrap().is_empty());
    // The writer slot is free again.
    realm.begin_write().unwrap().cancel();
}

#[test]
fn uncommitted_writes_are_invisible_to_readers() {
    let (registry, realm) = open("iso");
    let other = registry.open("other", RealmConfig::in_memory("iso")).unwrap();

    let mut txn = realm.begin_write().unwrap();
    txn.create_object("Person", Some("a".into()), Fields::new())
        .unwrap();
    assert!(txn.find("Person", &"a".into()).unwrap().is_some());
    assert!(other.find("Person", &"a".into()).unwrap().is_none());
    assert!(realm.all_objects("Person").unwrap().is_empty());

    let seq = txn.commit().unwrap();
    assert_eq!(seq, SequenceNumber::new(1));
    assert!(other.find("Person", &"a".into()).unwrap().is_some());
}

#[test]
fn equal_to_query_keeps_insertion_order() {
    let (_registry, realm) = open("query");
    for (key, age) in [("a", 25), ("b", 30), ("c", 30), ("d", 40)] {
        realm
            .create_object("Person", Some(key.into()), fields(&[("age", age.into())]))
            .unwrap();
    }

    let query = Query::parse(&[vec!["equalTo".into(), "age".into(), 30.into()]]).unwrap();
    let keys: Vec<PrimaryKey> = realm
        .objects("Person", &query)
        .unwrap()
        .into_iter()
        .filter_map(|r| r.primary_key().cloned())
        .collect();
    assert_eq!(keys, vec![PrimaryKey::from("b"), PrimaryKey::from("c")]);
}

#[test]
fn subscription_receives_full_result_set_once_per_commit() {
    let (_registry, realm) = open("sub");
    realm
        .create_object("Person", Some("a".into()), Fields::new())
        .unwrap();

    let rx = realm.subscribe("people", "Person", None).unwrap();
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

    realm
        .create_object("Person", Some("b".into()), Fields::new())
        .unwrap();
    let change = rx.try_recv().unwrap();
    assert_eq!(change.subscription_id, "people");
    assert_eq!(change.instance_id, "sub");
    assert_eq!(change.results.len(), 2);
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn subscription_sees_commits_from_other_instances() {
    let (registry, realm) = open("fanout");
    let writer = registry
        .open("writer", RealmConfig::in_memory("fanout"))
        .unwrap();
    let rx = realm.subscribe("s", "Person", None).unwrap();

    writer.create_object("Person", None, Fields::new()).unwrap();
    assert_eq!(rx.try_recv().unwrap().results.len(), 1);
}

#[test]
fn filtered_subscription_ignores_irrelevant_commits() {
    let (_registry, realm) = open("filtered");
    let adults = Query::builder()
        .greater_than_or_equal_to("age", 18)
        .build()
        .unwrap();
    let rx = realm.subscribe("adults", "Person", Some(adults)).unwrap();

    realm
        .create_object("Person", None, fields(&[("age", 12.into())]))
        .unwrap();
    realm
        .create_object("Dog", None, fields(&[("age", 40.into())]))
        .unwrap();
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

    realm
        .create_object("Person", None, fields(&[("age", 21.into())]))
        .unwrap();
    let change = rx.try_recv().unwrap();
    assert_eq!(change.results.len(), 1);
    assert_eq!(change.results[0].get("age").as_int(), Some(21));
}

#[test]
fn notifications_follow_commit_order() {
    let (_registry, realm) = open("order");
    let rx = realm.subscribe("s", "Person", None).unwrap();
    for n in 0..5 {
        realm
            .create_object("Person", Some(n.into()), Fields::new())
            .unwrap();
    }
    let sequences: Vec<u64> = rx.try_iter().map(|c| c.sequence.as_u64()).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

#[test]
fn subscribe_twice_and_unknown_unsubscribe() {
    let (_registry, realm) = open("ids");
    let _rx = realm.subscribe("s", "Person", None).unwrap();
    assert!(matches!(
        realm.subscribe("s", "Dog", None),
        Err(CoreError::AlreadySubscribed { .. })
    ));
    realm.unsubscribe("s").unwrap();
    assert!(matches!(
        realm.unsubscribe("s"),
        Err(CoreError::NotSubscribed { .. })
    ));
}

#[test]
fn update_never_touches_primary_key() {
    let (_registry, realm) = open("update");
    realm
        .create_object("Person", Some("p".into()), fields(&[("name", "a".into())]))
        .unwrap();

    let updated = realm
        .update_object(
            "Person",
            &"p".into(),
            fields(&[("uuid", "hijack".into()), ("name", "b".into())]),
        )
        .unwrap();
    assert_eq!(updated.get("uuid"), &Value::from("p"));
    assert_eq!(updated.get("name"), &Value::from("b"));
    assert!(realm.find("Person", &"hijack".into()).unwrap().is_none());
    assert!(matches!(
        realm.update_object("Person", &"missing".into(), Fields::new()),
        Err(CoreError::NotFound { .. })
    ));
}

#[test]
fn modified_record_can_be_saved() {
    let (_registry, realm) = open("save");
    let mut record = realm
        .create_object("Person", Some("p".into()), fields(&[("age", 1.into())]))
        .unwrap();
    record.set("age", 2).unwrap();
    realm.save(&record).unwrap();

    let stored = realm.find("Person", &"p".into()).unwrap().unwrap();
    assert_eq!(stored.get("age").as_int(), Some(2));

    realm.delete_record(&stored).unwrap();
    assert!(matches!(
        realm.save(&record),
        Err(CoreError::NotFound { .. })
    ));
    assert!(matches!(
        realm.delete_record(&stored),
        Err(CoreError::NotFound { .. })
    ));
}

#[test]
fn unsupported_values_are_rejected() {
    let (_registry, realm) = open("types");
    let nested = Value::List(vec![Value::List(vec![])]);
    let err = realm
        .create_object("Person", None, fields(&[("tags", nested)]))
        .unwrap_err();
    assert!(matches!(err, CoreError::UnsupportedType { .. }));
    assert!(realm.all_objects("Person").unwrap().is_empty());
}

#[test]
fn custom_primary_key_field() {
    let registry = RealmRegistry::new();
    let realm = registry
        .open("pk", RealmConfig::in_memory("pk").primary_key_field("id"))
        .unwrap();
    let record = realm
        .create_object("Person", Some(5.into()), Fields::new())
        .unwrap();
    assert_eq!(record.get("id").as_int(), Some(5));
    assert!(record.get("uuid").is_null());
}

#[test]
fn record_from_another_store_is_not_saved_over_a_different_key() {
    let (_a_registry, a) = open("save-a");
    let (_b_registry, b) = open("save-b");
    let mut foreign = a
        .create_object("Person", Some("x".into()), fields(&[("age", 1.into())]))
        .unwrap();
    let local = b
        .create_object("Person", Some("y".into()), fields(&[("age", 5.into())]))
        .unwrap();
    assert_eq!(foreign.row_id(), local.row_id());

    foreign.set("age", 9).unwrap();
    assert!(matches!(
        b.save(&foreign),
        Err(CoreError::InvalidOperation { .. })
    ));
    assert!(matches!(
        b.delete_record(&foreign),
        Err(CoreError::InvalidOperation { .. })
    ));

    let stored = b.find("Person", &"y".into()).unwrap().unwrap();
    assert_eq!(stored.primary_key(), Some(&PrimaryKey::from("y")));
    assert_eq!(stored.get("uuid").as_str(), Some("y"));
    assert_eq!(stored.get("age").as_int(), Some(5));
    assert!(b.find("Person", &"x".into()).unwrap().is_none());
    assert_eq!(b.count("Person").unwrap(), 1);
}

#[test]
fn saved_record_keeps_stored_primary_key_field() {
    let (_registry, realm) = open("save-key");
    let mut record = realm
        .create_object("Person", Some("p".into()), Fields::new())
        .unwrap();
    record.set("uuid", "changed").unwrap();
    realm.save(&record).unwrap();

    let stored = realm.find("Person", &"p".into()).unwrap().unwrap();
    assert_eq!(stored.get("uuid").as_str(), Some("p"));
    assert!(realm.find("Person", &"changed".into()).unwrap().is_none());
}

#[test]
fn concurrent_writers_wait_for_each_other() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 250;

    let (_registry, realm) = open("concurrent");
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let realm = std::sync::Arc::clone(&realm);
            std::thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let key = PrimaryKey::from(format!("{t}-{i}"));
                    realm.create_object("P", Some(key), Fields::new())?;
                }
                Ok::<(), CoreError>(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let total = THREADS * PER_THREAD;
    assert_eq!(realm.count("P").unwrap(), total);
    assert_eq!(realm.committed_sequence(), SequenceNumber::new(total as u64));
}

#[test]
fn write_on_another_thread_waits_for_open_transaction() {
    let (_registry, realm) = open("waiting");
    let mut txn = realm.begin_write().unwrap();
    txn.create_object("P", Some("first".into()), Fields::new())
        .unwrap();

    let other = std::sync::Arc::clone(&realm);
    let handle = std::thread::spawn(move || {
        other.create_object("P", Some("second".into()), Fields::new())
    });
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert!(!handle.is_finished());

    txn.commit().unwrap();
    let second = handle.join().unwrap().unwrap();
    let keys: Vec<PrimaryKey> = realm
        .all_objects("P")
        .unwrap()
        .iter()
        .filter_map(|r| r.primary_key().cloned())
        .collect();
    assert_eq!(keys, [PrimaryKey::from("first"), PrimaryKey::from("second")]);
    assert_eq!(second.primary_key(), Some(&PrimaryKey::from("second")));
}
