//! Committed object store.
//!
//! Holds every committed record, grouped by class, with a hash index on
//! primary keys. The store is only mutated by applying a committed change
//! list; uncommitted work lives in the transaction layer.

use crate::error::{CoreError, CoreResult};
use crate::query::Query;
use crate::record::{Record, ResultSet};
use crate::types::RowId;
use crate::value::PrimaryKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Maximum length of a class name in bytes.
pub const MAX_CLASS_NAME_LEN: usize = 255;

/// Prefix reserved for internal classes.
pub const RESERVED_CLASS_PREFIX: &str = "__";

/// Checks that a class name can be used.
///
/// # Errors
///
/// Returns `InvalidClass` for empty, overlong, reserved or control-character
/// names.
pub fn validate_class_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::invalid_class(name, "class name is empty"));
    }
    if name.len() > MAX_CLASS_NAME_LEN {
        return Err(CoreError::invalid_class(
            name,
            format!("class name exceeds {MAX_CLASS_NAME_LEN} bytes"),
        ));
    }
    if name.starts_with(RESERVED_CLASS_PREFIX) {
        return Err(CoreError::invalid_class(
            name,
            format!("names starting with '{RESERVED_CLASS_PREFIX}' are reserved"),
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(CoreError::invalid_class(
            name,
            "class name contains control characters",
        ));
    }
    Ok(())
}

/// A single committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// Insert or overwrite the record at its row.
    Put(Record),
    /// Remove the record at `row` in `class`.
    Delete {
        /// Class of the removed record.
        class: String,
        /// Row of the removed record.
        row: RowId,
    },
    /// Remove every record of every class.
    Clear,
}

/// Classes touched by a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedClasses {
    all: bool,
    classes: BTreeSet<String>,
}

impl ChangedClasses {
    /// Collects the classes named by a change list.
    #[must_use]
    pub fn from_changes(changes: &[Change]) -> Self {
        let mut changed = Self::default();
        for change in changes {
            match change {
                Change::Put(record) => {
                    changed.classes.insert(record.class().to_string());
                }
                Change::Delete { class, .. } => {
                    changed.classes.insert(class.clone());
                }
                Change::Clear => changed.all = true,
            }
        }
        changed
    }

    /// Returns true if records of `class` may have changed.
    #[must_use]
    pub fn affects(&self, class: &str) -> bool {
        self.all || self.classes.contains(class)
    }

    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.all && self.classes.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct ClassTable {
    rows: BTreeMap<RowId, Record>,
    keys: HashMap<PrimaryKey, RowId>,
}

impl ClassTable {
    fn put(&mut self, record: Record) {
        let row = record.row_id();
        if let Some(old) = self.rows.get(&row) {
            if let Some(key) = old.primary_key() {
                self.keys.remove(key);
            }
        }
        if let Some(key) = record.primary_key() {
            self.keys.insert(key.clone(), row);
        }
        self.rows.insert(row, record);
    }

    fn remove(&mut self, row: RowId) -> Option<Record> {
        let record = self.rows.remove(&row)?;
        if let Some(key) = record.primary_key() {
            self.keys.remove(key);
        }
        Some(record)
    }
}

/// The committed contents of a realm.
#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    classes: BTreeMap<String, ClassTable>,
    next_row: u64,
}

impl ObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from a snapshot.
    #[must_use]
    pub fn from_snapshot(next_row: u64, records: Vec<Record>) -> Self {
        let mut store = Self {
            classes: BTreeMap::new(),
            next_row,
        };
        for record in records {
            store.put(record);
        }
        store
    }

    /// Returns the first unallocated row id.
    #[must_use]
    pub const fn next_row(&self) -> u64 {
        self.next_row
    }

    /// Looks up a record by primary key.
    #[must_use]
    pub fn find(&self, class: &str, key: &PrimaryKey) -> Option<&Record> {
        let table = self.classes.get(class)?;
        let row = table.keys.get(key)?;
        table.rows.get(row)
    }

    /// Looks up a record by row id.
    #[must_use]
    pub fn get(&self, class: &str, row: RowId) -> Option<&Record> {
        self.classes.get(class)?.rows.get(&row)
    }

    /// Iterates the records of a class in insertion order.
    pub fn iter_class<'a>(&'a self, class: &str) -> impl Iterator<Item = &'a Record> + 'a {
        self.classes
            .get(class)
            .into_iter()
            .flat_map(|table| table.rows.values())
    }

    /// Returns a snapshot of every record in a class.
    ///
    /// Unknown classes yield an empty result set.
    #[must_use]
    pub fn all_objects(&self, class: &str) -> ResultSet {
        self.iter_class(class).cloned().collect()
    }

    /// Returns a snapshot of the records in a class matching `query`.
    #[must_use]
    pub fn objects(&self, class: &str, query: &Query) -> ResultSet {
        self.iter_class(class)
            .filter(|record| query.matches(record))
            .cloned()
            .collect()
    }

    /// Returns the names of classes holding at least one record.
    #[must_use]
    pub fn class_names(&self) -> Vec<String> {
        self.classes
            .iter()
            .filter(|(_, table)| !table.rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Returns the number of records in a class.
    #[must_use]
    pub fn count(&self, class: &str) -> usize {
        self.classes.get(class).map_or(0, |table| table.rows.len())
    }

    /// Returns the total number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.values().map(|table| table.rows.len()).sum()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every record in row order, for snapshots.
    #[must_use]
    pub fn snapshot_records(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .classes
            .values()
            .flat_map(|table| table.rows.values().cloned())
            .collect();
        records.sort_by_key(Record::row_id);
        records
    }

    /// Applies a committed change list.
    pub fn apply(&mut self, changes: &[Change]) {
        for change in changes {
            match change {
                Change::Put(record) => self.put(record.clone()),
                Change::Delete { class, row } => {
                    if let Some(table) = self.classes.get_mut(class) {
                        table.remove(*row);
                    }
                }
                Change::Clear => self.classes.clear(),
            }
        }
    }

    fn put(&mut self, record: Record) {
        self.next_row = self.next_row.max(record.row_id().as_u64() + 1);
        self.classes
            .entry(record.class().to_string())
            .or_default()
            .put(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Fields, Value};

    fn record(class: &str, row: u64, key: Option<&str>) -> Record {
        let mut fields = Fields::new();
        if let Some(key) = key {
            fields.insert("uuid".into(), Value::from(key));
        }
        Record::new(
            class.to_string(),
            RowId::new(row),
            key.map(PrimaryKey::from),
            fields,
        )
    }

    #[test]
    fn class_name_rules() {
        assert!(validate_class_name("Person").is_ok());
        assert!(validate_class_name("Émigré").is_ok());
        for bad in ["", "__meta", "Bad\nName", &"x".repeat(256)] {
            let err = validate_class_name(bad).unwrap_err();
            assert!(matches!(err, CoreError::InvalidClass { .. }), "{bad:?}");
        }
        assert!(validate_class_name(&"x".repeat(255)).is_ok());
    }

    #[test]
    fn apply_put_and_find() {
        let mut store = ObjectStore::new();
        store.apply(&[
            Change::Put(record("Person", 0, Some("a"))),
            Change::Put(record("Dog", 1, None)),
        ]);

        assert_eq!(store.next_row(), 2);
        assert_eq!(
            store.find("Person", &PrimaryKey::from("a")).map(Record::row_id),
            Some(RowId::new(0))
        );
        assert!(store.find("Dog", &PrimaryKey::from("a")).is_none());
        assert_eq!(store.class_names(), vec!["Dog".to_string(), "Person".to_string()]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn delete_removes_index_entry() {
        let mut store = ObjectStore::new();
        store.apply(&[Change::Put(record("Person", 0, Some("a")))]);
        store.apply(&[Change::Delete {
            class: "Person".into(),
            row: RowId::new(0),
        }]);

        assert!(store.find("Person", &PrimaryKey::from("a")).is_none());
        assert_eq!(store.count("Person"), 0);
        assert!(store.class_names().is_empty());
        // Row ids are never reused.
        assert_eq!(store.next_row(), 1);
    }

    #[test]
    fn clear_empties_every_class() {
        let mut store = ObjectStore::new();
        store.apply(&[
            Change::Put(record("A", 0, None)),
            Change::Put(record("B", 1, None)),
            Change::Clear,
            Change::Put(record("C", 2, None)),
        ]);
        assert!(store.all_objects("A").is_empty());
        assert!(store.all_objects("B").is_empty());
        assert_eq!(store.count("C"), 1);
    }

    #[test]
    fn unknown_class_is_empty() {
        let store = ObjectStore::new();
        assert!(store.all_objects("Nope").is_empty());
        assert_eq!(store.count("Nope"), 0);
    }

    #[test]
    fn snapshot_round_trip_keeps_order() {
        let mut store = ObjectStore::new();
        store.apply(&[
            Change::Put(record("B", 0, Some("x"))),
            Change::Put(record("A", 1, None)),
            Change::Put(record("B", 2, None)),
        ]);
        let records = store.snapshot_records();
        let rows: Vec<u64> = records.iter().map(|r| r.row_id().as_u64()).collect();
        assert_eq!(rows, vec![0, 1, 2]);

        let rebuilt = ObjectStore::from_snapshot(store.next_row(), records);
        assert_eq!(rebuilt.all_objects("B"), store.all_objects("B"));
        assert!(rebuilt.find("B", &PrimaryKey::from("x")).is_some());
        assert_eq!(rebuilt.next_row(), 3);
    }

    #[test]
    fn changed_classes() {
        let changed = ChangedClasses::from_changes(&[Change::Put(record("A", 0, None))]);
        assert!(changed.affects("A"));
        assert!(!changed.affects("B"));

        let cleared = ChangedClasses::from_changes(&[Change::Clear]);
        assert!(cleared.affects("anything"));
        assert!(ChangedClasses::default().is_empty());
    }
}
