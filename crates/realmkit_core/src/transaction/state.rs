//! Transaction state.

use crate::error::{CoreError, CoreResult};
use crate::record::{Record, ResultSet};
use crate::store::{Change, ObjectStore};
use crate::types::{RowId, SequenceNumber, TransactionId};
use crate::value::PrimaryKey;
use std::collections::{BTreeMap, HashMap};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been cancelled.
    Aborted,
}

/// A buffered write to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    /// Insert or overwrite the row.
    Put(Record),
    /// Remove a committed row.
    Delete,
}

/// Buffered mutations of a write transaction, overlaid on the committed
/// store for reads.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    snapshot_seq: SequenceNumber,
    state: TransactionState,
    /// `delete_all` was issued; committed rows are invisible.
    cleared: bool,
    /// Pending writes, ordered by (class, row).
    writes: BTreeMap<(String, RowId), PendingWrite>,
    /// Primary keys of rows created in this transaction.
    created_keys: HashMap<(String, PrimaryKey), RowId>,
    /// Rows at or above this id were created in this transaction.
    base_row: u64,
    next_row: u64,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, snapshot_seq: SequenceNumber, next_row: u64) -> Self {
        Self {
            id,
            snapshot_seq,
            state: TransactionState::Active,
            cleared: false,
            writes: BTreeMap::new(),
            created_keys: HashMap::new(),
            base_row: next_row,
            next_row,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub const fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the committed sequence the transaction started from.
    #[must_use]
    pub const fn snapshot_seq(&self) -> SequenceNumber {
        self.snapshot_seq
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns true if committing would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.writes.is_empty()
    }

    /// Returns the number of buffered row writes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.writes.len()
    }

    /// Returns the pending write for a row, if any.
    #[must_use]
    pub fn pending(&self, class: &str, row: RowId) -> Option<&PendingWrite> {
        self.writes.get(&(class.to_string(), row))
    }

    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::Aborted => {
                Err(CoreError::invalid_operation("transaction was cancelled"))
            }
        }
    }

    pub(crate) fn allocate_row(&mut self) -> RowId {
        let row = RowId::new(self.next_row);
        self.next_row += 1;
        row
    }

    fn is_own_row(&self, row: RowId) -> bool {
        row.as_u64() >= self.base_row
    }

    /// Buffers a record write.
    pub(crate) fn put(&mut self, record: Record) {
        let class = record.class().to_string();
        let row = record.row_id();
        if self.is_own_row(row) {
            if let Some(key) = record.primary_key() {
                self.created_keys.insert((class.clone(), key.clone()), row);
            }
        }
        self.writes.insert((class, row), PendingWrite::Put(record));
    }

    /// Buffers removal of a visible record.
    pub(crate) fn delete(&mut self, record: &Record) {
        let slot = (record.class().to_string(), record.row_id());
        if self.is_own_row(record.row_id()) {
            self.writes.remove(&slot);
            if let Some(key) = record.primary_key() {
                self.created_keys
                    .remove(&(record.class().to_string(), key.clone()));
            }
        } else {
            self.writes.insert(slot, PendingWrite::Delete);
        }
    }

    /// Buffers removal of every record.
    pub(crate) fn clear(&mut self) {
        self.cleared = true;
        self.writes.clear();
        self.created_keys.clear();
    }

    /// Reads a row as this transaction sees it.
    pub(crate) fn get(&self, store: &ObjectStore, class: &str, row: RowId) -> Option<Record> {
        match self.pending(class, row) {
            Some(PendingWrite::Put(record)) => Some(record.clone()),
            Some(PendingWrite::Delete) => None,
            None if self.cleared || self.is_own_row(row) => None,
            None => store.get(class, row).cloned(),
        }
    }

    /// Looks up a primary key as this transaction sees it.
    pub(crate) fn find(
        &self,
        store: &ObjectStore,
        class: &str,
        key: &PrimaryKey,
    ) -> Option<Record> {
        if let Some(row) = self.created_keys.get(&(class.to_string(), key.clone())) {
            return self.get(store, class, *row);
        }
        if self.cleared {
            return None;
        }
        let committed = store.find(class, key)?;
        self.get(store, class, committed.row_id())
    }

    /// Returns every record of a class as this transaction sees it, in
    /// insertion order.
    pub(crate) fn all_objects(&self, store: &ObjectStore, class: &str) -> ResultSet {
        let mut results = Vec::new();
        if !self.cleared {
            for record in store.iter_class(class) {
                match self.pending(class, record.row_id()) {
                    Some(PendingWrite::Put(updated)) => results.push(updated.clone()),
                    Some(PendingWrite::Delete) => {}
                    None => results.push(record.clone()),
                }
            }
        }
        let own_rows = (class.to_string(), RowId::new(self.base_row))..;
        for ((pending_class, _), write) in self.writes.range(own_rows) {
            if pending_class != class {
                break;
            }
            if let PendingWrite::Put(record) = write {
                results.push(record.clone());
            }
        }
        results
    }

    /// Returns the change list to commit.
    pub(crate) fn changes(&self) -> Vec<Change> {
        let mut changes = Vec::with_capacity(self.writes.len() + 1);
        if self.cleared {
            changes.push(Change::Clear);
        }
        for ((class, row), write) in &self.writes {
            changes.push(match write {
                PendingWrite::Put(record) => Change::Put(record.clone()),
                PendingWrite::Delete => Change::Delete {
                    class: class.clone(),
                    row: *row,
                },
            });
        }
        changes
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = TransactionState::Aborted;
        self.writes.clear();
        self.created_keys.clear();
        self.cleared = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Fields, Value};

    fn record(class: &str, row: u64, key: Option<&str>, n: i64) -> Record {
        let mut fields = Fields::new();
        fields.insert("n".into(), Value::Int(n));
        Record::new(class.into(), RowId::new(row), key.map(PrimaryKey::from), fields)
    }

    fn committed() -> ObjectStore {
        let mut store = ObjectStore::new();
        store.apply(&[
            Change::Put(record("A", 0, Some("a0"), 0)),
            Change::Put(record("A", 1, Some("a1"), 1)),
        ]);
        store
    }

    #[test]
    fn new_transaction_is_active_and_empty() {
        let txn = Transaction::new(TransactionId::new(1), SequenceNumber::new(0), 0);
        assert!(txn.is_active());
        assert!(txn.is_empty());
        assert!(txn.ensure_active().is_ok());
    }

    #[test]
    fn reads_see_own_writes() {
        let store = committed();
        let mut txn = Transaction::new(TransactionId::new(1), SequenceNumber::new(1), 2);

        let row = txn.allocate_row();
        txn.put(record("A", row.as_u64(), Some("a2"), 2));
        txn.put(record("A", 0, Some("a0"), 10));
        let a1 = store.get("A", RowId::new(1)).cloned().unwrap();
        txn.delete(&a1);

        let seen: Vec<i64> = txn
            .all_objects(&store, "A")
            .iter()
            .map(|r| r.get("n").as_int().unwrap())
            .collect();
        assert_eq!(seen, vec![10, 2]);
        assert!(txn.find(&store, "A", &PrimaryKey::from("a1")).is_none());
        assert!(txn.find(&store, "A", &PrimaryKey::from("a2")).is_some());

        // The committed store is untouched.
        assert_eq!(store.count("A"), 2);
    }

    #[test]
    fn deleting_own_row_leaves_no_write() {
        let store = ObjectStore::new();
        let mut txn = Transaction::new(TransactionId::new(1), SequenceNumber::new(0), 0);
        let row = txn.allocate_row();
        let rec = record("A", row.as_u64(), Some("k"), 0);
        txn.put(rec.clone());
        txn.delete(&rec);

        assert!(txn.is_empty());
        assert!(txn.find(&store, "A", &PrimaryKey::from("k")).is_none());
        assert!(txn.changes().is_empty());
    }

    #[test]
    fn clear_hides_committed_rows() {
        let store = committed();
        let mut txn = Transaction::new(TransactionId::new(1), SequenceNumber::new(1), 2);
        txn.clear();
        let row = txn.allocate_row();
        txn.put(record("A", row.as_u64(), Some("a0"), 5));

        let visible = txn.all_objects(&store, "A");
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].row_id(), RowId::new(2));
        assert!(txn.get(&store, "A", RowId::new(1)).is_none());

        let changes = txn.changes();
        assert_eq!(changes[0], Change::Clear);
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn abort_discards_everything() {
        let mut txn = Transaction::new(TransactionId::new(1), SequenceNumber::new(0), 0);
        let row = txn.allocate_row();
        txn.put(record("A", row.as_u64(), None, 0));
        txn.mark_aborted();

        assert!(txn.is_empty());
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert!(txn.ensure_active().is_err());
    }
}
