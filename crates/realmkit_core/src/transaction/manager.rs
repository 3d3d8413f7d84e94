//! Transaction manager.

use crate::error::{CoreError, CoreResult};
use crate::log::{CommitEntry, CommitLog, SnapshotEntry};
use crate::store::{ChangedClasses, ObjectStore};
use crate::subscription::Observers;
use crate::transaction::state::Transaction;
use crate::transaction::write::WriteTransaction;
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

/// Owns the committed store and serializes writers.
///
/// ## Single-Writer Guarantee
///
/// Only one write transaction can be open at a time. `begin_write()` blocks
/// until the writer slot is free. A thread that already holds the slot gets
/// `AlreadyInTransaction` instead of waiting on itself. The slot is held
/// until the transaction commits, is cancelled or is dropped, and commit
/// notifications are delivered before it is released.
pub(crate) struct TransactionManager {
    store: RwLock<ObjectStore>,
    log: Option<CommitLog>,
    observers: Observers,
    primary_key_field: String,
    next_txid: AtomicU64,
    committed_seq: AtomicU64,
    writer: Mutex<()>,
    writer_owner: Mutex<Option<ThreadId>>,
}

/// Exclusive hold on the writer slot.
pub(crate) struct WriterSlot<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
    _guard: MutexGuard<'a, ()>,
}

impl Drop for WriterSlot<'_> {
    fn drop(&mut self) {
        // Runs before `_guard` is released.
        *self.owner.lock() = None;
    }
}

impl TransactionManager {
    /// Creates a manager over a recovered store.
    pub(crate) fn new(
        store: ObjectStore,
        committed_seq: SequenceNumber,
        log: Option<CommitLog>,
        primary_key_field: String,
    ) -> Self {
        Self {
            store: RwLock::new(store),
            log,
            observers: Observers::default(),
            primary_key_field,
            next_txid: AtomicU64::new(1),
            committed_seq: AtomicU64::new(committed_seq.as_u64()),
            writer: Mutex::new(()),
            writer_owner: Mutex::new(None),
        }
    }

    /// Takes the writer slot, waiting for other threads to release it.
    fn acquire_writer(&self) -> CoreResult<WriterSlot<'_>> {
        let current = thread::current().id();
        if *self.writer_owner.lock() == Some(current) {
            return Err(CoreError::AlreadyInTransaction);
        }
        let guard = self.writer.lock();
        *self.writer_owner.lock() = Some(current);
        Ok(WriterSlot {
            owner: &self.writer_owner,
            _guard: guard,
        })
    }

    /// Begins a write transaction.
    pub(crate) fn begin_write(&self) -> CoreResult<WriteTransaction<'_>> {
        let guard = self.acquire_writer()?;
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        let next_row = self.store.read().next_row();
        let txn = Transaction::new(id, self.committed_sequence(), next_row);
        tracing::trace!(txn = %id, "begin");
        Ok(WriteTransaction::new(guard, self, txn))
    }

    /// Commits a transaction.
    ///
    /// The commit is logged first, then applied under the store write lock,
    /// then announced to subscribers. A logging failure cancels the
    /// transaction and leaves the store untouched.
    pub(crate) fn commit(&self, txn: &mut Transaction) -> CoreResult<SequenceNumber> {
        txn.ensure_active()?;

        if txn.is_empty() {
            txn.mark_committed();
            return Ok(self.committed_sequence());
        }

        let entry = CommitEntry {
            sequence: self.committed_sequence().next(),
            changes: txn.changes(),
        };
        if let Some(log) = &self.log {
            if let Err(err) = log.append_commit(&entry) {
                tracing::warn!(txn = %txn.id(), error = %err, "commit log append failed");
                txn.mark_aborted();
                return Err(err);
            }
        }

        let changed = ChangedClasses::from_changes(&entry.changes);
        let mut store = self.store.write();
        store.apply(&entry.changes);
        self.committed_seq
            .store(entry.sequence.as_u64(), Ordering::SeqCst);
        let store = RwLockWriteGuard::downgrade(store);
        txn.mark_committed();

        tracing::debug!(
            txn = %txn.id(),
            seq = %entry.sequence,
            changes = entry.changes.len(),
            "committed"
        );
        self.observers.notify(&store, &changed, entry.sequence);
        Ok(entry.sequence)
    }

    /// Rewrites the commit log as one snapshot of the current store.
    ///
    /// Returns the new log size, or `None` for in-memory stores.
    pub(crate) fn compact(&self) -> CoreResult<Option<u64>> {
        let Some(log) = &self.log else {
            return Ok(None);
        };
        let _writer = self.acquire_writer()?;

        let store = self.store.read();
        let snapshot = SnapshotEntry {
            sequence: self.committed_sequence(),
            next_row: store.next_row(),
            records: store.snapshot_records(),
        };
        let before = log.size()?;
        let after = log.compact(&snapshot)?;
        tracing::info!(before, after, records = store.len(), "compacted commit log");
        Ok(Some(after))
    }

    /// Returns a read guard on the committed store.
    pub(crate) fn store(&self) -> RwLockReadGuard<'_, ObjectStore> {
        self.store.read()
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.observers
    }

    pub(crate) fn log(&self) -> Option<&CommitLog> {
        self.log.as_ref()
    }

    pub(crate) fn primary_key_field(&self) -> &str {
        &self.primary_key_field
    }

    /// Returns the sequence number of the last commit.
    pub(crate) fn committed_sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }
}
