//! Shared engine behind one or more realm instances.

use crate::config::{RealmConfig, StorageLocation, StoreKey, StoreOptions};
use crate::error::{CoreError, CoreResult};
use crate::log::{CommitLog, LogRecord};
use crate::store::ObjectStore;
use crate::transaction::TransactionManager;
use crate::types::SequenceNumber;
use realmkit_storage::{FileBackend, StorageBackend};
use std::fmt;

/// Committed store, writer slot and commit log for one store key.
pub(crate) struct Engine {
    key: StoreKey,
    options: StoreOptions,
    manager: TransactionManager,
}

impl Engine {
    /// Opens the store described by `config`, replaying its log if it has one.
    pub(crate) fn open(config: &RealmConfig) -> CoreResult<Self> {
        let key = config.store_key();
        match &config.location {
            StorageLocation::InMemory { .. } => {
                tracing::debug!(store = %key, "opened in-memory store");
                Ok(Self::with_parts(
                    key,
                    config.options.clone(),
                    ObjectStore::new(),
                    SequenceNumber::default(),
                    None,
                ))
            }
            StorageLocation::Persisted { path } => {
                if !config.options.create_if_missing && !path.exists() {
                    return Err(CoreError::invalid_operation(format!(
                        "realm file {} does not exist and create_if_missing is false",
                        path.display()
                    )));
                }
                let backend = FileBackend::open_exclusive(path)?;
                Self::open_with_backend(key, config.options.clone(), Box::new(backend))
            }
        }
    }

    /// Opens a logged store over an arbitrary backend.
    pub(crate) fn open_with_backend(
        key: StoreKey,
        options: StoreOptions,
        backend: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        let log = CommitLog::new(backend, options.sync_on_commit);
        let (store, sequence, replayed) = Self::recover(&log)?;
        tracing::info!(
            store = %key,
            records = replayed,
            objects = store.len(),
            seq = %sequence,
            "recovered commit log"
        );

        let compact = options.compact_on_open && replayed > 1;
        let engine = Self::with_parts(key, options, store, sequence, Some(log));
        if compact {
            engine.compact()?;
        }
        Ok(engine)
    }

    fn with_parts(
        key: StoreKey,
        options: StoreOptions,
        store: ObjectStore,
        sequence: SequenceNumber,
        log: Option<CommitLog>,
    ) -> Self {
        let manager =
            TransactionManager::new(store, sequence, log, options.primary_key_field.clone());
        Self {
            key,
            options,
            manager,
        }
    }

    /// Replays the log into a fresh store.
    ///
    /// Returns (store, last sequence, records replayed).
    fn recover(log: &CommitLog) -> CoreResult<(ObjectStore, SequenceNumber, usize)> {
        let recovery = log.recover()?;
        let replayed = recovery.records.len();

        let mut store = ObjectStore::new();
        let mut sequence = SequenceNumber::default();
        for record in recovery.records {
            match record {
                LogRecord::Snapshot(snapshot) => {
                    store = ObjectStore::from_snapshot(snapshot.next_row, snapshot.records);
                    sequence = snapshot.sequence;
                }
                LogRecord::Commit(commit) => {
                    store.apply(&commit.changes);
                    sequence = commit.sequence;
                }
            }
        }
        Ok((store, sequence, replayed))
    }

    pub(crate) const fn key(&self) -> &StoreKey {
        &self.key
    }

    pub(crate) const fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub(crate) const fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    /// Rewrites the commit log as a single snapshot. No-op in memory.
    pub(crate) fn compact(&self) -> CoreResult<()> {
        self.manager.compact().map(|_| ())
    }

    /// Returns the commit log size, or `None` in memory.
    pub(crate) fn log_size(&self) -> CoreResult<Option<u64>> {
        self.manager.log().map(CommitLog::size).transpose()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("key", &self.key)
            .field("committed_seq", &self.manager.committed_sequence())
            .finish_non_exhaustive()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(log) = self.manager.log() {
            if let Err(err) = log.sync() {
                tracing::warn!(store = %self.key, error = %err, "failed to sync commit log on close");
            }
        }
        tracing::debug!(store = %self.key, "closed store");
    }
}
