//! Realm instance handle.

use crate::config::{StoreKey, StoreOptions};
use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::query::Query;
use crate::record::{Record, ResultSet};
use crate::store::validate_class_name;
use crate::subscription::{ResultsChanged, SubscriptionManager};
use crate::transaction::WriteTransaction;
use crate::types::SequenceNumber;
use crate::value::{Fields, PrimaryKey};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// An open realm.
///
/// Instances opened on the same in-memory identifier or file path share one
/// store. Each instance has its own subscriptions, which end when it closes.
///
/// Single-operation methods such as [`Realm::create_object`] run in their
/// own transaction. Use [`Realm::write`] to group several mutations into one
/// atomic commit.
pub struct Realm {
    instance_id: String,
    engine: Arc<Engine>,
    subscriptions: Arc<SubscriptionManager>,
    closed: AtomicBool,
}

impl Realm {
    pub(crate) fn new(instance_id: String, engine: Arc<Engine>) -> Self {
        let subscriptions = Arc::new(SubscriptionManager::new(instance_id.clone()));
        engine.manager().observers().attach(&subscriptions);
        tracing::debug!(instance = %instance_id, store = %engine.key(), "opened realm");
        Self {
            instance_id,
            engine,
            subscriptions,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the instance identifier.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Returns the key of the shared store.
    #[must_use]
    pub fn store_key(&self) -> &StoreKey {
        self.engine.key()
    }

    /// Returns the options the store was opened with.
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        self.engine.options()
    }

    /// Returns the file path of a persisted realm, `None` in memory.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        match self.engine.key() {
            StoreKey::File(path) => Some(path),
            StoreKey::Memory(_) => None,
        }
    }

    /// Returns true once [`Realm::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            Err(CoreError::RealmClosed {
                instance_id: self.instance_id.clone(),
            })
        } else {
            Ok(())
        }
    }

    /// Begins a write transaction, waiting while another thread holds one
    /// on the same store.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInTransaction` if this thread already has a write
    /// transaction open on the store, or `RealmClosed`.
    pub fn begin_write(&self) -> CoreResult<WriteTransaction<'_>> {
        self.ensure_open()?;
        self.engine.manager().begin_write()
    }

    /// Runs `f` in a write transaction.
    ///
    /// Commits if `f` returns `Ok`, cancels if it returns `Err`.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, from beginning the transaction, or from
    /// the commit.
    pub fn write<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> CoreResult<T>,
    {
        let mut txn = self.begin_write()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.cancel();
                Err(err)
            }
        }
    }

    /// Creates a record in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`WriteTransaction::create_object`].
    pub fn create_object(
        &self,
        class: &str,
        primary_key: Option<PrimaryKey>,
        fields: Fields,
    ) -> CoreResult<Record> {
        self.write(|txn| txn.create_object(class, primary_key, fields))
    }

    /// Merges fields into a record in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`WriteTransaction::update_object`].
    pub fn update_object(
        &self,
        class: &str,
        key: &PrimaryKey,
        fields: Fields,
    ) -> CoreResult<Record> {
        self.write(|txn| txn.update_object(class, key, fields))
    }

    /// Writes back a modified record in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`WriteTransaction::save`].
    pub fn save(&self, record: &Record) -> CoreResult<()> {
        self.write(|txn| txn.save(record))
    }

    /// Deletes the record stored under `key` in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record has the key.
    pub fn delete_object(&self, class: &str, key: &PrimaryKey) -> CoreResult<()> {
        self.write(|txn| txn.delete_by_key(class, key))
    }

    /// Deletes a record in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`WriteTransaction::delete_object`].
    pub fn delete_record(&self, record: &Record) -> CoreResult<()> {
        self.write(|txn| txn.delete_object(record))
    }

    /// Deletes every record of every class in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInTransaction` or `RealmClosed`, or a commit error.
    pub fn delete_all(&self) -> CoreResult<()> {
        self.write(|txn| txn.delete_all())
    }

    /// Looks up a committed record by primary key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClass` or `RealmClosed`.
    pub fn find(&self, class: &str, key: &PrimaryKey) -> CoreResult<Option<Record>> {
        self.ensure_open()?;
        validate_class_name(class)?;
        Ok(self.engine.manager().store().find(class, key).cloned())
    }

    /// Returns every committed record of a class.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClass` or `RealmClosed`.
    pub fn all_objects(&self, class: &str) -> CoreResult<ResultSet> {
        self.ensure_open()?;
        validate_class_name(class)?;
        Ok(self.engine.manager().store().all_objects(class))
    }

    /// Returns the committed records of a class matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClass` or `RealmClosed`.
    pub fn objects(&self, class: &str, query: &Query) -> CoreResult<ResultSet> {
        self.ensure_open()?;
        validate_class_name(class)?;
        Ok(self.engine.manager().store().objects(class, query))
    }

    /// Returns the number of committed records in a class.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClass` or `RealmClosed`.
    pub fn count(&self, class: &str) -> CoreResult<usize> {
        self.ensure_open()?;
        validate_class_name(class)?;
        Ok(self.engine.manager().store().count(class))
    }

    /// Returns the classes holding at least one committed record.
    ///
    /// # Errors
    ///
    /// Returns `RealmClosed`.
    pub fn class_names(&self) -> CoreResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.engine.manager().store().class_names())
    }

    /// Returns the sequence number of the last commit.
    #[must_use]
    pub fn committed_sequence(&self) -> SequenceNumber {
        self.engine.manager().committed_sequence()
    }

    /// Starts a live query and returns its channel.
    ///
    /// Only changes are delivered: the result set at subscribe time is the
    /// baseline, not a message.
    ///
    /// # Errors
    ///
    /// Returns `AlreadySubscribed`, `InvalidClass` or `RealmClosed`.
    pub fn subscribe(
        &self,
        subscription_id: &str,
        class: &str,
        query: Option<Query>,
    ) -> CoreResult<Receiver<ResultsChanged>> {
        let (tx, rx) = mpsc::channel();
        self.subscribe_with_sender(subscription_id, class, query, tx)?;
        Ok(rx)
    }

    /// Starts a live query delivering into an existing channel.
    ///
    /// # Errors
    ///
    /// Returns `AlreadySubscribed`, `InvalidClass` or `RealmClosed`.
    pub fn subscribe_with_sender(
        &self,
        subscription_id: &str,
        class: &str,
        query: Option<Query>,
        sender: Sender<ResultsChanged>,
    ) -> CoreResult<()> {
        self.ensure_open()?;
        validate_class_name(class)?;
        let store = self.engine.manager().store();
        self.subscriptions.subscribe(
            subscription_id,
            class,
            query.unwrap_or_default(),
            &store,
            sender,
        )
    }

    /// Ends a live query.
    ///
    /// # Errors
    ///
    /// Returns `NotSubscribed` if the id is unknown, or `RealmClosed`.
    pub fn unsubscribe(&self, subscription_id: &str) -> CoreResult<()> {
        self.ensure_open()?;
        self.subscriptions.unsubscribe(subscription_id)
    }

    /// Returns true if the subscription id is live.
    #[must_use]
    pub fn is_subscribed(&self, subscription_id: &str) -> bool {
        self.subscriptions.contains(subscription_id)
    }

    /// Returns the number of live queries.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Rewrites the commit log as a single snapshot. No-op in memory.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInTransaction` while this thread has a write
    /// transaction open, `RealmClosed`, or a storage error.
    pub fn compact(&self) -> CoreResult<()> {
        self.ensure_open()?;
        self.engine.compact()
    }

    /// Returns the commit log size in bytes, `None` in memory.
    ///
    /// # Errors
    ///
    /// Returns `RealmClosed` or a storage error.
    pub fn log_size(&self) -> CoreResult<Option<u64>> {
        self.ensure_open()?;
        self.engine.log_size()
    }

    /// Closes this instance and drops its subscriptions.
    ///
    /// The shared store stays open while other instances use it.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.subscriptions.clear();
        self.engine.manager().observers().detach(&self.subscriptions);
        tracing::debug!(instance = %self.instance_id, "closed realm");
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("instance_id", &self.instance_id)
            .field("engine", &self.engine)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
