//! The write transaction handle.

use crate::error::{CoreError, CoreResult};
use crate::query::Query;
use crate::record::{Record, ResultSet};
use crate::store::validate_class_name;
use crate::transaction::manager::{TransactionManager, WriterSlot};
use crate::transaction::state::Transaction;
use crate::types::{SequenceNumber, TransactionId};
use crate::value::{validate_fields, Fields, PrimaryKey, Value};

/// An open write transaction.
///
/// Holds the store's writer slot until it is committed, cancelled or
/// dropped. Reads through the transaction see its own pending writes.
///
/// ```rust
/// use realmkit_core::{Fields, RealmConfig, RealmRegistry};
///
/// let registry = RealmRegistry::new();
/// let realm = registry.open("main", RealmConfig::in_memory("txn-doc")).unwrap();
///
/// let mut txn = realm.begin_write().unwrap();
/// txn.create_object("Person", Some("a".into()), Fields::new()).unwrap();
/// txn.create_object("Person", Some("b".into()), Fields::new()).unwrap();
/// assert_eq!(txn.all_objects("Person").unwrap().len(), 2);
/// txn.commit().unwrap();
/// ```
pub struct WriteTransaction<'a> {
    _writer: WriterSlot<'a>,
    manager: &'a TransactionManager,
    txn: Transaction,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(
        writer: WriterSlot<'a>,
        manager: &'a TransactionManager,
        txn: Transaction,
    ) -> Self {
        Self {
            _writer: writer,
            manager,
            txn,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub const fn id(&self) -> TransactionId {
        self.txn.id()
    }

    /// Returns the committed sequence this transaction started from.
    #[must_use]
    pub const fn snapshot_seq(&self) -> SequenceNumber {
        self.txn.snapshot_seq()
    }

    /// Returns true if nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.txn.is_empty()
    }

    /// Creates a record.
    ///
    /// The primary key, if any, is also exposed as the configured
    /// primary-key field. A value for that field inside `fields` is ignored.
    ///
    /// # Errors
    ///
    /// - `InvalidClass` for a malformed class name
    /// - `UnsupportedType` if a field value cannot be stored
    /// - `DuplicateKey` if the class already holds the key
    pub fn create_object(
        &mut self,
        class: &str,
        primary_key: Option<PrimaryKey>,
        mut fields: Fields,
    ) -> CoreResult<Record> {
        self.txn.ensure_active()?;
        validate_class_name(class)?;
        validate_fields(&fields)?;

        let manager = self.manager;
        let key_field = manager.primary_key_field();
        fields.remove(key_field);
        if let Some(key) = &primary_key {
            if self.find(class, key)?.is_some() {
                return Err(CoreError::duplicate_key(class, key));
            }
            fields.insert(key_field.to_string(), Value::from(key.clone()));
        }

        let row = self.txn.allocate_row();
        let record = Record::new(class.to_string(), row, primary_key, fields);
        self.txn.put(record.clone());
        Ok(record)
    }

    /// Merges `fields` into the record stored under `key`.
    ///
    /// The primary-key field is never changed.
    ///
    /// # Errors
    ///
    /// - `InvalidClass` for a malformed class name
    /// - `UnsupportedType` if a field value cannot be stored
    /// - `NotFound` if no record has the key
    pub fn update_object(
        &mut self,
        class: &str,
        key: &PrimaryKey,
        fields: Fields,
    ) -> CoreResult<Record> {
        self.txn.ensure_active()?;
        validate_class_name(class)?;
        validate_fields(&fields)?;

        let mut record = self
            .find(class, key)?
            .ok_or_else(|| CoreError::not_found(class, key))?;
        let manager = self.manager;
        let key_field = manager.primary_key_field();
        for (name, value) in fields {
            if name == key_field {
                continue;
            }
            record.fields_mut().insert(name, value);
        }
        self.txn.put(record.clone());
        Ok(record)
    }

    /// Writes back a modified copy of a live record.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record was deleted
    /// - `InvalidOperation` if the row holds a record with another key
    /// - `UnsupportedType` if a field value cannot be stored
    pub fn save(&mut self, record: &Record) -> CoreResult<()> {
        self.txn.ensure_active()?;
        validate_fields(record.fields())?;
        let current = self.live(record)?;

        let mut saved = Record::new(
            current.class().to_string(),
            current.row_id(),
            current.primary_key().cloned(),
            record.fields().clone(),
        );
        let manager = self.manager;
        let key_field = manager.primary_key_field();
        match current.get(key_field) {
            Value::Null => saved.fields_mut().remove(key_field),
            value => saved.fields_mut().insert(key_field.to_string(), value.clone()),
        };
        self.txn.put(saved);
        Ok(())
    }

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the record was already deleted, or
    /// `InvalidOperation` if the row holds a record with another key.
    pub fn delete_object(&mut self, record: &Record) -> CoreResult<()> {
        self.txn.ensure_active()?;
        let current = self.live(record)?;
        self.txn.delete(&current);
        Ok(())
    }

    /// Deletes the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record has the key.
    pub fn delete_by_key(&mut self, class: &str, key: &PrimaryKey) -> CoreResult<()> {
        self.txn.ensure_active()?;
        let record = self
            .find(class, key)?
            .ok_or_else(|| CoreError::not_found(class, key))?;
        self.txn.delete(&record);
        Ok(())
    }

    /// Deletes every record of every class.
    ///
    /// # Errors
    ///
    /// Fails only if the transaction is no longer active.
    pub fn delete_all(&mut self) -> CoreResult<()> {
        self.txn.ensure_active()?;
        self.txn.clear();
        Ok(())
    }

    /// Looks up a record by primary key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClass` for a malformed class name.
    pub fn find(&self, class: &str, key: &PrimaryKey) -> CoreResult<Option<Record>> {
        validate_class_name(class)?;
        Ok(self.txn.find(&self.manager.store(), class, key))
    }

    /// Returns every record of a class, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClass` for a malformed class name.
    pub fn all_objects(&self, class: &str) -> CoreResult<ResultSet> {
        validate_class_name(class)?;
        Ok(self.txn.all_objects(&self.manager.store(), class))
    }

    /// Returns the records of a class matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClass` for a malformed class name.
    pub fn objects(&self, class: &str, query: &Query) -> CoreResult<ResultSet> {
        let mut results = self.all_objects(class)?;
        results.retain(|record| query.matches(record));
        Ok(results)
    }

    /// Commits the transaction, returning its sequence number.
    ///
    /// An empty transaction commits without logging or notifying and
    /// returns the current sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit log cannot be written. The
    /// transaction is cancelled in that case.
    pub fn commit(mut self) -> CoreResult<SequenceNumber> {
        self.manager.commit(&mut self.txn)
    }

    /// Discards every pending write.
    pub fn cancel(mut self) {
        self.abort("cancelled");
    }

    /// Returns the stored version of `record`, which must be the same row
    /// under the same primary key.
    fn live(&self, record: &Record) -> CoreResult<Record> {
        validate_class_name(record.class())?;
        let current = self
            .txn
            .get(&self.manager.store(), record.class(), record.row_id())
            .ok_or_else(|| CoreError::not_found(record.class(), record.row_id()))?;
        if current.primary_key() != record.primary_key() {
            return Err(CoreError::invalid_operation(format!(
                "{} in class '{}' is stored under a different primary key",
                record.row_id(),
                record.class()
            )));
        }
        Ok(current)
    }

    fn abort(&mut self, reason: &str) {
        if self.txn.is_active() {
            let pending = self.txn.pending_count();
            self.txn.mark_aborted();
            tracing::debug!(txn = %self.txn.id(), pending, reason, "transaction discarded");
        }
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        self.abort("dropped");
    }
}
