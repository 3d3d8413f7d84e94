//! Records and result sets.

use crate::error::CoreResult;
use crate::types::RowId;
use crate::value::{Fields, PrimaryKey, Value, NULL};
use serde::{Deserialize, Serialize};

/// Ordered snapshot of records, in insertion (row id) order.
pub type ResultSet = Vec<Record>;

/// A stored object: class, row id, optional primary key and fields.
///
/// A `Record` is a value, detached from the store. Mutating it does not
/// touch stored data; write it back through a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    class: String,
    row: RowId,
    primary_key: Option<PrimaryKey>,
    fields: Fields,
}

impl Record {
    /// Assembles a record. Callers must have validated `fields`.
    pub(crate) fn new(
        class: String,
        row: RowId,
        primary_key: Option<PrimaryKey>,
        fields: Fields,
    ) -> Self {
        Self {
            class,
            row,
            primary_key,
            fields,
        }
    }

    /// Returns the class name.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Returns the row id.
    #[must_use]
    pub const fn row_id(&self) -> RowId {
        self.row
    }

    /// Returns the primary key, if the record has one.
    #[must_use]
    pub const fn primary_key(&self) -> Option<&PrimaryKey> {
        self.primary_key.as_ref()
    }

    /// Returns a field value, `Null` if the field is absent.
    #[must_use]
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Returns true if the field is present (even if null).
    #[must_use]
    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Sets a field on this copy of the record.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` if the value cannot be stored.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> CoreResult<()> {
        let value = value.into();
        value.validate()?;
        self.fields.insert(field.into(), value);
        Ok(())
    }

    /// Returns all fields.
    #[must_use]
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Consumes the record, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }
}
