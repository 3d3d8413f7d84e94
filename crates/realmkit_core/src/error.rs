//! Error types for the realmkit core.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in realmkit core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record with the same primary key already exists in the class.
    #[error("duplicate primary key {key} in class '{class}'")]
    DuplicateKey {
        /// Class the record was created in.
        class: String,
        /// The conflicting key, rendered for display.
        key: String,
    },

    /// The addressed record does not exist (or was already deleted).
    #[error("object not found: {key} in class '{class}'")]
    NotFound {
        /// Class that was searched.
        class: String,
        /// Description of the missing record.
        key: String,
    },

    /// Class name is empty, too long, reserved or contains control characters.
    #[error("invalid class name '{name}': {reason}")]
    InvalidClass {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A value or operand has a type the store does not support.
    #[error("unsupported type: {message}")]
    UnsupportedType {
        /// Description of the offending value.
        message: String,
    },

    /// Predicate term names an operator the query engine does not know.
    #[error("unknown operator '{operator}'")]
    UnknownOperator {
        /// The operator name as received.
        operator: String,
    },

    /// Predicate is structurally malformed.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// A write transaction is already open on this store.
    #[error("a write transaction is already in progress")]
    AlreadyInTransaction,

    /// Subscription id is already in use on this instance.
    #[error("already subscribed: '{subscription_id}'")]
    AlreadySubscribed {
        /// The subscription id.
        subscription_id: String,
    },

    /// Subscription id is not registered on this instance.
    #[error("not subscribed: '{subscription_id}'")]
    NotSubscribed {
        /// The subscription id.
        subscription_id: String,
    },

    /// No realm instance is registered under the identifier.
    #[error("realm not found: '{instance_id}'")]
    InstanceNotFound {
        /// The instance identifier.
        instance_id: String,
    },

    /// The realm instance was closed.
    #[error("realm '{instance_id}' is closed")]
    RealmClosed {
        /// The instance identifier.
        instance_id: String,
    },

    /// Another process holds the store's file lock.
    #[error("store locked: another process has exclusive access to {path}")]
    StoreLocked {
        /// Path of the locked store.
        path: String,
    },

    /// The commit log is damaged beyond a torn tail.
    #[error("commit log corruption at offset {offset}: {message}")]
    Corruption {
        /// Byte offset of the bad record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(realmkit_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CBOR encoding or decoding failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

/// Stable classification of [`CoreError`] values.
///
/// The string form is what the bridge reports as the error `code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`CoreError::DuplicateKey`].
    DuplicateKey,
    /// See [`CoreError::NotFound`].
    NotFound,
    /// See [`CoreError::InvalidClass`].
    InvalidClass,
    /// See [`CoreError::UnsupportedType`].
    UnsupportedType,
    /// See [`CoreError::UnknownOperator`].
    UnknownOperator,
    /// See [`CoreError::InvalidQuery`].
    InvalidQuery,
    /// See [`CoreError::AlreadyInTransaction`].
    AlreadyInTransaction,
    /// See [`CoreError::AlreadySubscribed`].
    AlreadySubscribed,
    /// See [`CoreError::NotSubscribed`].
    NotSubscribed,
    /// See [`CoreError::InstanceNotFound`].
    InstanceNotFound,
    /// See [`CoreError::RealmClosed`].
    RealmClosed,
    /// See [`CoreError::StoreLocked`].
    StoreLocked,
    /// See [`CoreError::Corruption`].
    Corruption,
    /// Storage, I/O and codec failures.
    Storage,
    /// See [`CoreError::InvalidOperation`].
    InvalidOperation,
}

impl ErrorKind {
    /// Returns the stable code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DuplicateKey => "DuplicateKey",
            Self::NotFound => "NotFound",
            Self::InvalidClass => "InvalidClass",
            Self::UnsupportedType => "UnsupportedType",
            Self::UnknownOperator => "UnknownOperator",
            Self::InvalidQuery => "InvalidQuery",
            Self::AlreadyInTransaction => "AlreadyInTransaction",
            Self::AlreadySubscribed => "AlreadySubscribed",
            Self::NotSubscribed => "NotSubscribed",
            Self::InstanceNotFound => "InstanceNotFound",
            Self::RealmClosed => "RealmClosed",
            Self::StoreLocked => "StoreLocked",
            Self::Corruption => "Corruption",
            Self::Storage => "Storage",
            Self::InvalidOperation => "InvalidOperation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl CoreError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidClass { .. } => ErrorKind::InvalidClass,
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::UnknownOperator { .. } => ErrorKind::UnknownOperator,
            Self::InvalidQuery { .. } => ErrorKind::InvalidQuery,
            Self::AlreadyInTransaction => ErrorKind::AlreadyInTransaction,
            Self::AlreadySubscribed { .. } => ErrorKind::AlreadySubscribed,
            Self::NotSubscribed { .. } => ErrorKind::NotSubscribed,
            Self::InstanceNotFound { .. } => ErrorKind::InstanceNotFound,
            Self::RealmClosed { .. } => ErrorKind::RealmClosed,
            Self::StoreLocked { .. } => ErrorKind::StoreLocked,
            Self::Corruption { .. } => ErrorKind::Corruption,
            Self::Storage(_) | Self::Io(_) | Self::Codec { .. } => ErrorKind::Storage,
            Self::InvalidOperation { .. } => ErrorKind::InvalidOperation,
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(class: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::DuplicateKey {
            class: class.into(),
            key: key.to_string(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(class: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::NotFound {
            class: class.into(),
            key: key.to_string(),
        }
    }

    /// Creates an invalid class error.
    pub fn invalid_class(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidClass {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(message: impl Into<String>) -> Self {
        Self::UnsupportedType {
            message: message.into(),
        }
    }

    /// Creates an unknown operator error.
    pub fn unknown_operator(operator: impl Into<String>) -> Self {
        Self::UnknownOperator {
            operator: operator.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates an already subscribed error.
    pub fn already_subscribed(subscription_id: impl Into<String>) -> Self {
        Self::AlreadySubscribed {
            subscription_id: subscription_id.into(),
        }
    }

    /// Creates a not subscribed error.
    pub fn not_subscribed(subscription_id: impl Into<String>) -> Self {
        Self::NotSubscribed {
            subscription_id: subscription_id.into(),
        }
    }

    /// Creates an instance not found error.
    pub fn instance_not_found(instance_id: impl Into<String>) -> Self {
        Self::InstanceNotFound {
            instance_id: instance_id.into(),
        }
    }

    /// Creates a commit log corruption error.
    pub fn corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::Corruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl fmt::Display) -> Self {
        Self::Codec {
            message: message.to_string(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

impl From<realmkit_storage::StorageError> for CoreError {
    fn from(err: realmkit_storage::StorageError) -> Self {
        match err {
            realmkit_storage::StorageError::Locked { path } => Self::StoreLocked {
                path: path.display().to_string(),
            },
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn error_display() {
        let err = CoreError::duplicate_key("Person", "\"p-1\"");
        assert_eq!(
            err.to_string(),
            "duplicate primary key \"p-1\" in class 'Person'"
        );
    }

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(CoreError::AlreadyInTransaction.kind().code(), "AlreadyInTransaction");
        assert_eq!(
            CoreError::instance_not_found("x").kind(),
            ErrorKind::InstanceNotFound
        );
        assert_eq!(CoreError::codec("eof").kind(), ErrorKind::Storage);
    }

    #[test]
    fn storage_lock_maps_to_store_locked() {
        let err: CoreError = realmkit_storage::StorageError::Locked {
            path: PathBuf::from("/tmp/a.realm"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::StoreLocked);
    }
}
