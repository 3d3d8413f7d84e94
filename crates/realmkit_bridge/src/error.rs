//! Bridge error type.

use realmkit_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// Result type for bridge calls.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors returned to the caller of a bridge method.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The engine rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A required argument is missing or has the wrong shape.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The method is not handled by this bridge.
    #[error("method not implemented: {method}")]
    NotImplemented {
        /// Name of the method.
        method: String,
    },

    /// A background task failed before producing a result.
    #[error("background task failed: {message}")]
    Task {
        /// Description from the runtime.
        message: String,
    },
}

impl BridgeError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not implemented error.
    pub fn not_implemented(method: impl Into<String>) -> Self {
        Self::NotImplemented {
            method: method.into(),
        }
    }

    /// Returns the stable error code sent to callers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Core(err) => err.kind().code(),
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::NotImplemented { .. } => "NotImplemented",
            Self::Task { .. } => "Internal",
        }
    }

    /// Returns true if the caller sent something the bridge cannot act on.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. } | Self::NotImplemented { .. })
    }

    /// Converts the error into its wire payload.
    #[must_use]
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Error as sent back over the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}
