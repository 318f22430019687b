//! Storage error types for the configuration storage contract.
//!
//! Reading a name that does not exist is not an error; backends report it as
//! `None`. The variants here cover failures of the store itself.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend does not implement the requested operation.
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        /// Name of the operation that was refused.
        operation: String,
    },

    /// A payload could not be encoded or decoded.
    #[error("Codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// The backend failed to carry out an operation.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// The operation was refused because it would conflict with data the
    /// caller does not own.
    #[error("{message}")]
    Rejected {
        /// Description of the conflict, surfaced verbatim.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `Unsupported` error.
    #[must_use]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Creates a new `Codec` error.
    #[must_use]
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a new `Rejected` error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Returns `true` if the backend refused the operation as unsupported.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Returns `true` if this is a rejected (conflicting) operation.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unsupported { .. } => ErrorCategory::Unsupported,
            Self::Codec { .. } => ErrorCategory::Codec,
            Self::Backend { .. } => ErrorCategory::Backend,
            Self::Rejected { .. } => ErrorCategory::Conflict,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::codec(err.to_string())
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Operation not implemented by the backend.
    Unsupported,
    /// Serialization failure.
    Codec,
    /// Backend failure.
    Backend,
    /// Refused because of conflicting ownership.
    Conflict,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "unsupported"),
            Self::Codec => write!(f, "codec"),
            Self::Backend => write!(f, "backend"),
            Self::Conflict => write!(f, "conflict"),
        }
    }
}
