//! Core error taxonomy
//!
//! Every failure aborts the enclosing transaction. The transport collaborator
//! maps these to status codes; this layer never retries.

use crate::events::{EventKind, ShortCircuit};
use crate::storage::{StorageError, StorageResult};
use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the object/type core
#[derive(Debug, Error)]
pub enum CoreError {
    /// An id or URI did not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// Contradictory construction, duplicate keys or a violated invariant
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A value's runtime kind disagrees with the declared data type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Wrapped storage collaborator failure
    #[error("Storage error while {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: StorageError,
    },

    /// An entity is not representable on the wire
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A lifecycle listener failed
    #[error("Listener \"{listener}\" failed on {event}: {source}")]
    Listener {
        listener: String,
        event: EventKind,
        #[source]
        source: anyhow::Error,
    },

    /// A listener asked the transport to answer with a specific non-error response
    #[error("Short-circuit response: {0}")]
    ShortCircuit(ShortCircuit),

    /// The request worker died before producing a result
    #[error("Request aborted: {0}")]
    RequestAborted(String),
}

impl CoreError {
    /// Shorthand for a type mismatch
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        CoreError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Whether this error is the listener short-circuit
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, CoreError::ShortCircuit(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

/// Adds context to storage failures.
///
/// A storage `NotFound` surfaces as [`CoreError::NotFound`]; everything else
/// is wrapped as [`CoreError::Storage`].
pub(crate) trait StorageContext<T> {
    fn with_context<F>(self, context: F) -> CoreResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> StorageContext<T> for StorageResult<T> {
    fn with_context<F>(self, context: F) -> CoreResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| match err {
            StorageError::NotFound { kind, key } => CoreError::NotFound(format!("{kind} {key}")),
            other => CoreError::Storage {
                context: context(),
                source: other,
            },
        })
    }
}
