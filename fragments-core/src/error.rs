/*!
Error types for the fragment store.
*/

use fragments_retry::{RetryError, RetryableError};
use thiserror::Error;

/// Result type used throughout the fragment core.
pub type Result<T> = std::result::Result<T, FragmentError>;

/// Errors surfaced by stores, the fragment entity and the conversion engine.
///
/// Backend-specific detail (SDK error types, status codes) is flattened into
/// the message of one of these variants before it leaves a store.
#[derive(Error, Debug)]
pub enum FragmentError {
    /// Construction-time validation failures
    #[error("Validation error: {0}")]
    Validation(String),

    /// No metadata exists for the requested (owner, id) pair
    #[error("Fragment not found: {owner_id}/{id}")]
    NotFound { owner_id: String, id: String },

    /// Replacement data declared a different media type than the stored one
    #[error("Content-Type mismatch: fragment is {expected}, but request is {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Connectivity failure against a remote backend, eligible for retry
    #[error("Transient store error: {0}")]
    Transient(String),

    /// Transient failures persisted past the retry budget
    #[error("Store unavailable: '{operation}' failed after {attempts} attempts: {message}")]
    StoreUnavailable {
        operation: &'static str,
        attempts: usize,
        message: String,
    },

    /// Non-transient metadata backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Payload could not be written
    #[error("Unable to write fragment data: {0}")]
    DataWrite(String),

    /// Payload could not be read
    #[error("Unable to read fragment data: {0}")]
    DataRead(String),

    /// Target type is not in the native type's allowed set
    #[error("Conversion not supported: {from} -> {to}")]
    UnsupportedConversion { from: String, to: String },

    /// Allowed conversion attempted but the source could not be converted
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    /// Payload deletion failed; metadata was left in place
    #[error("Failed to delete fragment {owner_id}/{id}: {message}")]
    DeletionFailed {
        owner_id: String,
        id: String,
        message: String,
    },

    /// Payload was deleted but the metadata record could not be removed
    #[error("Partial deletion of fragment {owner_id}/{id}: data removed, metadata remains: {message}")]
    PartialDeletion {
        owner_id: String,
        id: String,
        message: String,
    },

    /// Logging or metrics could not be set up
    #[error("Observability error: {0}")]
    Observability(String),

    /// Metadata record (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FragmentError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    pub fn observability<S: Into<String>>(msg: S) -> Self {
        Self::Observability(msg.into())
    }

    /// Create a new transient store error
    pub fn transient<S: Into<String>>(msg: S) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a new conversion failure
    pub fn conversion_failed<S: Into<String>>(msg: S) -> Self {
        Self::ConversionFailed(msg.into())
    }

    pub fn not_found(owner_id: &str, id: &str) -> Self {
        Self::NotFound {
            owner_id: owner_id.to_string(),
            id: id.to_string(),
        }
    }

    pub fn unsupported_conversion<F: ToString, T: ToString>(from: F, to: T) -> Self {
        Self::UnsupportedConversion {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for failures caused by the request itself rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound { .. }
                | Self::TypeMismatch { .. }
                | Self::UnsupportedConversion { .. }
        )
    }

    /// Collapse a retry outcome back into the store taxonomy
    #[cfg_attr(not(feature = "aws"), allow(dead_code))]
    pub(crate) fn from_retry(err: RetryError<FragmentError>) -> Self {
        match err {
            RetryError::MaxRetriesExceeded {
                operation,
                attempts,
                error,
            } => Self::StoreUnavailable {
                operation,
                attempts,
                message: error.to_string(),
            },
            RetryError::Permanent { error, .. } => error,
        }
    }
}

impl RetryableError for FragmentError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
