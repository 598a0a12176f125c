//! Error taxonomy for the object-storage access layer.
//!
//! Remote failures collapse into a small set of classifications so the
//! host can pick a response status without inspecting SDK error types:
//! a missing object, any other upstream failure, a fatal configuration
//! problem, or a degenerate key.

use thiserror::Error;

/// Classified storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The remote store reported a 404-equivalent status for the key.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Any other remote failure: network, throttling, auth, malformed
    /// response. Carries the operation name for log context.
    #[error("upstream error in {context}: {message}")]
    Upstream {
        context: &'static str,
        message: String,
    },

    /// Invalid or contradictory setup. Fatal, surfaced to the operator
    /// rather than the end user, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A key that cleaned down to nothing.
    #[error("invalid object key: {0:?}")]
    InvalidKey(String),
}

impl StorageError {
    /// Wrap a remote failure with the operation it occurred in.
    pub fn upstream(context: &'static str, err: impl std::fmt::Display) -> Self {
        StorageError::Upstream {
            context,
            message: err.to_string(),
        }
    }

    /// Whether this error means the object simply was not there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
