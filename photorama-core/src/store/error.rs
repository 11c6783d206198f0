//! Errors raised by entity stores and their backends.

use thiserror::Error;

/// Boxed cause carried by [`StoreError::Io`].
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reading, mutating or committing entities.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A uniqueness or referential constraint rejected the change.
    #[error("constraint violated while trying to {operation}: {message}")]
    ConstraintViolation {
        /// Operation that was attempted.
        operation: &'static str,
        /// Description of the violated constraint.
        message: String,
    },
    /// The backing storage could not be read or written.
    #[error("storage failure while trying to {operation}: {source}")]
    Io {
        /// Operation that was attempted.
        operation: &'static str,
        /// Underlying storage error.
        #[source]
        source: BoxedSource,
    },
    /// The referenced entity does not exist in the view.
    #[error("no {entity} with key {key}")]
    NotFound {
        /// Kind of entity, such as `"photo"` or `"tag"`.
        entity: &'static str,
        /// Key that was looked up.
        key: String,
    },
    /// A persisted row could not be turned back into an entity.
    #[error("stored {entity} {key} is corrupt: {message}")]
    Corrupt {
        /// Kind of entity.
        entity: &'static str,
        /// Key of the offending row.
        key: String,
        /// What was wrong with it.
        message: String,
    },
}

impl StoreError {
    /// Wrap a storage failure.
    pub fn io(operation: &'static str, source: impl Into<BoxedSource>) -> Self {
        Self::Io {
            operation,
            source: source.into(),
        }
    }

    /// Whether repeating the same commit may succeed.
    ///
    /// Pending changes are kept after any failed commit, so a retry only
    /// needs another call to `commit`.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
