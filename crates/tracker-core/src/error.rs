//! Error types and result aliases for tracker.
//!
//! This module defines the shared error kinds used across all tracker
//! components. Every error carries the context a caller needs to act on it
//! (the lookup key that missed, the holder of a contested lock, the field
//! that failed validation).

use std::fmt;

/// The result type used throughout tracker.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tracker operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field was missing or an input value was malformed.
    #[error("{0}")]
    Validation(String),

    /// The requested resource does not match any lookup key.
    ///
    /// The message always names the key value that was looked up.
    #[error("{0}")]
    NotFound(String),

    /// The operation conflicts with existing state (lock already held,
    /// slack id already attached, duplicate catalog name).
    #[error("{0}")]
    Conflict(String),

    /// The document store failed or was unreachable.
    #[error("storage error: {message}")]
    Dependency {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An internal error that should not happen in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a validation error with the given message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a not-found error. The message must name the lookup key.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates a dependency error with the given message.
    #[must_use]
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a dependency error with a source cause.
    #[must_use]
    pub fn dependency_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Dependency {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl fmt::Display) -> Self {
        Self::Internal(message.to_string())
    }

    /// Returns true if this error is a conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true if this error is a not-found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_carries_key() {
        let err = Error::not_found("no event found in tracker for id abc-123");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("abc-123"));
    }

    #[test]
    fn conflict_is_conflict() {
        assert!(Error::conflict("already locked").is_conflict());
        assert!(!Error::validation("bad").is_conflict());
    }

    #[test]
    fn dependency_preserves_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::dependency_with_source("write failed", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
