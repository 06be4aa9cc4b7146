//! Storage error types
//!
//! Every persistence backend maps its native failures onto exactly these
//! four kinds. Callers never see driver-specific errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

/// Storage error type
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum StorageError {
    /// The requested row does not exist (or is outside its validity window).
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint (natural key, profile name, PKCE state) rejected the
    /// write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The backend refused the write because of concurrent access (busy,
    /// locked, serialization failure).
    #[error("Concurrent update: {0}")]
    ConcurrentUpdate(String),

    /// Anything else: I/O, pool, encoding.
    #[error("Storage I/O error: {0}")]
    Io(String),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Shorthand for a [`StorageError::NotFound`] naming the entity and key.
    pub fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {key}"))
    }

    /// Returns true for [`StorageError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(format!("JSON encoding failed: {err}"))
    }
}

impl ErrorClassification for StorageError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentUpdate(_) | Self::Io(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound(_) => ErrorSeverity::Info,
            Self::UniqueViolation(_) | Self::ConcurrentUpdate(_) => ErrorSeverity::Warning,
            Self::Io(_) => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ConcurrentUpdate(_) => Some(Duration::from_millis(50)),
            _ => None,
        }
    }
}
