//! Error types used throughout the SSO engine

use std::time::Duration;

use evesso_common::error::{ErrorClassification, ErrorSeverity};
use evesso_common::storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::DEFINITIVE_REJECTION_CODES;
use crate::impl_wire_name_conversions;

/// Main error type for evesso
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum EvessoError {
    /// Bootstrap or configuration failure. Fatal for the engine instance.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The provider answered with an OAuth error body.
    #[error("Provider rejected request: {code}{}", describe(.description))]
    ProviderRejection { code: String, description: Option<String> },

    /// A token failed signature or claim validation.
    #[error("Token validation failed: {0}")]
    Validation(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

fn describe(description: &Option<String>) -> String {
    description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
}

/// Result type alias for evesso operations
pub type Result<T> = std::result::Result<T, EvessoError>;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    NotFound,
    Conflict,
    ProviderRejection,
    Validation,
    Transient,
}

impl_wire_name_conversions!(ErrorKind {
    Configuration => "configuration",
    NotFound => "not_found",
    Conflict => "conflict",
    ProviderRejection => "provider_rejection",
    Validation => "validation",
    Transient => "transient",
});

impl EvessoError {
    /// Category of this error. [`EvessoError::Timeout`] is a transient kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::ProviderRejection { .. } => ErrorKind::ProviderRejection,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transient(_) | Self::Timeout(_) => ErrorKind::Transient,
        }
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// True for provider rejections that mean the refresh token is dead
    /// (`invalid_grant`, `invalid_token`).
    #[must_use]
    pub fn is_definitive_rejection(&self) -> bool {
        matches!(self, Self::ProviderRejection { code, .. }
            if DEFINITIVE_REJECTION_CODES.contains(&code.as_str()))
    }

    pub fn rejection(code: impl Into<String>, description: Option<String>) -> Self {
        Self::ProviderRejection { code: code.into(), description }
    }
}

impl From<StorageError> for EvessoError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::UniqueViolation(msg) => Self::Conflict(msg),
            StorageError::ConcurrentUpdate(msg) => {
                Self::Transient(format!("concurrent update: {msg}"))
            }
            StorageError::Io(msg) => Self::Transient(format!("storage: {msg}")),
        }
    }
}

impl ErrorClassification for EvessoError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound(_) => ErrorSeverity::Info,
            Self::Conflict(_)
            | Self::ProviderRejection { .. }
            | Self::Transient(_)
            | Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Config(_) => ErrorSeverity::Error,
            Self::Validation(_) => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for errors.
    use super::*;

    /// Validates `From<StorageError>` behavior for the storage mapping
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms each storage kind lands on the documented error kind.
    #[test]
    fn test_storage_error_mapping() {
        let cases = [
            (StorageError::NotFound("x".into()), ErrorKind::NotFound),
            (StorageError::UniqueViolation("x".into()), ErrorKind::Conflict),
            (StorageError::ConcurrentUpdate("x".into()), ErrorKind::Transient),
            (StorageError::Io("x".into()), ErrorKind::Transient),
        ];
        for (storage, kind) in cases {
            assert_eq!(EvessoError::from(storage).kind(), kind);
        }
    }

    /// Validates `EvessoError::is_definitive_rejection` behavior for the
    /// rejection code scenario.
    ///
    /// Assertions:
    /// - Ensures `invalid_grant` and `invalid_token` are definitive.
    /// - Ensures other provider errors are not.
    #[test]
    fn test_definitive_rejection_codes() {
        assert!(EvessoError::rejection("invalid_grant", None).is_definitive_rejection());
        assert!(EvessoError::rejection("invalid_token", None).is_definitive_rejection());
        assert!(!EvessoError::rejection("server_error", None).is_definitive_rejection());
        assert!(!EvessoError::Transient("invalid_grant".into()).is_definitive_rejection());
    }

    /// Validates `EvessoError::kind` behavior for the timeout scenario.
    ///
    /// Assertions:
    /// - Confirms a timeout is a transient kind but stays distinguishable.
    /// - Ensures validation failures are critical and not retryable.
    #[test]
    fn test_timeout_and_validation_classification() {
        let timeout = EvessoError::Timeout("refresh".into());
        assert_eq!(timeout.kind(), ErrorKind::Transient);
        assert!(timeout.is_timeout());
        assert!(timeout.is_retryable());

        let invalid = EvessoError::Validation("bad signature".into());
        assert!(invalid.is_critical());
        assert!(!invalid.is_retryable());
        assert_eq!(invalid.kind().to_string(), "validation");
    }

    /// Validates the rejection display scenario.
    ///
    /// Assertions:
    /// - Confirms the description is appended when present.
    #[test]
    fn test_rejection_display() {
        let err = EvessoError::rejection("invalid_grant", Some("expired".into()));
        assert_eq!(err.to_string(), "Provider rejected request: invalid_grant (expired)");
    }
}
