//! Conversions from external infrastructure errors into evesso errors.
//!
//! Storage drivers collapse onto the four [`StorageError`] kinds; HTTP
//! failures become [`EvessoError`] values through the [`InfraError`] newtype.

use evesso_common::storage::StorageError;
use evesso_domain::EvessoError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub EvessoError);

impl From<InfraError> for EvessoError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<EvessoError> for InfraError {
    fn from(value: EvessoError) -> Self {
        InfraError(value)
    }
}

/// Conversion into one of the four storage error kinds.
pub trait IntoStorageError {
    fn into_storage(self) -> StorageError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → StorageError */
/* -------------------------------------------------------------------------- */

/// SQLITE_CONSTRAINT_UNIQUE
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;
/// SQLITE_CONSTRAINT_PRIMARYKEY
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;

impl IntoStorageError for SqlError {
    fn into_storage(self) -> StorageError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        StorageError::ConcurrentUpdate("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        StorageError::ConcurrentUpdate("database is locked".into())
                    }
                    (
                        ErrorCode::ConstraintViolation,
                        SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY,
                    ) => StorageError::UniqueViolation(message),
                    _ => StorageError::Io(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => StorageError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                StorageError::Io(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                StorageError::Io(format!("invalid column type: {ty}"))
            }
            other => StorageError::Io(other.to_string()),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error / JoinError → StorageError */
/* -------------------------------------------------------------------------- */

impl IntoStorageError for r2d2::Error {
    fn into_storage(self) -> StorageError {
        StorageError::Io(format!("connection pool: {self}"))
    }
}

impl IntoStorageError for JoinError {
    fn into_storage(self) -> StorageError {
        StorageError::Io(format!("blocking task failed: {self}"))
    }
}

/// `map_err` adapter for any [`IntoStorageError`] source.
pub fn storage_error<E: IntoStorageError>(err: E) -> StorageError {
    err.into_storage()
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → EvessoError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_timeout() {
            return InfraError(EvessoError::Timeout("HTTP request timed out".into()));
        }

        if value.is_connect() {
            return InfraError(EvessoError::Transient("HTTP connection failure".into()));
        }

        if let Some(status) = value.status() {
            return InfraError(EvessoError::Transient(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            )));
        }

        if value.is_decode() {
            return InfraError(EvessoError::Transient(format!("malformed response body: {value}")));
        }

        InfraError(EvessoError::Transient(value.to_string()))
    }
}

/// `map_err` adapter for reqwest failures.
pub fn http_error(err: HttpError) -> EvessoError {
    InfraError::from(err).into()
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
