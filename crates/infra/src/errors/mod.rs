//! Infrastructure error conversions

mod conversions;

pub use conversions::{http_error, storage_error, InfraError, IntoStorageError};
