//! Storage primitives shared by every persistence backend.

pub mod error;

pub use error::{StorageError, StorageResult};
