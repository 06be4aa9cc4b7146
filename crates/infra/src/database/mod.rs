//! SQLite storage backend

mod advisory_lock;
mod character_repository;
pub mod manager;
mod pkce_repository;
mod profile_repository;
pub mod sqlite_store;

pub use manager::{DbManager, SqliteConnection};
pub use sqlite_store::SqliteStore;
