//! # evesso Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - SQLite and in-memory storage backends
//! - The HTTP client, provider discovery, key set cache and token endpoint
//! - Configuration loading from the environment and files
//! - [`EveSso`], the engine facade that wires it all together
//!
//! ## Architecture
//! - Implements traits defined in `evesso-core`
//! - Depends on `evesso-common`, `evesso-domain` and `evesso-core`
//! - Contains all "impure" code (database, network, filesystem)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod memory;
pub mod sso;
pub mod store;

// Re-export commonly used items
pub use database::{DbManager, SqliteStore};
pub use errors::{http_error, storage_error, InfraError};
pub use http::{HttpClient, HttpClientBuilder};
pub use memory::MemoryStore;
pub use sso::{discover, EveSso, KeyManager, OAuthTokenClient};
pub use store::open_store;
pub use evesso_common::observability::{init_tracing, LogFormat};
