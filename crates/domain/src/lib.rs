//! # evesso Domain
//!
//! Domain types for the EVE SSO client.
//!
//! This crate contains:
//! - Persisted records (Profile, Character, PKCE record)
//! - Provider metadata and client credentials
//! - The six-kind error taxonomy and Result alias
//! - Configuration structures and protocol constants
//!
//! ## Architecture
//! - Depends only on `evesso-common` (foundation tier) for storage error
//!   kinds and error classification
//! - Pure data structures; no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::SsoConfig;
pub use errors::{ErrorKind, EvessoError, Result};
pub use types::*;
