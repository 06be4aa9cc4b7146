//! Provider adapters and the engine facade
//!
//! - [`discovery`]: one-shot metadata fetch
//! - [`keys`]: cached, background-refreshed JWKS
//! - [`oauth_client`]: token endpoint over HTTP
//! - [`engine`]: [`EveSso`], which wires the above to a storage backend

pub mod discovery;
pub mod engine;
pub mod keys;
pub mod oauth_client;

pub use discovery::discover;
pub use engine::EveSso;
pub use keys::KeyManager;
pub use oauth_client::OAuthTokenClient;
