//! Domain types and records

pub mod character;
pub mod pkce;
pub mod profile;
pub mod provider;

pub use character::{Character, CharacterIdentity, CharacterQuery, CharacterSelector};
pub use pkce::PkceRecord;
pub use profile::Profile;
pub use provider::{ClientCredentials, ProviderMetadata};
