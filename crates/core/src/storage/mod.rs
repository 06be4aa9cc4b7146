//! Storage contract the SSO engine depends on.

pub mod ports;

pub use ports::{
    AdvisoryGuard, AdvisoryLock, CharacterRepository, PkceRepository, ProfileRepository, SsoStore,
};
