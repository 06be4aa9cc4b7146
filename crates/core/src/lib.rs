//! # evesso Core
//!
//! Token lifecycle logic with no infrastructure dependencies.
//!
//! This crate contains:
//! - The scope set matcher
//! - The storage contract (ports) the engine depends on
//! - PKCE challenge handling, token verification and the token source state
//!   machine
//!
//! ## Architecture Principles
//! - Depends only on `evesso-common` and `evesso-domain`
//! - No database or HTTP code; storage, token endpoint and key set are traits
//! - Time comes from an injected clock

pub mod scopes;
pub mod sso;
pub mod storage;

pub use scopes::{match_scopes, normalize_scopes};
pub use sso::{
    build_oauth_config, find_or_create_profile, KeySetProvider, OAuthClientConfig, PkceService,
    SsoContext, TokenEndpoint, TokenSource, TokenSourceStatus, TokenVerifier,
};
pub use storage::{
    AdvisoryGuard, AdvisoryLock, CharacterRepository, PkceRepository, ProfileRepository, SsoStore,
};
