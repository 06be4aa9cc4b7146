//! EVE SSO token lifecycle
//!
//! - [`config`]: OAuth client configuration and authorization URLs
//! - [`claims`]: access token verification
//! - [`pkce`]: PKCE challenge lifecycle
//! - [`token_source`]: the per-character state machine
//! - [`ports`]: token endpoint and key set seams

pub mod claims;
pub mod config;
pub mod context;
pub mod pkce;
pub mod ports;
pub mod profiles;
pub mod token_source;

pub use claims::{AccessTokenClaims, TokenVerifier};
pub use config::{build_oauth_config, OAuthClientConfig};
pub use context::SsoContext;
pub use pkce::PkceService;
pub use ports::{KeySetProvider, TokenEndpoint};
pub use profiles::find_or_create_profile;
pub use token_source::{redeem_authorization_code, TokenSource, TokenSourceStatus};
