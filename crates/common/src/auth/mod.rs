//! OAuth 2.0 + PKCE primitives
//!
//! Provider-agnostic building blocks used by the SSO engine:
//!
//! - [`pkce`]: verifier/challenge/state generation (RFC 7636, S256 only)
//! - [`types`]: token endpoint wire shapes and the redacting [`TokenSet`]
//!
//! ```text
//! PkceChallenge::generate()          TokenResponse ──► TokenSet
//!   ├─ code_verifier  (secret)         (token endpoint)   (token source)
//!   ├─ code_challenge (authorize URL)
//!   └─ state          (callback binding)
//! ```

pub mod pkce;
pub mod types;

pub use pkce::{
    generate_code_challenge, generate_code_verifier, generate_state, PkceChallenge, PkceError,
    CODE_CHALLENGE_METHOD,
};
pub use types::{OAuthError, TokenResponse, TokenSet};
