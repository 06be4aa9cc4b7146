//! PKCE (Proof Key for Code Exchange) primitives for OAuth 2.0
//!
//! Implements the S256 flavour of RFC 7636. The verifier is drawn from the
//! operating system CSPRNG; the state is an unguessable UUIDv4 that binds the
//! callback to the stored challenge.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// The only challenge method evesso emits.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Number of random bytes behind each code verifier.
pub const VERIFIER_BYTES: usize = 32;

/// PKCE generation failure.
#[derive(Debug, Error)]
pub enum PkceError {
    /// The operating system RNG refused to produce bytes.
    #[error("CSPRNG unavailable: {0}")]
    Entropy(String),
}

/// Generate a cryptographically secure code verifier
///
/// 32 bytes from the OS RNG, base64url encoded without padding
/// (43 characters).
///
/// # Errors
/// Returns [`PkceError::Entropy`] if the OS RNG fails.
pub fn generate_code_verifier() -> Result<String, PkceError> {
    let mut random_bytes = [0u8; VERIFIER_BYTES];
    OsRng.try_fill_bytes(&mut random_bytes).map_err(|e| PkceError::Entropy(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(random_bytes))
}

/// `BASE64URL(SHA256(ASCII(code_verifier)))`
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Fresh UUIDv4 state token.
#[must_use]
pub fn generate_state() -> Uuid {
    Uuid::new_v4()
}

/// Verifier, challenge and state for one authorization attempt.
#[derive(Clone)]
pub struct PkceChallenge {
    /// Kept secret until the token exchange.
    pub code_verifier: String,
    /// Sent in the authorization request.
    pub code_challenge: String,
    /// Echoed back by the provider on the callback.
    pub state: Uuid,
}

impl PkceChallenge {
    /// Generate a new challenge.
    ///
    /// ```
    /// use evesso_common::auth::pkce::{generate_code_challenge, PkceChallenge};
    ///
    /// let challenge = PkceChallenge::generate().unwrap();
    /// assert_eq!(challenge.code_verifier.len(), 43);
    /// assert_eq!(challenge.code_challenge, generate_code_challenge(&challenge.code_verifier));
    /// ```
    ///
    /// # Errors
    /// Returns [`PkceError::Entropy`] if the OS RNG fails.
    pub fn generate() -> Result<Self, PkceError> {
        let code_verifier = generate_code_verifier()?;
        let code_challenge = generate_code_challenge(&code_verifier);
        Ok(Self { code_verifier, code_challenge, state: generate_state() })
    }

    /// Always `"S256"`.
    #[must_use]
    pub const fn challenge_method(&self) -> &'static str {
        CODE_CHALLENGE_METHOD
    }
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .finish()
    }
}
