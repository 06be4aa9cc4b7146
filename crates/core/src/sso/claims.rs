//! Access token claims and verification
//!
//! EVE SSO access tokens are JWTs signed with a key from the provider's JWKS.
//! Verification selects the key by `kid`, checks the signature, `exp` (with
//! skew), `iss`, `azp` and the subject format. When the token belongs to a
//! known character the subject and owner must also match the stored row.

use evesso_domain::constants::{JWT_LEEWAY_SECS, SUBJECT_PREFIX};
use evesso_domain::{Character, CharacterIdentity, EvessoError, ProviderMetadata, Result};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::scopes::normalize_scopes;

/// Signature algorithms accepted from the provider.
const ACCEPTED_ALGORITHMS: [Algorithm; 5] =
    [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512, Algorithm::ES256, Algorithm::ES384];

/// Claims carried by an EVE SSO access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Granted scopes. The provider sends a bare string for a single scope.
    #[serde(deserialize_with = "deserialize_scopes")]
    pub scp: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// `CHARACTER:EVE:<character_id>`
    pub sub: String,
    pub azp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
    pub name: String,
    pub owner: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub iss: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    One(String),
    Many(Vec<String>),
}

fn deserialize_scopes<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ScopeClaim::deserialize(deserializer)? {
        ScopeClaim::One(scope) => normalize_scopes([scope]),
        ScopeClaim::Many(scopes) => normalize_scopes(scopes),
    })
}

impl AccessTokenClaims {
    /// External character id parsed from `sub`.
    ///
    /// # Errors
    /// [`EvessoError::Validation`] if `sub` is not `CHARACTER:EVE:<i32>`.
    pub fn character_id(&self) -> Result<i32> {
        self.sub
            .strip_prefix(SUBJECT_PREFIX)
            .and_then(|id| id.parse::<i32>().ok())
            .ok_or_else(|| EvessoError::Validation(format!("unexpected subject '{}'", self.sub)))
    }

    /// Id, name and owner as one value.
    ///
    /// # Errors
    /// [`EvessoError::Validation`] if the subject is malformed or the name or
    /// owner is empty.
    pub fn identity(&self) -> Result<CharacterIdentity> {
        let character_id = self.character_id()?;
        if self.name.is_empty() {
            return Err(EvessoError::Validation("token has no character name".into()));
        }
        if self.owner.is_empty() {
            return Err(EvessoError::Validation("token has no owner".into()));
        }
        Ok(CharacterIdentity {
            character_id,
            character_name: self.name.clone(),
            owner: self.owner.clone(),
        })
    }
}

/// Verifies access tokens against a key set and the claim contract.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    issuers: Vec<String>,
    client_id: String,
    leeway_secs: u64,
}

impl TokenVerifier {
    pub fn new(metadata: &ProviderMetadata, client_id: impl Into<String>) -> Self {
        Self {
            issuers: metadata.accepted_issuers(),
            client_id: client_id.into(),
            leeway_secs: JWT_LEEWAY_SECS,
        }
    }

    /// Override the `exp` skew allowance.
    #[must_use]
    pub const fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Verify signature, `exp`, `iss`, `azp` and the subject format.
    ///
    /// # Errors
    /// [`EvessoError::Validation`] on any failed check.
    pub fn verify(&self, token: &str, keys: &JwkSet) -> Result<AccessTokenClaims> {
        let header = decode_header(token)
            .map_err(|e| EvessoError::Validation(format!("malformed token header: {e}")))?;

        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            return Err(EvessoError::Validation(format!(
                "unsupported signing algorithm {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| EvessoError::Validation("token header has no kid".into()))?;
        let jwk = keys
            .find(kid)
            .ok_or_else(|| EvessoError::Validation(format!("no signing key with kid '{kid}'")))?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| EvessoError::Validation(format!("unusable signing key '{kid}': {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway_secs;
        validation.validate_aud = false;
        validation.set_issuer(&self.issuers);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let claims = decode::<AccessTokenClaims>(token, &key, &validation)
            .map_err(|e| {
                debug!(kid, error = %e, "claims.rejected");
                EvessoError::Validation(match e.kind() {
                    JwtErrorKind::ExpiredSignature => "token expired".to_string(),
                    JwtErrorKind::InvalidIssuer => "unexpected issuer".to_string(),
                    JwtErrorKind::InvalidSignature => "bad signature".to_string(),
                    _ => format!("token rejected: {e}"),
                })
            })?
            .claims;

        if claims.azp != self.client_id {
            return Err(EvessoError::Validation(format!(
                "token issued to '{}', expected '{}'",
                claims.azp, self.client_id
            )));
        }
        claims.character_id()?;

        Ok(claims)
    }

    /// [`TokenVerifier::verify`] plus subject and owner equality with a
    /// stored character.
    ///
    /// # Errors
    /// [`EvessoError::Validation`] on any failed check.
    pub fn verify_for(
        &self,
        token: &str,
        keys: &JwkSet,
        character: &Character,
    ) -> Result<AccessTokenClaims> {
        let claims = self.verify(token, keys)?;
        if claims.sub != character.subject() {
            return Err(EvessoError::Validation(format!(
                "subject '{}' does not match '{}'",
                claims.sub,
                character.subject()
            )));
        }
        if claims.owner != character.owner {
            return Err(EvessoError::Validation("owner hash changed".into()));
        }
        Ok(claims)
    }
}
