//! Provider metadata and client credentials

use std::fmt;

use serde::{Deserialize, Serialize};

/// OAuth 2.0 authorization server metadata (RFC 8414) as published by the
/// provider's discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub revocation_endpoint_auth_methods_supported: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_signing_alg_values_supported: Vec<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

impl ProviderMetadata {
    /// Issuer values a token from this provider may carry.
    ///
    /// EVE SSO tokens use the bare host as `iss` while the discovery document
    /// publishes an `https://` URL; both forms are accepted.
    #[must_use]
    pub fn accepted_issuers(&self) -> Vec<String> {
        let bare = self
            .issuer
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        let mut issuers = vec![bare.clone(), format!("https://{bare}")];
        if !issuers.contains(&self.issuer) {
            issuers.push(self.issuer.clone());
        }
        issuers
    }

    /// Whether the provider advertises S256 PKCE. An empty list is treated as
    /// "unspecified" and accepted.
    #[must_use]
    pub fn supports_s256(&self) -> bool {
        self.code_challenge_methods_supported.is_empty()
            || self.code_challenge_methods_supported.iter().any(|m| m == "S256")
    }
}

/// Registered application credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}
