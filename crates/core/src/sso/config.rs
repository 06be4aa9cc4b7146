//! OAuth client configuration and authorization URL rendering

use std::fmt;

use evesso_common::auth::CODE_CHALLENGE_METHOD;
use evesso_domain::{ClientCredentials, PkceRecord, ProviderMetadata};

use crate::scopes::normalize_scopes;

/// Everything needed to talk to the provider's OAuth endpoints for one
/// scope set. Pure data; building one does no I/O.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Sorted.
    pub scopes: Vec<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

/// Combine discovered endpoints, registered credentials and a scope set.
#[must_use]
pub fn build_oauth_config<S: AsRef<str>>(
    metadata: &ProviderMetadata,
    credentials: &ClientCredentials,
    scopes: &[S],
) -> OAuthClientConfig {
    OAuthClientConfig {
        client_id: credentials.client_id.clone(),
        client_secret: credentials.client_secret.clone(),
        redirect_uri: credentials.callback_url.clone(),
        scopes: normalize_scopes(scopes),
        authorization_endpoint: metadata.authorization_endpoint.clone(),
        token_endpoint: metadata.token_endpoint.clone(),
    }
}

impl OAuthClientConfig {
    /// Authorization URL for `pkce`.
    ///
    /// Parameters are emitted in a fixed order: `response_type`, `client_id`,
    /// `redirect_uri`, `scope`, `state`, `code_challenge`,
    /// `code_challenge_method`, `access_type`.
    #[must_use]
    pub fn authorization_url(&self, pkce: &PkceRecord) -> String {
        let scope = self.scopes.join(" ");
        let state = pkce.state.to_string();
        let params = [
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", state.as_str()),
            ("code_challenge", pkce.code_challenge.as_str()),
            ("code_challenge_method", CODE_CHALLENGE_METHOD),
            ("access_type", "offline"),
        ];

        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let separator = if self.authorization_endpoint.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.authorization_endpoint)
    }
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for sso::config.
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn metadata() -> ProviderMetadata {
        ProviderMetadata {
            issuer: "https://login.eveonline.com".into(),
            authorization_endpoint: "https://login.eveonline.com/v2/oauth/authorize".into(),
            token_endpoint: "https://login.eveonline.com/v2/oauth/token".into(),
            jwks_uri: "https://login.eveonline.com/oauth/jwks".into(),
            revocation_endpoint: None,
            response_types_supported: vec![],
            revocation_endpoint_auth_methods_supported: vec![],
            token_endpoint_auth_methods_supported: vec![],
            token_endpoint_auth_signing_alg_values_supported: vec![],
            code_challenge_methods_supported: vec!["S256".into()],
        }
    }

    fn credentials() -> ClientCredentials {
        ClientCredentials {
            client_id: "client-123".into(),
            client_secret: "secret".into(),
            callback_url: "http://localhost:8080/callback".into(),
        }
    }

    fn record(state: Uuid) -> PkceRecord {
        PkceRecord {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            state,
            code_verifier: "verifier".into(),
            code_challenge: "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGUJpYL0bM".into(),
            code_challenge_method: "S256".into(),
            scopes: vec!["publicData".into()],
            reference_data: None,
            created_at: Utc::now(),
        }
    }

    /// Validates `build_oauth_config` behavior for the scope normalization
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms endpoints come from metadata and scopes are sorted.
    #[test]
    fn test_build_oauth_config() {
        let cfg = build_oauth_config(&metadata(), &credentials(), &["publicData", "esi-assets.read_assets.v1"]);
        assert_eq!(cfg.token_endpoint, "https://login.eveonline.com/v2/oauth/token");
        assert_eq!(cfg.scopes, vec!["esi-assets.read_assets.v1", "publicData"]);
        assert_eq!(cfg.redirect_uri, "http://localhost:8080/callback");
    }

    /// Validates `OAuthClientConfig::authorization_url` behavior for the
    /// parameter order scenario.
    ///
    /// Assertions:
    /// - Confirms the exact rendered URL including encoding and order.
    #[test]
    fn test_authorization_url_exact() {
        let state = Uuid::parse_str("6f1c1a36-3f0e-4f55-9b3f-0d8a9d3a2b10").unwrap();
        let cfg = build_oauth_config(&metadata(), &credentials(), &["publicData", "esi-skills.read_skills.v1"]);

        let url = cfg.authorization_url(&record(state));

        assert_eq!(
            url,
            "https://login.eveonline.com/v2/oauth/authorize?response_type=code\
             &client_id=client-123\
             &redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback\
             &scope=esi-skills.read_skills.v1%20publicData\
             &state=6f1c1a36-3f0e-4f55-9b3f-0d8a9d3a2b10\
             &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGUJpYL0bM\
             &code_challenge_method=S256\
             &access_type=offline"
        );
    }

    /// Validates the endpoint with existing query scenario.
    ///
    /// Assertions:
    /// - Ensures parameters are appended with `&` when the endpoint already
    ///   carries a query string.
    #[test]
    fn test_authorization_url_appends_to_existing_query() {
        let mut meta = metadata();
        meta.authorization_endpoint = "https://sso.example/authorize?realm=eve".into();
        let cfg = build_oauth_config(&meta, &credentials(), &["publicData"]);

        let url = cfg.authorization_url(&record(Uuid::new_v4()));
        assert!(url.starts_with("https://sso.example/authorize?realm=eve&response_type=code&"));
    }

    /// Validates the debug redaction scenario.
    ///
    /// Assertions:
    /// - Ensures the client secret is not rendered.
    #[test]
    fn test_debug_redacts_secret() {
        let cfg = build_oauth_config(&metadata(), &credentials(), &["publicData"]);
        assert!(!format!("{cfg:?}").contains("\"secret\""));
    }
}
