//! Provider metadata discovery (RFC 8414)

use evesso_domain::{EvessoError, ProviderMetadata, Result};
use tracing::{info, instrument};
use url::Url;

use crate::http::HttpClient;

/// Fetch and check the discovery document at `discovery_url`.
///
/// Any failure here is fatal for the engine instance and reported as
/// [`EvessoError::Config`].
///
/// # Errors
/// [`EvessoError::Config`] if the document cannot be fetched or decoded, an
/// endpoint is not a valid URL, or the provider does not offer S256 PKCE.
#[instrument(skip(http))]
pub async fn discover(http: &HttpClient, discovery_url: &str) -> Result<ProviderMetadata> {
    let url = Url::parse(discovery_url)
        .map_err(|e| EvessoError::Config(format!("invalid discovery URL '{discovery_url}': {e}")))?;

    let metadata: ProviderMetadata = http
        .get_json(url)
        .await
        .map_err(|e| EvessoError::Config(format!("provider discovery failed: {e}")))?;

    for (field, value) in [
        ("authorization_endpoint", &metadata.authorization_endpoint),
        ("token_endpoint", &metadata.token_endpoint),
        ("jwks_uri", &metadata.jwks_uri),
    ] {
        Url::parse(value).map_err(|e| {
            EvessoError::Config(format!("discovery document has invalid {field} '{value}': {e}"))
        })?;
    }
    if metadata.issuer.trim().is_empty() {
        return Err(EvessoError::Config("discovery document has no issuer".into()));
    }
    if !metadata.supports_s256() {
        return Err(EvessoError::Config("provider does not support S256 PKCE".into()));
    }

    info!(issuer = %metadata.issuer, token_endpoint = %metadata.token_endpoint, "sso.discovered");
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn document(base: &str) -> serde_json::Value {
        json!({
            "issuer": base,
            "authorization_endpoint": format!("{base}/v2/oauth/authorize"),
            "token_endpoint": format!("{base}/v2/oauth/token"),
            "jwks_uri": format!("{base}/oauth/jwks"),
            "response_types_supported": ["code", "token"],
            "code_challenge_methods_supported": ["S256"]
        })
    }

    #[tokio::test]
    async fn discovers_provider_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document(&server.uri())))
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::new().unwrap();
        let url = format!("{}/.well-known/oauth-authorization-server", server.uri());
        let metadata = discover(&http, &url).await.unwrap();

        assert_eq!(metadata.token_endpoint, format!("{}/v2/oauth/token", server.uri()));
        assert_eq!(metadata.response_types_supported, vec!["code", "token"]);
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_configuration_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let http = HttpClient::new().unwrap();
        let err = discover(&http, &server.uri()).await.unwrap_err();

        assert!(matches!(err, EvessoError::Config(_)));
    }

    #[tokio::test]
    async fn provider_without_s256_is_rejected() {
        let server = MockServer::start().await;
        let mut body = document(&server.uri());
        body["code_challenge_methods_supported"] = json!(["plain"]);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let http = HttpClient::new().unwrap();
        let err = discover(&http, &server.uri()).await.unwrap_err();

        assert!(err.to_string().contains("S256"));
    }
}
