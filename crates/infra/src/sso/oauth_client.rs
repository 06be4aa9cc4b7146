//! Token endpoint adapter

use async_trait::async_trait;
use evesso_common::auth::{OAuthError, TokenResponse};
use evesso_core::sso::{OAuthClientConfig, TokenEndpoint};
use evesso_domain::{EvessoError, Result};
use tracing::{debug, instrument, warn};

use crate::errors::http_error;
use crate::http::HttpClient;

/// [`TokenEndpoint`] over HTTP. Client credentials travel in the form body.
#[derive(Debug, Clone)]
pub struct OAuthTokenClient {
    http: HttpClient,
}

impl OAuthTokenClient {
    pub const fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn request(
        &self,
        config: &OAuthClientConfig,
        grant_type: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse> {
        let response = self.http.post_form(config.token_endpoint.as_str(), form).await?;
        let status = response.status();

        if status.is_success() {
            let token = response.json::<TokenResponse>().await.map_err(http_error)?;
            debug!(grant_type, rotated = token.refresh_token.is_some(), "oauth.token_issued");
            return Ok(token);
        }

        let body = response.text().await.map_err(http_error)?;
        if status.is_client_error() {
            if let Ok(rejection) = serde_json::from_str::<OAuthError>(&body) {
                warn!(
                    grant_type,
                    status = status.as_u16(),
                    error = %rejection.error,
                    "oauth.rejected"
                );
                return Err(EvessoError::rejection(rejection.error, rejection.error_description));
            }
        }

        warn!(grant_type, status = status.as_u16(), "oauth.unexpected_status");
        Err(EvessoError::Transient(format!("token endpoint returned HTTP {status}")))
    }
}

#[async_trait]
impl TokenEndpoint for OAuthTokenClient {
    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        config: &OAuthClientConfig,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];
        self.request(config, "authorization_code", &form).await
    }

    #[instrument(skip_all)]
    async fn refresh(
        &self,
        config: &OAuthClientConfig,
        refresh_token: &str,
    ) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];
        self.request(config, "refresh_token", &form).await
    }
}
