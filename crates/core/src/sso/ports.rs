//! Port interfaces for the identity provider
//!
//! The token source talks to the provider only through these traits. HTTP
//! adapters live in `evesso-infra`.

use std::sync::Arc;

use async_trait::async_trait;
use evesso_common::auth::TokenResponse;
use evesso_domain::Result;
use jsonwebtoken::jwk::JwkSet;

use super::config::OAuthClientConfig;

/// OAuth 2.0 token endpoint.
///
/// Implementations report OAuth error bodies as
/// [`EvessoError::ProviderRejection`](evesso_domain::EvessoError::ProviderRejection),
/// deadline overruns as `Timeout` and everything else as `Transient`.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// `grant_type=authorization_code` with the PKCE verifier.
    async fn exchange_code(
        &self,
        config: &OAuthClientConfig,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse>;

    /// `grant_type=refresh_token`.
    async fn refresh(
        &self,
        config: &OAuthClientConfig,
        refresh_token: &str,
    ) -> Result<TokenResponse>;
}

/// Source of the provider's current signing keys.
#[async_trait]
pub trait KeySetProvider: Send + Sync {
    async fn keys(&self) -> Result<Arc<JwkSet>>;
}
