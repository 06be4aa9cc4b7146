//! JWKS key manager
//!
//! The provider's signing keys are cached for the refresh interval. Loads go
//! through `moka`'s `try_get_with`, so concurrent callers on a cold cache
//! share a single fetch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evesso_core::sso::KeySetProvider;
use evesso_domain::{EvessoError, Result};
use jsonwebtoken::jwk::JwkSet;
use moka::future::Cache;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::http::HttpClient;

const JWKS_CACHE_KEY: &str = "jwks";

/// Cached view of the provider's JWKS.
pub struct KeyManager {
    http: HttpClient,
    jwks_uri: String,
    refresh_interval: Duration,
    cache: Cache<&'static str, Arc<JwkSet>>,
}

impl KeyManager {
    pub fn new(http: HttpClient, jwks_uri: impl Into<String>, refresh_interval: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(refresh_interval).build();
        Self { http, jwks_uri: jwks_uri.into(), refresh_interval, cache }
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    pub const fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Fetch the key set now and replace the cached copy.
    ///
    /// # Errors
    /// `Timeout` or `Transient` if the fetch fails; the cached copy is kept.
    pub async fn refresh(&self) -> Result<Arc<JwkSet>> {
        let keys = self.fetch().await?;
        self.cache.insert(JWKS_CACHE_KEY, Arc::clone(&keys)).await;
        Ok(keys)
    }

    /// Refresh the key set every interval until `cancel` fires.
    pub fn spawn_refresh(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.refresh_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("jwks.refresh_cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = self.refresh().await {
                            warn!(error = %err, "jwks.refresh_failed");
                        }
                    }
                }
            }
        })
    }

    #[instrument(skip(self), fields(jwks_uri = %self.jwks_uri))]
    async fn fetch(&self) -> Result<Arc<JwkSet>> {
        let keys: JwkSet = self.http.get_json(self.jwks_uri.as_str()).await?;
        if keys.keys.is_empty() {
            return Err(EvessoError::Transient("provider published an empty key set".into()));
        }
        info!(keys = keys.keys.len(), "jwks.fetched");
        Ok(Arc::new(keys))
    }
}

#[async_trait]
impl KeySetProvider for KeyManager {
    async fn keys(&self) -> Result<Arc<JwkSet>> {
        self.cache
            .try_get_with(JWKS_CACHE_KEY, self.fetch())
            .await
            .map_err(|err: Arc<EvessoError>| (*err).clone())
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("jwks_uri", &self.jwks_uri)
            .field("refresh_interval", &self.refresh_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for sso::keys.
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn jwks() -> serde_json::Value {
        json!({"keys": [{
            "kty": "RSA", "alg": "RS256", "use": "sig", "kid": "JWT-Signature-Key",
            "n": "sSjFyOhIKBya1Pd9mAwcku4YbAgQdKDTd2xwuloW2jZErDwCL3vH79Vw-7lukKUAuREmua-w0ePj-3K2SRPDV2PEapRx0ALp9J4rRxP3vaB4AXdm5mzB2LYnwzQpq7hMBQqE0sbnMtiMG7NHPH1niBn4NuY8r8ZPQYqMq_3cw9LBhK-9xLbPVz6fpdsDxju6U3xT-cmtjrXpdnmuNwlOUSNhR9TW6TFIBla0s03HukMWsaoeTy0DqS9UM2N5ueoB6MUo_jqUYv2bOFV8HE7kSZDfmhixvV1axqUmYmIOFwnC4blR4QU7Yx0_coniz93urNzg3MAIP_XYDu-pYGRa8w",
            "e": "AQAB"
        }]})
    }

    /// Validates `KeyManager::keys` behavior for the concurrent cold load
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms eight concurrent callers trigger exactly one JWKS fetch.
    /// - Ensures every caller sees the signing key.
    #[tokio::test]
    async fn concurrent_cold_loads_share_one_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks())
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let manager = Arc::new(KeyManager::new(
            HttpClient::new().unwrap(),
            format!("{}/oauth/jwks", server.uri()),
            Duration::from_secs(300),
        ));

        let loads = (0..8).map(|_| {
            let manager = Arc::clone(&manager);
            async move { manager.keys().await }
        });
        let results = futures::future::join_all(loads).await;

        for result in results {
            assert!(result.unwrap().find("JWT-Signature-Key").is_some());
        }
    }

    /// Validates `KeyManager::keys` behavior for the failed fetch
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a 503 surfaces as `Transient`.
    /// - Ensures the next call fetches again and succeeds.
    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks()))
            .mount(&server)
            .await;

        let manager =
            KeyManager::new(HttpClient::new().unwrap(), server.uri(), Duration::from_secs(300));

        assert!(matches!(manager.keys().await, Err(EvessoError::Transient(_))));
        assert!(manager.keys().await.is_ok());
    }

    /// Validates `KeyManager::spawn_refresh` behavior for the cancellation
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the task refetches on its interval.
    /// - Ensures the task exits promptly once cancelled.
    #[tokio::test]
    async fn background_refresh_stops_on_cancel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks()))
            .mount(&server)
            .await;

        let manager = Arc::new(KeyManager::new(
            HttpClient::new().unwrap(),
            server.uri(),
            Duration::from_millis(20),
        ));
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&manager).spawn_refresh(cancel.clone());

        tokio::time::sleep(Duration::from_millis(70)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

        assert!(server.received_requests().await.unwrap().len() >= 2);
    }
}
