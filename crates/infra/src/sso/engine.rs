//! Engine facade
//!
//! [`EveSso`] wires discovery, the key manager, the token endpoint and a
//! storage backend into one [`SsoContext`] and hands out token sources over
//! it. Nothing here is global; every engine owns its own HTTP client, key
//! cache and configuration.

use std::sync::Arc;
use std::time::Duration;

use evesso_common::time::{Clock, SystemClock};
use evesso_core::sso::{
    build_oauth_config, redeem_authorization_code, KeySetProvider, OAuthClientConfig, SsoContext,
    TokenSource, TokenVerifier,
};
use evesso_core::storage::SsoStore;
use evesso_domain::{
    Character, CharacterSelector, PkceRecord, ProviderMetadata, Result, SsoConfig,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::discovery::discover;
use super::keys::KeyManager;
use super::oauth_client::OAuthTokenClient;
use crate::http::HttpClient;

/// One configured SSO engine.
pub struct EveSso {
    config: SsoConfig,
    metadata: ProviderMetadata,
    keys: Arc<KeyManager>,
    context: Arc<SsoContext>,
}

impl EveSso {
    /// Validate `config`, discover the provider and assemble the engine.
    ///
    /// # Errors
    /// [`EvessoError::Config`](evesso_domain::EvessoError::Config) if the
    /// configuration is invalid or discovery fails.
    pub async fn bootstrap(
        config: SsoConfig,
        store: Arc<dyn SsoStore>,
        http: HttpClient,
    ) -> Result<Self> {
        Self::bootstrap_with_clock(config, store, http, Arc::new(SystemClock)).await
    }

    /// [`EveSso::bootstrap`] with an injected clock.
    ///
    /// # Errors
    /// Same as [`EveSso::bootstrap`].
    #[instrument(skip_all, fields(issuer = %config.issuer))]
    pub async fn bootstrap_with_clock(
        config: SsoConfig,
        store: Arc<dyn SsoStore>,
        http: HttpClient,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let metadata = discover(&http, &config.discovery_url()).await?;

        let keys = Arc::new(KeyManager::new(
            http.clone(),
            metadata.jwks_uri.clone(),
            config.jwks_refresh_interval(),
        ));
        let key_provider: Arc<dyn KeySetProvider> = keys.clone();
        let verifier = TokenVerifier::new(&metadata, config.client_id.clone());
        let context = SsoContext::new(
            store,
            Arc::new(OAuthTokenClient::new(http)),
            key_provider,
            verifier,
        )
        .with_clock(clock)
        .with_operation_timeout(config.operation_timeout());

        info!(client_id = %config.client_id, "sso.bootstrapped");
        Ok(Self { config, metadata, keys, context: Arc::new(context) })
    }

    pub const fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    pub const fn config(&self) -> &SsoConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SsoStore> {
        self.context.store()
    }

    pub const fn context(&self) -> &Arc<SsoContext> {
        &self.context
    }

    pub const fn key_manager(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    /// Where the callback handler should send the browser after login.
    pub fn redirect_after_login(&self) -> Option<&str> {
        self.config.redirect_after_login.as_deref()
    }

    /// OAuth client configuration for `scopes`. No I/O.
    pub fn oauth_config<S: AsRef<str>>(&self, scopes: &[S]) -> OAuthClientConfig {
        build_oauth_config(&self.metadata, &self.config.credentials(), scopes)
    }

    /// Token source for the character called `character_name` in
    /// `profile_id`, holding exactly `scopes`.
    pub fn token_source<S: AsRef<str>>(
        &self,
        profile_id: Uuid,
        character_name: impl Into<String>,
        scopes: &[S],
    ) -> TokenSource {
        self.token_source_for(profile_id, CharacterSelector::Name(character_name.into()), scopes)
    }

    /// Token source selecting its character by id or name.
    pub fn token_source_for<S: AsRef<str>>(
        &self,
        profile_id: Uuid,
        selector: CharacterSelector,
        scopes: &[S],
    ) -> TokenSource {
        TokenSource::new(Arc::clone(&self.context), self.oauth_config(scopes), profile_id, selector)
    }

    /// Token source pre-loaded with a known character and its scope set.
    pub fn character_source(&self, character: &Character) -> TokenSource {
        TokenSource::for_character(
            Arc::clone(&self.context),
            self.oauth_config(character.scopes.as_slice()),
            character.clone(),
        )
    }

    /// Authorization URL for a persisted PKCE record.
    pub fn authorization_url(&self, pkce: &PkceRecord) -> String {
        self.oauth_config(pkce.scopes.as_slice()).authorization_url(pkce)
    }

    /// Persist a new PKCE challenge and return it with its authorization URL.
    ///
    /// # Errors
    /// `Config` if the CSPRNG fails; storage errors otherwise.
    pub async fn begin_authorization<S: AsRef<str> + Sync>(
        &self,
        profile_id: Uuid,
        scopes: &[S],
        reference_data: Option<serde_json::Value>,
    ) -> Result<(PkceRecord, String)> {
        let record = self
            .context
            .bounded(
                "create_pkce",
                self.context.pkce().create_challenge(profile_id, scopes, reference_data),
            )
            .await?;
        let url = self.authorization_url(&record);
        Ok((record, url))
    }

    /// Process the provider's redirect.
    ///
    /// The PKCE record is consumed before the token endpoint is contacted, so
    /// an unknown, expired or replayed `state` fails closed.
    ///
    /// # Errors
    /// - `NotFound` for an unknown, expired or already used `state`, or a
    ///   deleted profile.
    /// - `Validation` if the issued token fails verification.
    /// - Provider and storage errors otherwise.
    #[instrument(skip_all)]
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<Character> {
        let ctx = &self.context;
        let pkce = ctx.bounded("redeem_state", ctx.pkce().redeem_state(state)).await?;
        ctx.bounded("get_profile", ctx.store().get_profile(pkce.profile_id)).await?;

        let oauth = self.oauth_config(pkce.scopes.as_slice());
        let (character, _) = redeem_authorization_code(ctx, &oauth, code, &pkce).await?;

        if let Err(err) = ctx.bounded("pkce_sweep", ctx.pkce().sweep()).await {
            warn!(error = %err, "sso.sweep_failed");
        }
        Ok(character)
    }

    /// Sweep expired PKCE records every `interval` and keep the key set
    /// warm until `cancel` fires.
    pub fn start_maintenance(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let context = Arc::clone(&self.context);
        let jwks = Arc::clone(&self.keys).spawn_refresh(cancel.child_token());

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!("sso.maintenance_cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let swept = context.bounded("pkce_sweep", context.pkce().sweep()).await;
                        if let Err(err) = swept {
                            warn!(error = %err, "sso.sweep_failed");
                        }
                    }
                }
            }
            if let Err(err) = jwks.await {
                warn!(error = %err, "sso.jwks_task_failed");
            }
        })
    }
}

impl std::fmt::Debug for EveSso {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EveSso")
            .field("config", &self.config)
            .field("issuer", &self.metadata.issuer)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}
