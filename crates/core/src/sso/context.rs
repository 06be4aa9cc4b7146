//! Collaborators shared by every token source of one engine instance

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use evesso_common::time::{Clock, SystemClock};
use evesso_domain::constants::DEFAULT_OPERATION_TIMEOUT_SECS;
use evesso_domain::{EvessoError, Result};
use tracing::warn;

use super::claims::TokenVerifier;
use super::pkce::PkceService;
use super::ports::{KeySetProvider, TokenEndpoint};
use crate::storage::SsoStore;

/// Shared engine state. Cheap to share behind an `Arc`.
pub struct SsoContext {
    store: Arc<dyn SsoStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    keys: Arc<dyn KeySetProvider>,
    verifier: TokenVerifier,
    clock: Arc<dyn Clock>,
    pkce: Arc<PkceService>,
    operation_timeout: Duration,
}

impl SsoContext {
    pub fn new(
        store: Arc<dyn SsoStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        keys: Arc<dyn KeySetProvider>,
        verifier: TokenVerifier,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let pkce = Arc::new(PkceService::new(Arc::clone(&store), Arc::clone(&clock)));
        Self {
            store,
            endpoint,
            keys,
            verifier,
            clock,
            pkce,
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
        }
    }

    /// Replace the clock used for timestamps, PKCE windows and expiry checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.pkce = Arc::new(PkceService::new(Arc::clone(&self.store), Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    /// Upper bound for each storage and provider call made by a token source.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn SsoStore> {
        &self.store
    }

    pub fn endpoint(&self) -> &dyn TokenEndpoint {
        self.endpoint.as_ref()
    }

    pub fn keys(&self) -> &dyn KeySetProvider {
        self.keys.as_ref()
    }

    pub const fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn pkce(&self) -> &Arc<PkceService> {
        &self.pkce
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub const fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Run `fut` under the operation timeout. An overrun becomes
    /// [`EvessoError::Timeout`]; the future is dropped.
    pub async fn bounded<T, E, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<EvessoError>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "sso.operation_timeout"
                );
                Err(EvessoError::Timeout(format!(
                    "{operation} exceeded {}ms",
                    self.operation_timeout.as_millis()
                )))
            }
        }
    }
}

impl std::fmt::Debug for SsoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsoContext")
            .field("verifier", &self.verifier)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}
