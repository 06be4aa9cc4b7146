//! PKCE challenge lifecycle
//!
//! Challenges are persisted before the authorization URL leaves the process,
//! looked up by `state` inside a five minute window, destroyed on redemption
//! and swept one second after they expire.

use std::sync::Arc;

use chrono::Duration;
use evesso_common::auth::{PkceChallenge, CODE_CHALLENGE_METHOD};
use evesso_common::time::Clock;
use evesso_domain::constants::{PKCE_SWEEP_GRACE_SECS, PKCE_VALIDITY_SECS};
use evesso_domain::{EvessoError, PkceRecord, Result};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::scopes::normalize_scopes;
use crate::storage::SsoStore;

/// PKCE challenge service
pub struct PkceService {
    store: Arc<dyn SsoStore>,
    clock: Arc<dyn Clock>,
    validity: Duration,
    sweep_grace: Duration,
}

impl PkceService {
    pub fn new(store: Arc<dyn SsoStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            validity: Duration::seconds(PKCE_VALIDITY_SECS),
            sweep_grace: Duration::seconds(PKCE_SWEEP_GRACE_SECS),
        }
    }

    #[must_use]
    pub const fn validity(&self) -> Duration {
        self.validity
    }

    /// Generate and persist a challenge for `profile_id`.
    ///
    /// # Errors
    /// [`EvessoError::Config`] if the CSPRNG fails; storage errors otherwise.
    #[instrument(skip(self, scopes, reference_data))]
    pub async fn create_challenge<S: AsRef<str> + Sync>(
        &self,
        profile_id: Uuid,
        scopes: &[S],
        reference_data: Option<serde_json::Value>,
    ) -> Result<PkceRecord> {
        let challenge = PkceChallenge::generate()
            .map_err(|e| EvessoError::Config(format!("cannot generate PKCE verifier: {e}")))?;

        let record = PkceRecord {
            id: Uuid::new_v4(),
            profile_id,
            state: challenge.state,
            code_verifier: challenge.code_verifier,
            code_challenge: challenge.code_challenge,
            code_challenge_method: CODE_CHALLENGE_METHOD.to_string(),
            scopes: normalize_scopes(scopes),
            reference_data,
            created_at: self.clock.now(),
        };
        self.store.create_pkce(&record).await?;

        debug!(pkce_id = %record.id, state = %record.state, "pkce.created");
        Ok(record)
    }

    /// Record for `state` if it is still inside the validity window.
    ///
    /// A malformed state is treated like an unknown one.
    ///
    /// # Errors
    /// [`EvessoError::NotFound`] if absent, expired or malformed.
    pub async fn validate(&self, state: &str) -> Result<PkceRecord> {
        let state = Uuid::parse_str(state.trim())
            .map_err(|_| EvessoError::NotFound("pkce state".into()))?;
        let not_before = self.clock.now() - self.validity;
        Ok(self.store.find_pkce(state, not_before).await?)
    }

    /// Record by id if it is still inside the validity window.
    ///
    /// # Errors
    /// [`EvessoError::NotFound`] if absent or expired.
    pub async fn get(&self, id: Uuid) -> Result<PkceRecord> {
        let not_before = self.clock.now() - self.validity;
        Ok(self.store.get_pkce(id, not_before).await?)
    }

    /// Validate and destroy in one step. Only one caller can redeem a given
    /// state; every other caller sees `NotFound`.
    ///
    /// # Errors
    /// [`EvessoError::NotFound`] if absent, expired or already redeemed.
    #[instrument(skip(self, state))]
    pub async fn redeem_state(&self, state: &str) -> Result<PkceRecord> {
        let record = self.validate(state).await?;
        self.store.destroy_pkce(record.id).await.map_err(|e| {
            if e.is_not_found() {
                warn!(pkce_id = %record.id, "pkce.already_redeemed");
            }
            EvessoError::from(e)
        })?;
        debug!(pkce_id = %record.id, "pkce.redeemed");
        Ok(record)
    }

    /// Delete records older than the window plus grace. Returns the count.
    ///
    /// # Errors
    /// Storage errors.
    pub async fn sweep(&self) -> Result<u64> {
        let older_than = self.clock.now() - (self.validity + self.sweep_grace);
        let removed = self.store.sweep_pkce(older_than).await?;
        if removed > 0 {
            info!(removed, "pkce.swept");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for PkceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceService")
            .field("validity", &self.validity)
            .field("sweep_grace", &self.sweep_grace)
            .finish_non_exhaustive()
    }
}
