//! Token source state machine
//!
//! One source serves one (profile, character, scope set). It loads the stored
//! character lazily, refreshes through the token endpoint, verifies every new
//! access token and writes rotated credentials back to storage.
//!
//! ```text
//!            load              refresh ok
//!   Empty ─────────► Loaded ───────────────► Valid ◄──┐
//!                      │                       │      │ refresh ok
//!                      │ invalid_grant         │ expired
//!                      ▼                       ▼      │
//!                   Degraded              (refresh) ──┘
//!                                              │ transport / validation / storage
//!                                              ▼
//!                                            Error
//! ```
//!
//! All transitions happen under one `tokio::sync::RwLock`. A refresh works on
//! a copy of the current state and stores the result at the end, so readers
//! only ever observe the state before or after a refresh.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use evesso_common::auth::TokenSet;
use evesso_domain::constants::TOKEN_EXPIRY_MARGIN_SECS;
use evesso_domain::{
    impl_wire_name_conversions, Character, CharacterQuery, CharacterSelector, EvessoError,
    PkceRecord, Result,
};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::config::OAuthClientConfig;
use super::context::SsoContext;
use crate::scopes::match_scopes;

/// Externally visible state of a token source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSourceStatus {
    /// No character loaded yet.
    Empty,
    /// Character loaded, no verified access token yet.
    Loaded,
    /// A refresh currently holds the lock.
    Refreshing,
    Valid,
    /// The provider rejected the refresh token; the character is inactive.
    Degraded,
    /// The last refresh failed for a transient, validation or storage reason.
    Error,
}

impl_wire_name_conversions!(TokenSourceStatus {
    Empty => "empty",
    Loaded => "loaded",
    Refreshing => "refreshing",
    Valid => "valid",
    Degraded => "degraded",
    Error => "error",
});

#[derive(Clone)]
struct Session {
    character: Character,
    token: TokenSet,
}

impl Session {
    fn from_character(character: Character) -> Self {
        let token = TokenSet::from_stored(
            character.access_token.clone(),
            character.refresh_token.clone(),
            None,
        );
        Self { character, token }
    }
}

#[derive(Clone)]
enum SourceState {
    Empty,
    Loaded(Session),
    Valid(Session),
    Degraded(Session, EvessoError),
    Failed(Session),
}

impl SourceState {
    const fn status(&self) -> TokenSourceStatus {
        match self {
            Self::Empty => TokenSourceStatus::Empty,
            Self::Loaded(_) => TokenSourceStatus::Loaded,
            Self::Valid(_) => TokenSourceStatus::Valid,
            Self::Degraded(..) => TokenSourceStatus::Degraded,
            Self::Failed(_) => TokenSourceStatus::Error,
        }
    }

    const fn session(&self) -> Option<&Session> {
        match self {
            Self::Empty => None,
            Self::Loaded(s) | Self::Valid(s) | Self::Degraded(s, _) | Self::Failed(s) => Some(s),
        }
    }
}

enum Refresh {
    Done(Session),
    TimedOut(Session, EvessoError),
    Rejected(Session, EvessoError),
    Failed(Session, EvessoError),
}

/// Token source for one character.
pub struct TokenSource {
    context: Arc<SsoContext>,
    oauth: OAuthClientConfig,
    profile_id: Uuid,
    query: CharacterQuery,
    state: RwLock<SourceState>,
}

impl TokenSource {
    /// Source that loads its character from storage on first use. The scope
    /// set is taken from `oauth`.
    pub fn new(
        context: Arc<SsoContext>,
        oauth: OAuthClientConfig,
        profile_id: Uuid,
        selector: CharacterSelector,
    ) -> Self {
        let query = CharacterQuery { selector, owner: None, scopes: oauth.scopes.clone() };
        Self { context, oauth, profile_id, query, state: RwLock::new(SourceState::Empty) }
    }

    /// Source pre-loaded with a known character.
    pub fn for_character(
        context: Arc<SsoContext>,
        oauth: OAuthClientConfig,
        character: Character,
    ) -> Self {
        let query = CharacterQuery::by_id(character.character_id, character.scopes.clone())
            .with_owner(character.owner.clone());
        Self {
            context,
            oauth,
            profile_id: character.profile_id,
            query,
            state: RwLock::new(SourceState::Loaded(Session::from_character(character))),
        }
    }

    #[must_use]
    pub const fn profile_id(&self) -> Uuid {
        self.profile_id
    }

    #[must_use]
    pub const fn query(&self) -> &CharacterQuery {
        &self.query
    }

    #[must_use]
    pub const fn oauth_config(&self) -> &OAuthClientConfig {
        &self.oauth
    }

    /// Current access token, refreshing it if it is missing or about to
    /// expire.
    ///
    /// # Errors
    /// - `NotFound` if no active character matches.
    /// - `Timeout` if a storage or provider call overran; state is kept.
    /// - `ProviderRejection` if the refresh token was rejected; the character
    ///   is marked inactive. If that write fails the row stays active and the
    ///   error description names the storage failure.
    /// - `Validation` if the new access token failed verification; nothing is
    ///   persisted.
    /// - `Transient` for other transport, provider or storage failures.
    #[instrument(
        skip(self),
        fields(profile_id = %self.profile_id, character = %self.query.selector)
    )]
    pub async fn token(&self) -> Result<TokenSet> {
        {
            let state = self.state.read().await;
            if let Some(token) = self.fresh_token(&state) {
                return Ok(token);
            }
        }

        let mut state = self.state.write().await;
        if let Some(token) = self.fresh_token(&state) {
            return Ok(token);
        }

        let (next, outcome) = self.advance(state.clone()).await;
        debug!(from = %state.status(), to = %next.status(), "token_source.transition");
        *state = next;
        outcome
    }

    /// True if [`TokenSource::token`] currently succeeds.
    pub async fn is_valid(&self) -> bool {
        self.token().await.is_ok()
    }

    /// `"Bearer <access token>"`.
    ///
    /// # Errors
    /// Same as [`TokenSource::token`].
    pub async fn authorization_header(&self) -> Result<String> {
        Ok(self.token().await?.authorization_header())
    }

    /// Loaded character, if any.
    pub async fn character(&self) -> Option<Character> {
        self.state.read().await.session().map(|s| s.character.clone())
    }

    /// Current state without waiting. Reports `Refreshing` while a refresh
    /// holds the lock.
    pub fn status(&self) -> TokenSourceStatus {
        self.state.try_read().map_or(TokenSourceStatus::Refreshing, |state| state.status())
    }

    /// Persist a new PKCE challenge for this source's profile and scopes and
    /// render the authorization URL for it.
    ///
    /// # Errors
    /// `Config` if the CSPRNG fails; storage errors otherwise.
    pub async fn authorization_url(
        &self,
        reference_data: Option<serde_json::Value>,
    ) -> Result<String> {
        let record = self
            .context
            .bounded(
                "create_pkce",
                self.context.pkce().create_challenge(
                    self.profile_id,
                    self.oauth.scopes.as_slice(),
                    reference_data,
                ),
            )
            .await?;
        Ok(self.oauth.authorization_url(&record))
    }

    /// Exchange an authorization code and upsert the resulting character.
    /// If the character is the one this source serves, the source becomes
    /// `Valid` with the new token.
    ///
    /// # Errors
    /// `Validation` if `pkce` belongs to another profile or the issued token
    /// fails verification; provider and storage errors otherwise.
    #[instrument(skip_all, fields(profile_id = %self.profile_id, pkce_id = %pkce.id))]
    pub async fn redeem(&self, code: &str, pkce: &PkceRecord) -> Result<Character> {
        if pkce.profile_id != self.profile_id {
            return Err(EvessoError::Validation("PKCE record belongs to another profile".into()));
        }

        let mut state = self.state.write().await;
        let (character, token) =
            redeem_authorization_code(&self.context, &self.oauth, code, pkce).await?;

        if self.query.selects(&character)
            && match_scopes(self.query.scopes.as_slice(), character.scopes.as_slice())
        {
            *state = SourceState::Valid(Session { character: character.clone(), token });
        }
        Ok(character)
    }

    fn fresh_token(&self, state: &SourceState) -> Option<TokenSet> {
        match state {
            SourceState::Valid(session)
                if session
                    .token
                    .is_fresh_at(self.context.now(), Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS)) =>
            {
                Some(session.token.clone())
            }
            _ => None,
        }
    }

    async fn advance(&self, current: SourceState) -> (SourceState, Result<TokenSet>) {
        let restore: fn(Session) -> SourceState = match &current {
            SourceState::Valid(_) => SourceState::Valid,
            SourceState::Failed(_) => SourceState::Failed,
            _ => SourceState::Loaded,
        };

        let session = match current {
            SourceState::Empty => match self.load().await {
                Ok(session) => session,
                Err(err) => return (SourceState::Empty, Err(err)),
            },
            SourceState::Degraded(session, rejection) => match self.load().await {
                Ok(reloaded) => reloaded,
                Err(EvessoError::NotFound(_)) => {
                    return (SourceState::Degraded(session, rejection.clone()), Err(rejection));
                }
                Err(err) => return (SourceState::Degraded(session, rejection), Err(err)),
            },
            SourceState::Loaded(session)
            | SourceState::Valid(session)
            | SourceState::Failed(session) => session,
        };

        match self.refresh(session).await {
            Refresh::Done(session) => {
                let token = session.token.clone();
                (SourceState::Valid(session), Ok(token))
            }
            Refresh::TimedOut(session, err) => (restore(session), Err(err)),
            Refresh::Rejected(session, err) => {
                (SourceState::Degraded(session, err.clone()), Err(err))
            }
            Refresh::Failed(session, err) => (SourceState::Failed(session), Err(err)),
        }
    }

    async fn load(&self) -> Result<Session> {
        let ctx = &self.context;
        ctx.bounded("get_profile", ctx.store().get_profile(self.profile_id)).await?;
        let character = ctx
            .bounded("find_character", ctx.store().find_character(self.profile_id, &self.query))
            .await?;
        debug!(character_id = character.character_id, "token_source.loaded");
        Ok(Session::from_character(character))
    }

    async fn refresh(&self, mut session: Session) -> Refresh {
        let ctx = &self.context;
        let character_id = session.character.character_id;

        let lease = match ctx.store().advisory_lock() {
            Some(lock) => {
                match ctx.bounded("advisory_lock", lock.acquire(i64::from(character_id))).await {
                    Ok(guard) => Some(guard),
                    Err(err) => return Self::interrupted(session, err),
                }
            }
            None => None,
        };

        // Another process may have refreshed while we waited for the lease.
        if lease.is_some() {
            let stored =
                ctx.bounded("get_character", ctx.store().get_character(session.character.id)).await;
            match stored {
                Ok(stored) if !stored.active => {
                    let err = EvessoError::rejection(
                        "invalid_grant",
                        Some("character was deactivated by a concurrent refresh".into()),
                    );
                    session.character = stored;
                    return Refresh::Rejected(session, err);
                }
                Ok(stored) if stored.refresh_token != session.character.refresh_token => {
                    debug!(character_id, "token_source.reconciled");
                    session = Session::from_character(stored);
                }
                Ok(_) => {}
                Err(err) => return Self::interrupted(session, err),
            }
        }

        let refresh_token = session.token.refresh_token.clone();
        let refreshed =
            ctx.bounded("token_refresh", ctx.endpoint().refresh(&self.oauth, &refresh_token)).await;
        let response = match refreshed {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return Refresh::TimedOut(session, err),
            Err(err) if err.is_definitive_rejection() => {
                warn!(character_id, error = %err, "token_source.rejected");
                let deactivate = ctx.store().update_active(session.character.id, false);
                let deactivated = ctx.bounded("update_active", deactivate).await;
                return match deactivated {
                    Ok(()) => {
                        session.character.active = false;
                        Refresh::Rejected(session, err)
                    }
                    Err(store_err) => {
                        error!(character_id, error = %store_err, "token_source.deactivate_failed");
                        Refresh::Rejected(session, with_deactivate_failure(err, &store_err))
                    }
                };
            }
            Err(EvessoError::ProviderRejection { code, description }) => {
                let detail = description.map(|d| format!(" ({d})")).unwrap_or_default();
                let err = EvessoError::Transient(format!("token refresh failed: {code}{detail}"));
                return Refresh::Failed(session, err);
            }
            Err(err) => return Refresh::Failed(session, err),
        };

        let mut token = TokenSet::from_response(response, Some(&refresh_token), ctx.now());
        let access_changed =
            token.access_token != session.character.access_token.as_deref().unwrap_or_default();
        let refresh_changed = token.refresh_token != session.character.refresh_token;

        if access_changed {
            let keys = match ctx.bounded("jwks", ctx.keys().keys()).await {
                Ok(keys) => keys,
                Err(err) => return Self::interrupted(session, err),
            };
            match ctx.verifier().verify_for(&token.access_token, &keys, &session.character) {
                Ok(claims) => {
                    token.expires_at =
                        DateTime::<Utc>::from_timestamp(claims.exp, 0).or(token.expires_at);
                }
                Err(err) => {
                    error!(character_id, error = %err, "token_source.validation_failed");
                    return Refresh::Failed(session, err);
                }
            }
        }

        let id = session.character.id;
        if refresh_changed {
            let update = ctx.store().update_refresh_token(id, &token.refresh_token);
            let persisted = ctx.bounded("update_refresh_token", update).await;
            if let Err(err) = persisted {
                error!(character_id, error = %err, "token_source.persist_failed");
                session.token = token;
                return Refresh::Failed(session, err);
            }
            session.character.refresh_token = token.refresh_token.clone();
        }
        if access_changed {
            let update = ctx.store().update_access_token(id, &token.access_token);
            let persisted = ctx.bounded("update_access_token", update).await;
            if let Err(err) = persisted {
                error!(character_id, error = %err, "token_source.persist_failed");
                session.token = token;
                return Refresh::Failed(session, err);
            }
            session.character.access_token = Some(token.access_token.clone());
        }

        info!(
            character_id,
            access_changed,
            refresh_changed,
            expires_at = ?token.expires_at,
            "token_source.refreshed"
        );
        session.token = token;
        Refresh::Done(session)
    }

    /// Storage or key fetch failure before the provider answered.
    fn interrupted(session: Session, err: EvessoError) -> Refresh {
        if err.is_timeout() {
            Refresh::TimedOut(session, err)
        } else {
            Refresh::Failed(session, err)
        }
    }
}

/// Note a failed deactivation on the provider rejection that caused it.
fn with_deactivate_failure(err: EvessoError, store_err: &EvessoError) -> EvessoError {
    match err {
        EvessoError::ProviderRejection { code, description } => {
            let note = format!("marking character inactive failed: {store_err}");
            let description = match description {
                Some(description) => format!("{description}; {note}"),
                None => note,
            };
            EvessoError::ProviderRejection { code, description: Some(description) }
        }
        other => other,
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("profile_id", &self.profile_id)
            .field("query", &self.query)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Exchange `code` for tokens, verify the access token and upsert the
/// character it names. This is the only path that creates characters.
///
/// # Errors
/// `Validation` if the token fails verification or no refresh token was
/// issued; provider and storage errors otherwise.
pub async fn redeem_authorization_code(
    context: &SsoContext,
    oauth: &OAuthClientConfig,
    code: &str,
    pkce: &PkceRecord,
) -> Result<(Character, TokenSet)> {
    let exchange = context.endpoint().exchange_code(oauth, code, &pkce.code_verifier);
    let response = context.bounded("code_exchange", exchange).await?;
    let keys = context.bounded("jwks", context.keys().keys()).await?;
    let claims = context.verifier().verify(&response.access_token, &keys)?;
    let identity = claims.identity()?;

    let now = context.now();
    let mut token = TokenSet::from_response(response, None, now);
    if token.refresh_token.is_empty() {
        return Err(EvessoError::Validation("provider issued no refresh token".into()));
    }
    token.expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).or(token.expires_at);

    let candidate = Character {
        id: Uuid::new_v4(),
        profile_id: pkce.profile_id,
        character_id: identity.character_id,
        character_name: identity.character_name,
        owner: identity.owner,
        access_token: Some(token.access_token.clone()),
        refresh_token: token.refresh_token.clone(),
        scopes: claims.scp,
        reference_data: pkce.reference_data.clone(),
        active: true,
        created_at: now,
        updated_at: now,
    };
    let stored = context
        .bounded("upsert_character", context.store().upsert_character(&candidate))
        .await?;

    info!(
        profile_id = %stored.profile_id,
        character_id = stored.character_id,
        scopes = stored.scopes.len(),
        "token_source.redeemed"
    );
    Ok((stored, token))
}
