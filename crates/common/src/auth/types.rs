//! OAuth 2.0 token types
//!
//! Wire shapes for the token endpoint (RFC 6749 section 5) and the in-memory
//! [`TokenSet`] the token source hands out. Secrets are redacted from every
//! `Debug` rendering.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access and refresh token with expiry metadata.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// JWT access token for API authentication
    pub access_token: String,

    /// Refresh token used to mint the next access token
    pub refresh_token: String,

    /// Token type (always "Bearer" for EVE SSO)
    pub token_type: String,

    /// Absolute expiration timestamp, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Granted scopes (space-separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Build a token set from a token endpoint response received at
    /// `issued_at`.
    ///
    /// Providers may omit the refresh token on refresh; `previous_refresh`
    /// is kept in that case.
    #[must_use]
    pub fn from_response(
        response: TokenResponse,
        previous_refresh: Option<&str>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let expires_at = response
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime));
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh.map(str::to_owned))
            .unwrap_or_default();

        Self {
            access_token: response.access_token,
            refresh_token,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
            scope: response.scope,
        }
    }

    /// Rebuild a token set from persisted credentials.
    #[must_use]
    pub fn from_stored(
        access_token: Option<String>,
        refresh_token: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: access_token.unwrap_or_default(),
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_at,
            scope: None,
        }
    }

    /// True when an access token is present and does not expire within
    /// `leeway` of `now`. A token without a known expiry is never fresh.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        self.expires_at.is_some_and(|expires_at| now + leeway < expires_at)
    }

    /// `"<type> <access token>"`, suitable for an `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// OAuth token response from the authorization server
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// OAuth error response (RFC 6749 section 5.2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}
