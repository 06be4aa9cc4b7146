//! PKCE records
//!
//! One record per authorization attempt. Valid for five minutes, consumed
//! at most once by the callback, swept shortly after it expires.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted PKCE challenge bound to a profile and a requested scope set.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PkceRecord {
    pub id: Uuid,
    pub profile_id: Uuid,
    /// Unguessable callback binding.
    pub state: Uuid,
    pub code_verifier: String,
    pub code_challenge: String,
    /// Always `"S256"`.
    pub code_challenge_method: String,
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl PkceRecord {
    /// Instant after which the record no longer validates.
    #[must_use]
    pub fn expires_at(&self, validity: Duration) -> DateTime<Utc> {
        self.created_at + validity
    }

    /// True while `now` is inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, validity: Duration) -> bool {
        self.created_at > now - validity
    }
}

impl fmt::Debug for PkceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceRecord")
            .field("id", &self.id)
            .field("profile_id", &self.profile_id)
            .field("state", &self.state)
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .field("scopes", &self.scopes)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
