//! Profile records
//!
//! A profile is the root aggregate that characters and PKCE records hang off.
//! It is created explicitly by the caller; the engine never creates one
//! implicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named owner of a set of characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    /// Unique across the store.
    pub name: String,
    /// Free-form caller payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// New, not yet persisted profile stamped at `now`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self { id: Uuid::new_v4(), name: name.into(), data, created_at: now, updated_at: now }
    }
}
