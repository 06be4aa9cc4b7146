//! Character records
//!
//! A character row is the persisted credential for one EVE character under
//! one profile and one granted scope set. Rows are only created from a
//! successful code exchange and are never deleted implicitly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SUBJECT_PREFIX;

/// Persisted character credential.
///
/// Natural key: `(profile_id, character_id, character_name, owner, scopes)`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: Uuid,
    pub profile_id: Uuid,
    /// External EVE character id.
    pub character_id: i32,
    pub character_name: String,
    /// Owner hash issued by the provider. Changes when the character is
    /// transferred to another account.
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub refresh_token: String,
    /// Sorted.
    pub scopes: Vec<String>,
    /// Carried over from the PKCE record that created the row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_data: Option<serde_json::Value>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Character {
    /// JWT subject this character's tokens must carry.
    #[must_use]
    pub fn subject(&self) -> String {
        format!("{SUBJECT_PREFIX}{}", self.character_id)
    }

    /// The natural-key portion of this row.
    #[must_use]
    pub fn identity(&self) -> CharacterIdentity {
        CharacterIdentity {
            character_id: self.character_id,
            character_name: self.character_name.clone(),
            owner: self.owner.clone(),
        }
    }
}

impl fmt::Debug for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Character")
            .field("id", &self.id)
            .field("profile_id", &self.profile_id)
            .field("character_id", &self.character_id)
            .field("character_name", &self.character_name)
            .field("owner", &self.owner)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Identity claims extracted from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterIdentity {
    pub character_id: i32,
    pub character_name: String,
    pub owner: String,
}

/// How a token source names the character it serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterSelector {
    Id(i32),
    Name(String),
}

impl fmt::Display for CharacterSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={id}"),
            Self::Name(name) => write!(f, "name={name}"),
        }
    }
}

/// Lookup of an active character within one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterQuery {
    pub selector: CharacterSelector,
    /// Only rows with this owner, when known.
    pub owner: Option<String>,
    /// Must equal the stored scope set as a multiset.
    pub scopes: Vec<String>,
}

impl CharacterQuery {
    #[must_use]
    pub fn by_name(name: impl Into<String>, scopes: Vec<String>) -> Self {
        Self { selector: CharacterSelector::Name(name.into()), owner: None, scopes }
    }

    #[must_use]
    pub fn by_id(character_id: i32, scopes: Vec<String>) -> Self {
        Self { selector: CharacterSelector::Id(character_id), owner: None, scopes }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// True if `character` satisfies the selector and owner filters.
    /// Scope and `active` filtering are left to the caller.
    #[must_use]
    pub fn selects(&self, character: &Character) -> bool {
        let selected = match &self.selector {
            CharacterSelector::Id(id) => character.character_id == *id,
            CharacterSelector::Name(name) => character.character_name == *name,
        };
        selected && self.owner.as_ref().map_or(true, |owner| *owner == character.owner)
    }
}
