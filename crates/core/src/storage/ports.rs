//! Port interfaces for SSO persistence
//!
//! These traits define the boundary between the token lifecycle engine and
//! the storage backends. Every backend maps its native failures onto
//! [`StorageError`](evesso_common::storage::StorageError)'s four kinds.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evesso_common::storage::StorageResult;
use evesso_domain::{Character, CharacterQuery, PkceRecord, Profile};
use uuid::Uuid;

/// Profile persistence
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert a new profile. `UniqueViolation` if the name is taken.
    async fn create_profile(&self, profile: &Profile) -> StorageResult<Profile>;

    async fn get_profile(&self, id: Uuid) -> StorageResult<Profile>;

    /// Look up a profile by its unique name.
    async fn find_profile(&self, name: &str) -> StorageResult<Profile>;

    /// Delete a profile and, by cascade, its characters and PKCE records.
    async fn delete_profile(&self, id: Uuid) -> StorageResult<()>;

    async fn list_profiles(&self) -> StorageResult<Vec<Profile>>;
}

/// Character persistence
#[async_trait]
pub trait CharacterRepository: Send + Sync {
    /// Insert, or on a natural-key conflict update the tokens and
    /// re-activate the existing row. Returns the stored row.
    async fn upsert_character(&self, character: &Character) -> StorageResult<Character>;

    async fn get_character(&self, id: Uuid) -> StorageResult<Character>;

    /// Most recently updated active character in `profile_id` matching the
    /// query's selector, owner and scope set.
    async fn find_character(
        &self,
        profile_id: Uuid,
        query: &CharacterQuery,
    ) -> StorageResult<Character>;

    async fn list_characters(&self, profile_id: Uuid) -> StorageResult<Vec<Character>>;

    async fn update_access_token(&self, id: Uuid, access_token: &str) -> StorageResult<()>;

    async fn update_refresh_token(&self, id: Uuid, refresh_token: &str) -> StorageResult<()>;

    async fn update_active(&self, id: Uuid, active: bool) -> StorageResult<()>;

    async fn delete_character(&self, id: Uuid) -> StorageResult<()>;
}

/// PKCE record persistence
///
/// Window arithmetic stays with the caller: reads take the oldest acceptable
/// `created_at` (exclusive), the sweep takes the newest deletable one
/// (exclusive).
#[async_trait]
pub trait PkceRepository: Send + Sync {
    async fn create_pkce(&self, record: &PkceRecord) -> StorageResult<()>;

    /// `NotFound` unless the record exists and `created_at > not_before`.
    async fn get_pkce(&self, id: Uuid, not_before: DateTime<Utc>) -> StorageResult<PkceRecord>;

    /// `NotFound` unless a record with `state` exists and
    /// `created_at > not_before`.
    async fn find_pkce(&self, state: Uuid, not_before: DateTime<Utc>) -> StorageResult<PkceRecord>;

    /// Delete by id. `NotFound` if nothing was deleted, which makes
    /// redemption at-most-once.
    async fn destroy_pkce(&self, id: Uuid) -> StorageResult<()>;

    /// Delete every record with `created_at < older_than`. Returns the count.
    async fn sweep_pkce(&self, older_than: DateTime<Utc>) -> StorageResult<u64>;
}

/// Cross-process mutual exclusion keyed by EVE character id.
#[async_trait]
pub trait AdvisoryLock: Send + Sync {
    /// Wait until the lock for `key` is held. Released when the guard drops.
    async fn acquire(&self, key: i64) -> StorageResult<AdvisoryGuard>;
}

/// Held advisory lock.
pub struct AdvisoryGuard {
    key: i64,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl AdvisoryGuard {
    /// Guard that runs `release` exactly once when dropped.
    pub fn new(key: i64, release: impl FnOnce() + Send + 'static) -> Self {
        Self { key, release: Some(Box::new(release)) }
    }

    #[must_use]
    pub const fn key(&self) -> i64 {
        self.key
    }
}

impl Drop for AdvisoryGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for AdvisoryGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisoryGuard").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Complete storage backend.
///
/// Backends without cross-process locking return `None` from
/// [`SsoStore::advisory_lock`]; two processes refreshing the same character
/// can then race, and the loser's rotated refresh token is overwritten.
pub trait SsoStore: ProfileRepository + CharacterRepository + PkceRepository {
    fn advisory_lock(&self) -> Option<&dyn AdvisoryLock> {
        None
    }
}
