//! In-memory [`SsoStore`]
//!
//! Same contract as the SQLite backend, including the natural-key and
//! `state` uniqueness rules and the profile cascade. The advisory lock only
//! excludes other tasks in this process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evesso_common::storage::{StorageError, StorageResult};
use evesso_common::time::{Clock, SystemClock};
use evesso_core::scopes::{match_scopes, normalize_scopes};
use evesso_core::storage::{
    AdvisoryGuard, AdvisoryLock, CharacterRepository, PkceRepository, ProfileRepository, SsoStore,
};
use evesso_domain::{Character, CharacterQuery, PkceRecord, Profile};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    characters: HashMap<Uuid, Character>,
    pkces: HashMap<Uuid, PkceRecord>,
}

impl Tables {
    fn require_profile(&self, id: Uuid) -> StorageResult<()> {
        if self.profiles.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::Io(format!("foreign key violation: profile {id} does not exist")))
        }
    }
}

/// Process-local storage backend.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            locks: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for `updated_at` stamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("MemoryStore")
            .field("profiles", &tables.profiles.len())
            .field("characters", &tables.characters.len())
            .field("pkces", &tables.pkces.len())
            .finish()
    }
}

impl SsoStore for MemoryStore {
    fn advisory_lock(&self) -> Option<&dyn AdvisoryLock> {
        Some(self)
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn create_profile(&self, profile: &Profile) -> StorageResult<Profile> {
        let mut tables = self.tables.write();
        if tables.profiles.contains_key(&profile.id)
            || tables.profiles.values().any(|p| p.name == profile.name)
        {
            return Err(StorageError::UniqueViolation(format!("profile name '{}'", profile.name)));
        }
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile.clone())
    }

    async fn get_profile(&self, id: Uuid) -> StorageResult<Profile> {
        self.tables
            .read()
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("profile", id))
    }

    async fn find_profile(&self, name: &str) -> StorageResult<Profile> {
        self.tables
            .read()
            .profiles
            .values()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| StorageError::not_found("profile", name))
    }

    async fn delete_profile(&self, id: Uuid) -> StorageResult<()> {
        let mut tables = self.tables.write();
        if tables.profiles.remove(&id).is_none() {
            return Err(StorageError::not_found("profile", id));
        }
        tables.characters.retain(|_, c| c.profile_id != id);
        tables.pkces.retain(|_, p| p.profile_id != id);
        Ok(())
    }

    async fn list_profiles(&self) -> StorageResult<Vec<Profile>> {
        let mut profiles: Vec<Profile> = self.tables.read().profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }
}

#[async_trait]
impl CharacterRepository for MemoryStore {
    async fn upsert_character(&self, character: &Character) -> StorageResult<Character> {
        let now = self.clock.now();
        let scopes = normalize_scopes(&character.scopes);
        let mut tables = self.tables.write();
        tables.require_profile(character.profile_id)?;

        let existing = tables.characters.values_mut().find(|c| {
            c.profile_id == character.profile_id
                && c.character_id == character.character_id
                && c.character_name == character.character_name
                && c.owner == character.owner
                && c.scopes == scopes
        });
        if let Some(stored) = existing {
            stored.access_token.clone_from(&character.access_token);
            stored.refresh_token.clone_from(&character.refresh_token);
            if character.reference_data.is_some() {
                stored.reference_data.clone_from(&character.reference_data);
            }
            stored.active = true;
            stored.updated_at = now;
            return Ok(stored.clone());
        }

        if tables.characters.contains_key(&character.id) {
            return Err(StorageError::UniqueViolation(format!("character id {}", character.id)));
        }
        let stored = Character { scopes, active: true, updated_at: now, ..character.clone() };
        tables.characters.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_character(&self, id: Uuid) -> StorageResult<Character> {
        self.tables
            .read()
            .characters
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("character", id))
    }

    async fn find_character(
        &self,
        profile_id: Uuid,
        query: &CharacterQuery,
    ) -> StorageResult<Character> {
        self.tables
            .read()
            .characters
            .values()
            .filter(|c| {
                c.profile_id == profile_id
                    && c.active
                    && query.selects(c)
                    && match_scopes(query.scopes.as_slice(), c.scopes.as_slice())
            })
            .max_by_key(|c| (c.updated_at, c.created_at))
            .cloned()
            .ok_or_else(|| StorageError::not_found("character", &query.selector))
    }

    async fn list_characters(&self, profile_id: Uuid) -> StorageResult<Vec<Character>> {
        let mut characters: Vec<Character> = self
            .tables
            .read()
            .characters
            .values()
            .filter(|c| c.profile_id == profile_id)
            .cloned()
            .collect();
        characters.sort_by(|a, b| {
            a.character_name.cmp(&b.character_name).then(a.created_at.cmp(&b.created_at))
        });
        Ok(characters)
    }

    async fn update_access_token(&self, id: Uuid, access_token: &str) -> StorageResult<()> {
        self.update_character(id, |c| c.access_token = Some(access_token.to_string()))
    }

    async fn update_refresh_token(&self, id: Uuid, refresh_token: &str) -> StorageResult<()> {
        self.update_character(id, |c| c.refresh_token = refresh_token.to_string())
    }

    async fn update_active(&self, id: Uuid, active: bool) -> StorageResult<()> {
        self.update_character(id, |c| c.active = active)
    }

    async fn delete_character(&self, id: Uuid) -> StorageResult<()> {
        self.tables
            .write()
            .characters
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("character", id))
    }
}

impl MemoryStore {
    fn update_character(&self, id: Uuid, apply: impl FnOnce(&mut Character)) -> StorageResult<()> {
        let now = self.clock.now();
        let mut tables = self.tables.write();
        let character =
            tables.characters.get_mut(&id).ok_or_else(|| StorageError::not_found("character", id))?;
        apply(character);
        character.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl PkceRepository for MemoryStore {
    async fn create_pkce(&self, record: &PkceRecord) -> StorageResult<()> {
        let mut tables = self.tables.write();
        tables.require_profile(record.profile_id)?;
        if tables.pkces.contains_key(&record.id)
            || tables.pkces.values().any(|p| p.state == record.state)
        {
            return Err(StorageError::UniqueViolation(format!("pkce state {}", record.state)));
        }
        tables.pkces.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_pkce(&self, id: Uuid, not_before: DateTime<Utc>) -> StorageResult<PkceRecord> {
        self.tables
            .read()
            .pkces
            .get(&id)
            .filter(|p| p.created_at > not_before)
            .cloned()
            .ok_or_else(|| StorageError::not_found("pkce", id))
    }

    async fn find_pkce(&self, state: Uuid, not_before: DateTime<Utc>) -> StorageResult<PkceRecord> {
        self.tables
            .read()
            .pkces
            .values()
            .find(|p| p.state == state && p.created_at > not_before)
            .cloned()
            .ok_or_else(|| StorageError::NotFound("pkce state".into()))
    }

    async fn destroy_pkce(&self, id: Uuid) -> StorageResult<()> {
        self.tables
            .write()
            .pkces
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("pkce", id))
    }

    async fn sweep_pkce(&self, older_than: DateTime<Utc>) -> StorageResult<u64> {
        let mut tables = self.tables.write();
        let before = tables.pkces.len();
        tables.pkces.retain(|_, p| p.created_at >= older_than);
        Ok((before - tables.pkces.len()) as u64)
    }
}

#[async_trait]
impl AdvisoryLock for MemoryStore {
    async fn acquire(&self, key: i64) -> StorageResult<AdvisoryGuard> {
        let mutex = Arc::clone(self.locks.lock().entry(key).or_default());
        let held = mutex.lock_owned().await;
        Ok(AdvisoryGuard::new(key, move || drop(held)))
    }
}
