//! Character persistence for [`SqliteStore`]
//!
//! The natural key `(profile_id, character_id, character_name, owner,
//! scopes)` is a table constraint; scopes are stored as a sorted JSON array so
//! equal scope sets compare equal as text.

use async_trait::async_trait;
use evesso_common::storage::{StorageError, StorageResult};
use evesso_core::scopes::{match_scopes, normalize_scopes};
use evesso_core::storage::CharacterRepository;
use evesso_domain::{Character, CharacterQuery, CharacterSelector};
use rusqlite::{params, Row};
use tokio::task;
use uuid::Uuid;

use super::profile_repository::not_found_or;
use super::sqlite_store::{
    bool_to_int, int_to_bool, json_at, optional_json, optional_json_at, timestamp_at, to_millis,
    uuid_at, SqliteStore,
};
use crate::errors::storage_error;

const CHARACTER_COLUMNS: &str = "id, profile_id, character_id, character_name, owner, \
     access_token, refresh_token, scopes, reference_data, active, created_at, updated_at";

#[async_trait]
impl CharacterRepository for SqliteStore {
    async fn upsert_character(&self, character: &Character) -> StorageResult<Character> {
        let db = self.db.clone();
        let character = character.clone();
        let now = to_millis(self.clock.now());

        task::spawn_blocking(move || -> StorageResult<Character> {
            let conn = db.get_connection()?;
            let scopes = serde_json::to_string(&normalize_scopes(&character.scopes))?;
            let reference_data = optional_json(character.reference_data.as_ref())?;

            conn.query_row(
                &format!(
                    "INSERT INTO characters ({CHARACTER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11)
                     ON CONFLICT (profile_id, character_id, character_name, owner, scopes)
                     DO UPDATE SET
                         access_token = excluded.access_token,
                         refresh_token = excluded.refresh_token,
                         reference_data = COALESCE(excluded.reference_data, characters.reference_data),
                         active = 1,
                         updated_at = excluded.updated_at
                     RETURNING {CHARACTER_COLUMNS}"
                ),
                params![
                    character.id.to_string(),
                    character.profile_id.to_string(),
                    character.character_id,
                    character.character_name,
                    character.owner,
                    character.access_token,
                    character.refresh_token,
                    scopes,
                    reference_data,
                    to_millis(character.created_at),
                    now,
                ],
                map_character_row,
            )
            .map_err(storage_error)
        })
        .await
        .map_err(storage_error)?
    }

    async fn get_character(&self, id: Uuid) -> StorageResult<Character> {
        let db = self.db.clone();

        task::spawn_blocking(move || -> StorageResult<Character> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {CHARACTER_COLUMNS} FROM characters WHERE id = ?1"),
                params![id.to_string()],
                map_character_row,
            )
            .map_err(|e| not_found_or(e, || StorageError::not_found("character", id)))
        })
        .await
        .map_err(storage_error)?
    }

    async fn find_character(
        &self,
        profile_id: Uuid,
        query: &CharacterQuery,
    ) -> StorageResult<Character> {
        let db = self.db.clone();
        let query = query.clone();

        task::spawn_blocking(move || -> StorageResult<Character> {
            let conn = db.get_connection()?;
            let (by_id, by_name) = match &query.selector {
                CharacterSelector::Id(id) => (Some(*id), None),
                CharacterSelector::Name(name) => (None, Some(name.as_str())),
            };

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {CHARACTER_COLUMNS} FROM characters
                     WHERE profile_id = ?1
                       AND active = 1
                       AND (?2 IS NULL OR character_id = ?2)
                       AND (?3 IS NULL OR character_name = ?3)
                       AND (?4 IS NULL OR owner = ?4)
                     ORDER BY updated_at DESC, created_at DESC"
                ))
                .map_err(storage_error)?;
            let rows = stmt
                .query_map(
                    params![profile_id.to_string(), by_id, by_name, query.owner],
                    map_character_row,
                )
                .map_err(storage_error)?;

            for row in rows {
                let character = row.map_err(storage_error)?;
                if match_scopes(query.scopes.as_slice(), character.scopes.as_slice()) {
                    return Ok(character);
                }
            }
            Err(StorageError::not_found("character", &query.selector))
        })
        .await
        .map_err(storage_error)?
    }

    async fn list_characters(&self, profile_id: Uuid) -> StorageResult<Vec<Character>> {
        let db = self.db.clone();

        task::spawn_blocking(move || -> StorageResult<Vec<Character>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {CHARACTER_COLUMNS} FROM characters
                     WHERE profile_id = ?1
                     ORDER BY character_name, created_at"
                ))
                .map_err(storage_error)?;
            let rows = stmt
                .query_map(params![profile_id.to_string()], map_character_row)
                .map_err(storage_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_error)
        })
        .await
        .map_err(storage_error)?
    }

    async fn update_access_token(&self, id: Uuid, access_token: &str) -> StorageResult<()> {
        let access_token = access_token.to_string();
        self.update_column(id, "access_token = ?1", access_token).await
    }

    async fn update_refresh_token(&self, id: Uuid, refresh_token: &str) -> StorageResult<()> {
        let refresh_token = refresh_token.to_string();
        self.update_column(id, "refresh_token = ?1", refresh_token).await
    }

    async fn update_active(&self, id: Uuid, active: bool) -> StorageResult<()> {
        self.update_column(id, "active = ?1", bool_to_int(active)).await
    }

    async fn delete_character(&self, id: Uuid) -> StorageResult<()> {
        let db = self.db.clone();

        task::spawn_blocking(move || -> StorageResult<()> {
            let conn = db.get_connection()?;
            let affected = conn
                .execute("DELETE FROM characters WHERE id = ?1", params![id.to_string()])
                .map_err(storage_error)?;
            if affected == 0 {
                return Err(StorageError::not_found("character", id));
            }
            Ok(())
        })
        .await
        .map_err(storage_error)?
    }
}

impl SqliteStore {
    /// `UPDATE characters SET <assignment>, updated_at = now WHERE id = ?`.
    /// `assignment` binds its value as `?1`.
    async fn update_column<V>(
        &self,
        id: Uuid,
        assignment: &'static str,
        value: V,
    ) -> StorageResult<()>
    where
        V: rusqlite::ToSql + Send + 'static,
    {
        let db = self.db.clone();
        let now = to_millis(self.clock.now());

        task::spawn_blocking(move || -> StorageResult<()> {
            let conn = db.get_connection()?;
            let affected = conn
                .execute(
                    &format!("UPDATE characters SET {assignment}, updated_at = ?2 WHERE id = ?3"),
                    params![value, now, id.to_string()],
                )
                .map_err(storage_error)?;
            if affected == 0 {
                return Err(StorageError::not_found("character", id));
            }
            Ok(())
        })
        .await
        .map_err(storage_error)?
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn map_character_row(row: &Row<'_>) -> rusqlite::Result<Character> {
    Ok(Character {
        id: uuid_at(row, 0)?,
        profile_id: uuid_at(row, 1)?,
        character_id: row.get(2)?,
        character_name: row.get(3)?,
        owner: row.get(4)?,
        access_token: row.get(5)?,
        refresh_token: row.get(6)?,
        scopes: json_at(row, 7)?,
        reference_data: optional_json_at(row, 8)?,
        active: int_to_bool(row.get(9)?),
        created_at: timestamp_at(row, 10)?,
        updated_at: timestamp_at(row, 11)?,
    })
}
