//! Profile persistence for [`SqliteStore`]

use async_trait::async_trait;
use evesso_common::storage::{StorageError, StorageResult};
use evesso_core::storage::ProfileRepository;
use evesso_domain::Profile;
use rusqlite::{params, Row};
use tokio::task;
use uuid::Uuid;

use super::sqlite_store::{
    optional_json, optional_json_at, timestamp_at, to_millis, uuid_at, SqliteStore,
};
use crate::errors::storage_error;

const PROFILE_COLUMNS: &str = "id, name, data, created_at, updated_at";

#[async_trait]
impl ProfileRepository for SqliteStore {
    async fn create_profile(&self, profile: &Profile) -> StorageResult<Profile> {
        let db = self.db.clone();
        let profile = profile.clone();

        task::spawn_blocking(move || -> StorageResult<Profile> {
            let conn = db.get_connection()?;
            let data = optional_json(profile.data.as_ref())?;
            conn.execute(
                "INSERT INTO profiles (id, name, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    profile.id.to_string(),
                    profile.name,
                    data,
                    to_millis(profile.created_at),
                    to_millis(profile.updated_at),
                ],
            )
            .map_err(storage_error)?;
            Ok(profile)
        })
        .await
        .map_err(storage_error)?
    }

    async fn get_profile(&self, id: Uuid) -> StorageResult<Profile> {
        let db = self.db.clone();

        task::spawn_blocking(move || -> StorageResult<Profile> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
                params![id.to_string()],
                map_profile_row,
            )
            .map_err(|e| not_found_or(e, || StorageError::not_found("profile", id)))
        })
        .await
        .map_err(storage_error)?
    }

    async fn find_profile(&self, name: &str) -> StorageResult<Profile> {
        let db = self.db.clone();
        let name = name.to_string();

        task::spawn_blocking(move || -> StorageResult<Profile> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE name = ?1"),
                params![&name],
                map_profile_row,
            )
            .map_err(|e| not_found_or(e, || StorageError::not_found("profile", &name)))
        })
        .await
        .map_err(storage_error)?
    }

    async fn delete_profile(&self, id: Uuid) -> StorageResult<()> {
        let db = self.db.clone();

        task::spawn_blocking(move || -> StorageResult<()> {
            let conn = db.get_connection()?;
            let affected = conn
                .execute("DELETE FROM profiles WHERE id = ?1", params![id.to_string()])
                .map_err(storage_error)?;
            if affected == 0 {
                return Err(StorageError::not_found("profile", id));
            }
            Ok(())
        })
        .await
        .map_err(storage_error)?
    }

    async fn list_profiles(&self) -> StorageResult<Vec<Profile>> {
        let db = self.db.clone();

        task::spawn_blocking(move || -> StorageResult<Vec<Profile>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY name"))
                .map_err(storage_error)?;
            let rows = stmt.query_map([], map_profile_row).map_err(storage_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_error)
        })
        .await
        .map_err(storage_error)?
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn map_profile_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        data: optional_json_at(row, 2)?,
        created_at: timestamp_at(row, 3)?,
        updated_at: timestamp_at(row, 4)?,
    })
}

/// Replace the driver's generic "no rows" with a message naming the entity.
pub(crate) fn not_found_or(
    err: rusqlite::Error,
    not_found: impl FnOnce() -> StorageError,
) -> StorageError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => not_found(),
        other => storage_error(other),
    }
}
