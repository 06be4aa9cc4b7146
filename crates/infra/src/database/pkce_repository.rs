//! PKCE record persistence for [`SqliteStore`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evesso_common::storage::{StorageError, StorageResult};
use evesso_core::storage::PkceRepository;
use evesso_domain::PkceRecord;
use rusqlite::{params, Row};
use tokio::task;
use tracing::debug;
use uuid::Uuid;

use super::profile_repository::not_found_or;
use super::sqlite_store::{
    json_at, optional_json, optional_json_at, timestamp_at, to_millis, uuid_at, SqliteStore,
};
use crate::errors::storage_error;

const PKCE_COLUMNS: &str = "id, profile_id, state, code_verifier, code_challenge, \
     code_challenge_method, scopes, reference_data, created_at";

#[async_trait]
impl PkceRepository for SqliteStore {
    async fn create_pkce(&self, record: &PkceRecord) -> StorageResult<()> {
        let db = self.db.clone();
        let record = record.clone();

        task::spawn_blocking(move || -> StorageResult<()> {
            let conn = db.get_connection()?;
            let scopes = serde_json::to_string(&record.scopes)?;
            let reference_data = optional_json(record.reference_data.as_ref())?;
            conn.execute(
                &format!(
                    "INSERT INTO pkces ({PKCE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    record.id.to_string(),
                    record.profile_id.to_string(),
                    record.state.to_string(),
                    record.code_verifier,
                    record.code_challenge,
                    record.code_challenge_method,
                    scopes,
                    reference_data,
                    to_millis(record.created_at),
                ],
            )
            .map_err(storage_error)?;
            Ok(())
        })
        .await
        .map_err(storage_error)?
    }

    async fn get_pkce(&self, id: Uuid, not_before: DateTime<Utc>) -> StorageResult<PkceRecord> {
        let db = self.db.clone();

        task::spawn_blocking(move || -> StorageResult<PkceRecord> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {PKCE_COLUMNS} FROM pkces WHERE id = ?1 AND created_at > ?2"),
                params![id.to_string(), to_millis(not_before)],
                map_pkce_row,
            )
            .map_err(|e| not_found_or(e, || StorageError::not_found("pkce", id)))
        })
        .await
        .map_err(storage_error)?
    }

    async fn find_pkce(&self, state: Uuid, not_before: DateTime<Utc>) -> StorageResult<PkceRecord> {
        let db = self.db.clone();

        task::spawn_blocking(move || -> StorageResult<PkceRecord> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {PKCE_COLUMNS} FROM pkces WHERE state = ?1 AND created_at > ?2"),
                params![state.to_string(), to_millis(not_before)],
                map_pkce_row,
            )
            .map_err(|e| not_found_or(e, || StorageError::NotFound("pkce state".into())))
        })
        .await
        .map_err(storage_error)?
    }

    async fn destroy_pkce(&self, id: Uuid) -> StorageResult<()> {
        let db = self.db.clone();

        task::spawn_blocking(move || -> StorageResult<()> {
            let conn = db.get_connection()?;
            let affected = conn
                .execute("DELETE FROM pkces WHERE id = ?1", params![id.to_string()])
                .map_err(storage_error)?;
            if affected == 0 {
                return Err(StorageError::not_found("pkce", id));
            }
            Ok(())
        })
        .await
        .map_err(storage_error)?
    }

    async fn sweep_pkce(&self, older_than: DateTime<Utc>) -> StorageResult<u64> {
        let db = self.db.clone();

        task::spawn_blocking(move || -> StorageResult<u64> {
            let conn = db.get_connection()?;
            let removed = conn
                .execute("DELETE FROM pkces WHERE created_at < ?1", params![to_millis(older_than)])
                .map_err(storage_error)?;
            debug!(removed, "sqlite.pkce_swept");
            Ok(removed as u64)
        })
        .await
        .map_err(storage_error)?
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn map_pkce_row(row: &Row<'_>) -> rusqlite::Result<PkceRecord> {
    Ok(PkceRecord {
        id: uuid_at(row, 0)?,
        profile_id: uuid_at(row, 1)?,
        state: uuid_at(row, 2)?,
        code_verifier: row.get(3)?,
        code_challenge: row.get(4)?,
        code_challenge_method: row.get(5)?,
        scopes: json_at(row, 6)?,
        reference_data: optional_json_at(row, 7)?,
        created_at: timestamp_at(row, 8)?,
    })
}
