//! SQLite-backed [`SsoStore`]
//!
//! Repository traits are implemented in the sibling `*_repository` modules;
//! this module holds the store itself and the column codecs they share.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use evesso_common::storage::StorageResult;
use evesso_common::time::{Clock, SystemClock};
use evesso_core::storage::{AdvisoryLock, SsoStore};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::manager::DbManager;

/// SQLite storage backend with a lease-row advisory lock.
#[derive(Clone)]
pub struct SqliteStore {
    pub(crate) db: DbManager,
    pub(crate) clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open the database at `path` and apply the schema.
    ///
    /// # Errors
    /// `Io` if the file cannot be opened or the schema cannot be applied.
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> StorageResult<Self> {
        let db = DbManager::new(path, pool_size)?;
        db.run_migrations()?;
        Ok(Self::new(db))
    }

    /// Store over an already migrated database.
    pub fn new(db: DbManager) -> Self {
        Self { db, clock: Arc::new(SystemClock) }
    }

    /// Replace the clock used for row timestamps and lease expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub const fn db(&self) -> &DbManager {
        &self.db
    }
}

impl SsoStore for SqliteStore {
    fn advisory_lock(&self) -> Option<&dyn AdvisoryLock> {
        Some(self)
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("db", &self.db).finish_non_exhaustive()
    }
}

// =============================================================================
// Column codecs
// =============================================================================

pub(crate) fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp {millis} out of range").into(),
        )
    })
}

pub(crate) fn json_at<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn optional_json_at(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub(crate) fn optional_json(value: Option<&serde_json::Value>) -> StorageResult<Option<String>> {
    Ok(value.map(serde_json::to_string).transpose()?)
}

pub(crate) const fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) const fn int_to_bool(value: i64) -> bool {
    value != 0
}
