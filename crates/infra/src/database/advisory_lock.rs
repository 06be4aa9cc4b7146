//! Lease-row advisory lock for [`SqliteStore`]
//!
//! Holding the lock means owning the `advisory_locks` row for the key. A
//! lease that outlives its expiry (crashed holder) is reclaimed by the next
//! acquirer. Every process sharing the database file sees the same rows.

use std::time::Duration;

use async_trait::async_trait;
use evesso_common::storage::{StorageError, StorageResult};
use evesso_core::storage::{AdvisoryGuard, AdvisoryLock};
use rusqlite::params;
use tokio::task;
use tracing::{debug, warn};
use uuid::Uuid;

use super::manager::DbManager;
use super::sqlite_store::{to_millis, SqliteStore};
use crate::errors::storage_error;

/// How long a lease stays valid without being released.
const LEASE_TTL: Duration = Duration::from_secs(60);

/// Delay between attempts while another holder owns the lease.
const RETRY_INTERVAL: Duration = Duration::from_millis(25);

#[async_trait]
impl AdvisoryLock for SqliteStore {
    async fn acquire(&self, key: i64) -> StorageResult<AdvisoryGuard> {
        let holder = Uuid::new_v4().to_string();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let db = self.db.clone();
            let now = to_millis(self.clock.now());
            let expires_at = now + LEASE_TTL.as_millis() as i64;
            let lease_holder = holder.clone();

            let outcome = task::spawn_blocking(move || -> StorageResult<()> {
                let conn = db.get_connection()?;
                let reclaimed = conn
                    .execute(
                        "DELETE FROM advisory_locks WHERE lock_key = ?1 AND expires_at < ?2",
                        params![key, now],
                    )
                    .map_err(storage_error)?;
                if reclaimed > 0 {
                    warn!(key, "sqlite.lease_reclaimed");
                }
                conn.execute(
                    "INSERT INTO advisory_locks (lock_key, holder, expires_at) VALUES (?1, ?2, ?3)",
                    params![key, lease_holder, expires_at],
                )
                .map_err(storage_error)?;
                Ok(())
            })
            .await
            .map_err(storage_error)?;

            match outcome {
                Ok(()) => {
                    debug!(key, attempts, "sqlite.lease_acquired");
                    let db = self.db.clone();
                    return Ok(AdvisoryGuard::new(key, move || release(db, key, holder)));
                }
                Err(StorageError::UniqueViolation(_) | StorageError::ConcurrentUpdate(_)) => {
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Delete the lease row if this holder still owns it. Runs on the blocking
/// pool when called inside a runtime.
fn release(db: DbManager, key: i64, holder: String) {
    let delete = move || {
        let result = db.get_connection().and_then(|conn| {
            conn.execute(
                "DELETE FROM advisory_locks WHERE lock_key = ?1 AND holder = ?2",
                params![key, holder],
            )
            .map_err(storage_error)
        });
        match result {
            Ok(_) => debug!(key, "sqlite.lease_released"),
            Err(err) => warn!(key, error = %err, "sqlite.lease_release_failed"),
        }
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(delete);
        }
        Err(_) => delete(),
    }
}
