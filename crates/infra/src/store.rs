//! Storage backend selection

use std::sync::Arc;

use evesso_common::time::Clock;
use evesso_core::storage::SsoStore;
use evesso_domain::{EvessoError, Result, SsoConfig};
use tracing::info;

use crate::database::SqliteStore;
use crate::memory::MemoryStore;

/// Open the backend `config` names: SQLite when `database_path` is set,
/// otherwise a fresh in-memory store.
///
/// # Errors
/// [`EvessoError::Config`] if the database cannot be opened or migrated.
pub fn open_store(config: &SsoConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn SsoStore>> {
    match &config.database_path {
        Some(path) => {
            let store = SqliteStore::open(path, config.pool_size)
                .map_err(|e| EvessoError::Config(format!("cannot open {}: {e}", path.display())))?
                .with_clock(clock);
            info!(path = %path.display(), "store.sqlite_opened");
            Ok(Arc::new(store))
        }
        None => {
            info!("store.memory_opened");
            Ok(Arc::new(MemoryStore::new().with_clock(clock)))
        }
    }
}
