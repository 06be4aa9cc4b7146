//! Profile bootstrap helpers

use evesso_common::time::Clock;
use evesso_domain::{EvessoError, Profile, Result};
use tracing::info;

use crate::storage::ProfileRepository;

/// Find the profile called `name`, creating it if it does not exist.
///
/// A concurrent creator winning the race is not an error; the existing
/// profile is returned.
///
/// # Errors
/// Storage errors other than the lost race.
pub async fn find_or_create_profile(
    store: &dyn ProfileRepository,
    clock: &dyn Clock,
    name: &str,
) -> Result<Profile> {
    match store.find_profile(name).await {
        Ok(profile) => return Ok(profile),
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }

    let profile = Profile::new(name, None, clock.now());
    match store.create_profile(&profile).await {
        Ok(created) => {
            info!(profile_id = %created.id, name, "profile.created");
            Ok(created)
        }
        Err(evesso_common::storage::StorageError::UniqueViolation(_)) => {
            Ok(store.find_profile(name).await?)
        }
        Err(err) => Err(EvessoError::from(err)),
    }
}
