//! Configuration structures
//!
//! Loading (environment, TOML, JSON) lives in `evesso-infra`; this module only
//! defines the shape, the defaults and validation.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_POOL_SIZE, DISCOVERY_PATH,
    EVE_ISSUER, JWKS_REFRESH_SECS,
};
use crate::errors::{EvessoError, Result};
use crate::types::ClientCredentials;

/// Engine configuration.
///
/// Short field names (`key`, `secret`, `callback`, `redirect`, `dsn`) are
/// accepted as aliases in config files.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoConfig {
    #[serde(alias = "key")]
    pub client_id: String,

    #[serde(alias = "secret")]
    pub client_secret: String,

    #[serde(alias = "callback")]
    pub callback_url: String,

    /// Where the callback handler sends the browser after a successful login.
    #[serde(default, alias = "redirect", skip_serializing_if = "Option::is_none")]
    pub redirect_after_login: Option<String>,

    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// SQLite database file. `None` selects the in-memory store.
    #[serde(default, alias = "dsn", skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Upper bound for each storage and token endpoint call made by a token
    /// source.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    #[serde(default = "default_jwks_refresh_secs")]
    pub jwks_refresh_secs: u64,
}

fn default_issuer() -> String {
    EVE_ISSUER.to_string()
}

const fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

const fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

const fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

const fn default_jwks_refresh_secs() -> u64 {
    JWKS_REFRESH_SECS
}

impl SsoConfig {
    /// Configuration with every optional field at its default.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback_url: callback_url.into(),
            redirect_after_login: None,
            issuer: default_issuer(),
            database_path: None,
            pool_size: DEFAULT_POOL_SIZE,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            jwks_refresh_secs: JWKS_REFRESH_SECS,
        }
    }

    /// Reject configurations the engine cannot run with.
    ///
    /// # Errors
    /// Returns [`EvessoError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(EvessoError::Config("client_id must not be empty".into()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(EvessoError::Config("client_secret must not be empty".into()));
        }
        if !self.callback_url.starts_with("http://") && !self.callback_url.starts_with("https://")
        {
            return Err(EvessoError::Config(format!(
                "callback_url must be an http(s) URL, got '{}'",
                self.callback_url
            )));
        }
        if self.issuer.trim().is_empty() {
            return Err(EvessoError::Config("issuer must not be empty".into()));
        }
        if self.pool_size == 0 {
            return Err(EvessoError::Config("pool_size must be positive".into()));
        }
        for (field, value) in [
            ("http_timeout_secs", self.http_timeout_secs),
            ("operation_timeout_secs", self.operation_timeout_secs),
            ("jwks_refresh_secs", self.jwks_refresh_secs),
        ] {
            if value == 0 {
                return Err(EvessoError::Config(format!("{field} must be positive")));
            }
        }
        Ok(())
    }

    /// Discovery document URL derived from the issuer.
    #[must_use]
    pub fn discovery_url(&self) -> String {
        let issuer = self.issuer.trim_end_matches('/');
        if issuer.starts_with("http://") || issuer.starts_with("https://") {
            format!("{issuer}{DISCOVERY_PATH}")
        } else {
            format!("https://{issuer}{DISCOVERY_PATH}")
        }
    }

    #[must_use]
    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            callback_url: self.callback_url.clone(),
        }
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    #[must_use]
    pub const fn jwks_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.jwks_refresh_secs)
    }
}

impl fmt::Debug for SsoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsoConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("redirect_after_login", &self.redirect_after_login)
            .field("issuer", &self.issuer)
            .field("database_path", &self.database_path)
            .field("pool_size", &self.pool_size)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .field("jwks_refresh_secs", &self.jwks_refresh_secs)
            .finish()
    }
}
