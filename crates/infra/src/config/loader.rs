//! Configuration loader
//!
//! Loads [`SsoConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required variables are missing, falls back to the file named by
//!    `EVESSO_CONFIG`
//! 3. Otherwise probes the standard locations
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `EVESSO_CLIENT_ID`, `EVESSO_CLIENT_SECRET`, `EVESSO_CALLBACK_URL`:
//!   required
//! - `EVESSO_REDIRECT_URL`: where to send the browser after login
//! - `EVESSO_ISSUER`: provider host or URL
//! - `EVESSO_DATABASE_PATH`: SQLite file; unset selects the in-memory store
//! - `EVESSO_POOL_SIZE`, `EVESSO_HTTP_TIMEOUT_SECS`,
//!   `EVESSO_OPERATION_TIMEOUT_SECS`, `EVESSO_JWKS_REFRESH_SECS`
//!
//! ## File Locations
//! `./evesso.toml`, `./evesso.json`, `./config/evesso.toml`, relative to the
//! current working directory, in that order.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use evesso_domain::{EvessoError, Result, SsoConfig};

/// Names the config file explicitly.
pub const CONFIG_PATH_VAR: &str = "EVESSO_CONFIG";

const PROBE_PATHS: [&str; 3] = ["evesso.toml", "evesso.json", "config/evesso.toml"];

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `EvessoError::Config` if no source yields a valid configuration.
pub fn load() -> Result<SsoConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "environment incomplete, trying file");
            let explicit = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
            load_from_file(explicit)
        }
    }
}

/// Load configuration from `EVESSO_*` environment variables.
///
/// # Errors
/// Returns `EvessoError::Config` if a required variable is missing, a
/// numeric variable does not parse, or validation fails.
pub fn load_from_env() -> Result<SsoConfig> {
    let mut config = SsoConfig::new(
        env_var("EVESSO_CLIENT_ID")?,
        env_var("EVESSO_CLIENT_SECRET")?,
        env_var("EVESSO_CALLBACK_URL")?,
    );

    config.redirect_after_login = optional_env("EVESSO_REDIRECT_URL");
    if let Some(issuer) = optional_env("EVESSO_ISSUER") {
        config.issuer = issuer;
    }
    config.database_path = optional_env("EVESSO_DATABASE_PATH").map(PathBuf::from);
    if let Some(pool_size) = env_number("EVESSO_POOL_SIZE")? {
        config.pool_size = pool_size;
    }
    if let Some(secs) = env_number("EVESSO_HTTP_TIMEOUT_SECS")? {
        config.http_timeout_secs = secs;
    }
    if let Some(secs) = env_number("EVESSO_OPERATION_TIMEOUT_SECS")? {
        config.operation_timeout_secs = secs;
    }
    if let Some(secs) = env_number("EVESSO_JWKS_REFRESH_SECS")? {
        config.jwks_refresh_secs = secs;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `EvessoError::Config` if the file is missing or unreadable, the
/// format is invalid or unsupported, or validation fails.
pub fn load_from_file(path: Option<PathBuf>) -> Result<SsoConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(EvessoError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            EvessoError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| EvessoError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<SsoConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| EvessoError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| EvessoError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(EvessoError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing file among the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    PROBE_PATHS.iter().map(|p| cwd.join(p)).find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| {
        EvessoError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Set and non-blank.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_number<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| EvessoError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}
