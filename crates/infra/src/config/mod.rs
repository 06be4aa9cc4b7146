//! Configuration loading
//!
//! [`SsoConfig`](evesso_domain::SsoConfig) is defined in `evesso-domain`;
//! this module finds and parses it.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths, CONFIG_PATH_VAR};
