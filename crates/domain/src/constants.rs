//! Protocol constants
//!
//! Values fixed by the EVE SSO contract or by the token lifecycle rules.

// Provider
pub const EVE_ISSUER: &str = "login.eveonline.com";
pub const DISCOVERY_PATH: &str = "/.well-known/oauth-authorization-server";
pub const SUBJECT_PREFIX: &str = "CHARACTER:EVE:";
pub const DEFINITIVE_REJECTION_CODES: [&str; 2] = ["invalid_grant", "invalid_token"];

// PKCE window
pub const PKCE_VALIDITY_SECS: i64 = 300;
pub const PKCE_SWEEP_GRACE_SECS: i64 = 1;

// Token validation
pub const JWT_LEEWAY_SECS: u64 = 30;
pub const JWKS_REFRESH_SECS: u64 = 300;

// Timeouts
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POOL_SIZE: u32 = 4;

// Scope matching switches from pairwise search to a count map above this size
pub const SCOPE_LOOP_THRESHOLD: usize = 20;

// Default profile used by the bootstrap helper
pub const DEFAULT_PROFILE_NAME: &str = "default";

// Access tokens are refreshed this long before they expire
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 10;
