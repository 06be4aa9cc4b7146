//! Shared fixtures for the infra integration tests.
//!
//! [`Provider`] is a wiremock stand-in for EVE SSO: it serves the discovery
//! document and the JWKS, and mints RS256 access tokens signed with the
//! fixture key. Token endpoint behaviour is mounted per test.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evesso_common::storage::{StorageError, StorageResult};
use evesso_common::time::MockClock;
use evesso_core::storage::{
    AdvisoryLock, CharacterRepository, PkceRepository, ProfileRepository, SsoStore,
};
use evesso_domain::{Character, CharacterQuery, PkceRecord, Profile, SsoConfig};
use evesso_infra::{init_tracing, EveSso, HttpClient, LogFormat, MemoryStore};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "client-123";
pub const CLIENT_SECRET: &str = "client-secret";
pub const CALLBACK_URL: &str = "http://localhost:8080/callback";

pub const CHARACTER_ID: i32 = 2_112_625_428;
pub const CHARACTER_NAME: &str = "Kari Tanaka";
pub const OWNER: &str = "8PmzCeTKb4VFUDrHLc/AeZXDSWM=";

pub const TOKEN_PATH: &str = "/v2/oauth/token";

const KID: &str = "JWT-Signature-Key";
const PEM: &str = include_str!("fixtures/provider_rsa.pem");
const MODULUS: &str = "sSjFyOhIKBya1Pd9mAwcku4YbAgQdKDTd2xwuloW2jZErDwCL3vH79Vw-7lukKUAuREmua-w0ePj-3K2SRPDV2PEapRx0ALp9J4rRxP3vaB4AXdm5mzB2LYnwzQpq7hMBQqE0sbnMtiMG7NHPH1niBn4NuY8r8ZPQYqMq_3cw9LBhK-9xLbPVz6fpdsDxju6U3xT-cmtjrXpdnmuNwlOUSNhR9TW6TFIBla0s03HukMWsaoeTy0DqS9UM2N5ueoB6MUo_jqUYv2bOFV8HE7kSZDfmhixvV1axqUmYmIOFwnC4blR4QU7Yx0_coniz93urNzg3MAIP_XYDu-pYGRa8w";

/// Mock identity provider.
pub struct Provider {
    pub server: MockServer,
}

impl Provider {
    /// Start the server with discovery and JWKS mounted.
    pub async fn start() -> Self {
        let _ = init_tracing(LogFormat::Compact);
        let server = MockServer::start().await;
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": base,
                "authorization_endpoint": format!("{base}/v2/oauth/authorize"),
                "token_endpoint": format!("{base}{TOKEN_PATH}"),
                "jwks_uri": format!("{base}/oauth/jwks"),
                "revocation_endpoint": format!("{base}/v2/oauth/revoke"),
                "response_types_supported": ["code", "token"],
                "token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"],
                "code_challenge_methods_supported": ["S256"]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/oauth/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{
                    "kty": "RSA", "alg": "RS256", "use": "sig", "kid": KID,
                    "n": MODULUS, "e": "AQAB"
                }],
                "SkipUnresolvedJsonWebKeys": true
            })))
            .mount(&server)
            .await;

        Self { server }
    }

    /// Engine configuration pointing at this provider.
    pub fn config(&self) -> SsoConfig {
        let mut config = SsoConfig::new(CLIENT_ID, CLIENT_SECRET, CALLBACK_URL);
        config.issuer = self.server.uri();
        config.operation_timeout_secs = 5;
        config
    }

    /// Claims for the fixture character holding `scopes`, valid for twenty
    /// minutes of real time.
    pub fn claims(&self, scopes: &[&str]) -> Value {
        let now = Utc::now().timestamp();
        json!({
            "scp": scopes,
            "jti": Uuid::new_v4().to_string(),
            "kid": KID,
            "sub": format!("CHARACTER:EVE:{CHARACTER_ID}"),
            "azp": CLIENT_ID,
            "tenant": "tranquility",
            "tier": "live",
            "region": "world",
            "aud": [CLIENT_ID, "EVE Online"],
            "name": CHARACTER_NAME,
            "owner": OWNER,
            "exp": now + 1200,
            "iat": now,
            "iss": self.server.uri()
        })
    }

    /// Signed access token for the fixture character.
    pub fn access_token(&self, scopes: &[&str]) -> String {
        sign(&self.claims(scopes))
    }

    /// Signed access token after `edit` has changed the claims.
    pub fn access_token_with(&self, scopes: &[&str], edit: impl FnOnce(&mut Value)) -> String {
        let mut claims = self.claims(scopes);
        edit(&mut claims);
        sign(&claims)
    }
}

pub fn sign(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(&header, claims, &EncodingKey::from_rsa_pem(PEM.as_bytes()).unwrap()).unwrap()
}

/// Token endpoint success body.
pub fn token_response(access_token: &str, refresh_token: Option<&str>) -> ResponseTemplate {
    let mut body = json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 1199
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }
    ResponseTemplate::new(200).set_body_json(body)
}

/// Token endpoint OAuth error body.
pub fn oauth_error(status: u16, code: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": code,
        "error_description": "rejected by mock provider"
    }))
}

pub async fn engine(provider: &Provider, store: Arc<dyn SsoStore>, clock: &MockClock) -> EveSso {
    engine_with(provider.config(), store, clock).await
}

pub async fn engine_with(config: SsoConfig, store: Arc<dyn SsoStore>, clock: &MockClock) -> EveSso {
    EveSso::bootstrap_with_clock(config, store, HttpClient::new().unwrap(), Arc::new(clock.clone()))
        .await
        .expect("engine should bootstrap against the mock provider")
}

/// SQLite store in a temporary directory. Keep the directory alive for the
/// duration of the test.
pub fn sqlite_store(clock: &MockClock) -> (Arc<evesso_infra::SqliteStore>, TempDir) {
    let dir = TempDir::new().expect("temp dir should be created");
    let store = evesso_infra::SqliteStore::open(dir.path().join("sso.db"), 4)
        .expect("sqlite store should open")
        .with_clock(Arc::new(clock.clone()));
    (Arc::new(store), dir)
}

pub async fn create_profile(store: &dyn SsoStore, name: &str) -> Profile {
    store.create_profile(&Profile::new(name, None, Utc::now())).await.unwrap()
}

/// Unsaved fixture character in `profile_id` with only a refresh token.
pub fn character(profile_id: Uuid, scopes: &[&str], refresh_token: &str) -> Character {
    let now = Utc::now();
    Character {
        id: Uuid::new_v4(),
        profile_id,
        character_id: CHARACTER_ID,
        character_name: CHARACTER_NAME.into(),
        owner: OWNER.into(),
        access_token: None,
        refresh_token: refresh_token.into(),
        scopes: evesso_core::normalize_scopes(scopes),
        reference_data: None,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Instant on a whole second, `secs_ago` seconds in the past.
pub fn whole_second(secs_ago: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(Utc::now().timestamp() - secs_ago, 0).unwrap()
}

/// In-memory store with injectable faults.
pub struct FaultyStore {
    inner: MemoryStore,
    /// `update_active(_, false)` fails with an I/O error.
    pub fail_deactivate: bool,
    /// `sweep_pkce` never completes.
    pub stall_sweep: bool,
}

impl FaultyStore {
    pub fn new(clock: &MockClock) -> Self {
        Self {
            inner: MemoryStore::new().with_clock(Arc::new(clock.clone())),
            fail_deactivate: false,
            stall_sweep: false,
        }
    }
}

impl SsoStore for FaultyStore {
    fn advisory_lock(&self) -> Option<&dyn AdvisoryLock> {
        self.inner.advisory_lock()
    }
}

#[async_trait]
impl ProfileRepository for FaultyStore {
    async fn create_profile(&self, profile: &Profile) -> StorageResult<Profile> {
        self.inner.create_profile(profile).await
    }

    async fn get_profile(&self, id: Uuid) -> StorageResult<Profile> {
        self.inner.get_profile(id).await
    }

    async fn find_profile(&self, name: &str) -> StorageResult<Profile> {
        self.inner.find_profile(name).await
    }

    async fn delete_profile(&self, id: Uuid) -> StorageResult<()> {
        self.inner.delete_profile(id).await
    }

    async fn list_profiles(&self) -> StorageResult<Vec<Profile>> {
        self.inner.list_profiles().await
    }
}

#[async_trait]
impl CharacterRepository for FaultyStore {
    async fn upsert_character(&self, character: &Character) -> StorageResult<Character> {
        self.inner.upsert_character(character).await
    }

    async fn get_character(&self, id: Uuid) -> StorageResult<Character> {
        self.inner.get_character(id).await
    }

    async fn find_character(
        &self,
        profile_id: Uuid,
        query: &CharacterQuery,
    ) -> StorageResult<Character> {
        self.inner.find_character(profile_id, query).await
    }

    async fn list_characters(&self, profile_id: Uuid) -> StorageResult<Vec<Character>> {
        self.inner.list_characters(profile_id).await
    }

    async fn update_access_token(&self, id: Uuid, access_token: &str) -> StorageResult<()> {
        self.inner.update_access_token(id, access_token).await
    }

    async fn update_refresh_token(&self, id: Uuid, refresh_token: &str) -> StorageResult<()> {
        self.inner.update_refresh_token(id, refresh_token).await
    }

    async fn update_active(&self, id: Uuid, active: bool) -> StorageResult<()> {
        if self.fail_deactivate && !active {
            return Err(StorageError::Io("disk full".into()));
        }
        self.inner.update_active(id, active).await
    }

    async fn delete_character(&self, id: Uuid) -> StorageResult<()> {
        self.inner.delete_character(id).await
    }
}

#[async_trait]
impl PkceRepository for FaultyStore {
    async fn create_pkce(&self, record: &PkceRecord) -> StorageResult<()> {
        self.inner.create_pkce(record).await
    }

    async fn get_pkce(&self, id: Uuid, not_before: DateTime<Utc>) -> StorageResult<PkceRecord> {
        self.inner.get_pkce(id, not_before).await
    }

    async fn find_pkce(&self, state: Uuid, not_before: DateTime<Utc>) -> StorageResult<PkceRecord> {
        self.inner.find_pkce(state, not_before).await
    }

    async fn destroy_pkce(&self, id: Uuid) -> StorageResult<()> {
        self.inner.destroy_pkce(id).await
    }

    async fn sweep_pkce(&self, older_than: DateTime<Utc>) -> StorageResult<u64> {
        if self.stall_sweep {
            std::future::pending::<()>().await;
        }
        self.inner.sweep_pkce(older_than).await
    }
}
