//! End-to-end login flow
//!
//! **Purpose**: Drive the whole path a web application takes: profile
//! bootstrap → authorization URL → provider callback → character persisted →
//! token source serving the new character.
//!
//! **Infrastructure:**
//! - Real SQLite database (tempdir)
//! - WireMock provider (discovery, JWKS, token endpoint)
//! - A store whose PKCE sweep never completes, for deadline checks

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use evesso_common::time::MockClock;
use evesso_core::find_or_create_profile;
use evesso_core::storage::{CharacterRepository, ProfileRepository};
use evesso_core::TokenSourceStatus;
use evesso_domain::constants::DEFAULT_PROFILE_NAME;
use evesso_domain::EvessoError;
use serde_json::json;
use support::{
    engine, engine_with, sqlite_store, token_response, FaultyStore, Provider, CHARACTER_ID,
    CHARACTER_NAME, OWNER, TOKEN_PATH,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::Mock;

#[tokio::test]
async fn login_callback_persists_character_and_serves_tokens() {
    let provider = Provider::start().await;
    let clock = MockClock::new();
    let (store, _dir) = sqlite_store(&clock);
    let sso = engine(&provider, store.clone(), &clock).await;

    let profile = find_or_create_profile(&*store, &clock, DEFAULT_PROFILE_NAME).await.unwrap();
    let again = find_or_create_profile(&*store, &clock, DEFAULT_PROFILE_NAME).await.unwrap();
    assert_eq!(profile.id, again.id);

    let (record, url) = sso
        .begin_authorization(profile.id, &["publicData"], Some(json!({"return_to": "/"})))
        .await
        .unwrap();
    assert!(url.contains(&record.state.to_string()));

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains(format!("code_verifier={}", record.code_verifier)))
        .respond_with(token_response(&provider.access_token(&["publicData"]), Some("refresh-1")))
        .expect(1)
        .mount(&provider.server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(token_response(&provider.access_token(&["publicData"]), Some("refresh-2")))
        .expect(1)
        .mount(&provider.server)
        .await;

    let character = sso.handle_callback("auth-code", &record.state.to_string()).await.unwrap();
    assert_eq!(character.profile_id, profile.id);
    assert_eq!(character.character_id, CHARACTER_ID);
    assert_eq!(character.character_name, CHARACTER_NAME);
    assert_eq!(character.owner, OWNER);
    assert_eq!(character.scopes, ["publicData"]);
    assert_eq!(character.refresh_token, "refresh-1");
    assert_eq!(character.reference_data, Some(json!({"return_to": "/"})));
    assert!(character.active);

    // The state was consumed by the first callback.
    let replay = sso.handle_callback("auth-code", &record.state.to_string()).await.unwrap_err();
    assert!(matches!(replay, EvessoError::NotFound(_)));

    let source = sso.token_source(profile.id, CHARACTER_NAME, &["publicData"]);
    let token = source.token().await.unwrap();
    assert_eq!(token.refresh_token, "refresh-2");
    assert_eq!(source.status(), TokenSourceStatus::Valid);

    let stored = store.get_character(character.id).await.unwrap();
    assert_eq!(stored.refresh_token, "refresh-2");
    assert_eq!(stored.access_token.as_deref(), Some(token.access_token.as_str()));
}

#[tokio::test]
async fn character_source_serves_a_known_character() {
    let provider = Provider::start().await;
    let clock = MockClock::new();
    let (store, _dir) = sqlite_store(&clock);
    let sso = engine(&provider, store.clone(), &clock).await;
    let profile = find_or_create_profile(&*store, &clock, "main").await.unwrap();

    let (record, _) = sso.begin_authorization(profile.id, &["publicData"], None).await.unwrap();
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(token_response(&provider.access_token(&["publicData"]), Some("refresh-1")))
        .mount(&provider.server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(token_response(&provider.access_token(&["publicData"]), None))
        .expect(1)
        .mount(&provider.server)
        .await;

    let character = sso.handle_callback("code", &record.state.to_string()).await.unwrap();
    let source = sso.character_source(&character);
    assert_eq!(source.status(), TokenSourceStatus::Loaded);

    let token = source.token().await.unwrap();
    assert_eq!(token.refresh_token, "refresh-1");
}

#[tokio::test]
async fn callback_for_a_deleted_profile_fails_before_the_exchange() {
    let provider = Provider::start().await;
    let clock = MockClock::new();
    let (store, _dir) = sqlite_store(&clock);
    let sso = engine(&provider, store.clone(), &clock).await;
    let profile = find_or_create_profile(&*store, &clock, "main").await.unwrap();

    let (record, _) = sso.begin_authorization(profile.id, &["publicData"], None).await.unwrap();
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_response(&provider.access_token(&["publicData"]), Some("refresh-1")))
        .expect(0)
        .mount(&provider.server)
        .await;

    // Deleting the profile takes its PKCE records with it.
    store.delete_profile(profile.id).await.unwrap();

    let err = sso.handle_callback("code", &record.state.to_string()).await.unwrap_err();
    assert!(matches!(err, EvessoError::NotFound(_)));
}

#[tokio::test]
async fn unknown_state_never_reaches_the_token_endpoint() {
    let provider = Provider::start().await;
    let clock = MockClock::new();
    let (store, _dir) = sqlite_store(&clock);
    let sso = engine(&provider, store.clone(), &clock).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_response("unused", None))
        .expect(0)
        .mount(&provider.server)
        .await;

    let err = sso.handle_callback("code", "not-a-state").await.unwrap_err();
    assert!(matches!(err, EvessoError::NotFound(_)));
}

#[tokio::test]
async fn maintenance_stops_on_cancel() {
    let provider = Provider::start().await;
    let clock = MockClock::new();
    let (store, _dir) = sqlite_store(&clock);
    let sso = engine(&provider, store.clone(), &clock).await;

    let cancel = CancellationToken::new();
    let handle = sso.start_maintenance(StdDuration::from_millis(20), cancel.clone());
    tokio::time::sleep(StdDuration::from_millis(60)).await;
    cancel.cancel();

    let joined = tokio::time::timeout(StdDuration::from_secs(2), handle).await;
    assert!(joined.is_ok_and(|result| result.is_ok()));
}

fn stalled_sweep_store(clock: &MockClock) -> Arc<FaultyStore> {
    let mut store = FaultyStore::new(clock);
    store.stall_sweep = true;
    Arc::new(store)
}

#[tokio::test]
async fn callback_completes_when_the_sweep_stalls() {
    let provider = Provider::start().await;
    let clock = MockClock::new();
    let store = stalled_sweep_store(&clock);
    let mut config = provider.config();
    config.operation_timeout_secs = 1;
    let sso = engine_with(config, store.clone(), &clock).await;
    let profile = find_or_create_profile(&*store, &clock, "main").await.unwrap();

    let (record, _) = sso.begin_authorization(profile.id, &["publicData"], None).await.unwrap();
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_response(&provider.access_token(&["publicData"]), Some("refresh-1")))
        .expect(1)
        .mount(&provider.server)
        .await;

    let state = record.state.to_string();
    let callback = sso.handle_callback("code", &state);
    let character = tokio::time::timeout(StdDuration::from_secs(5), callback)
        .await
        .expect("callback should not wait on the sweep")
        .unwrap();
    assert_eq!(character.profile_id, profile.id);
    assert!(store.get_character(character.id).await.unwrap().active);
}

#[tokio::test]
async fn maintenance_stops_on_cancel_when_the_sweep_stalls() {
    let provider = Provider::start().await;
    let clock = MockClock::new();
    let store = stalled_sweep_store(&clock);
    let mut config = provider.config();
    config.operation_timeout_secs = 1;
    let sso = engine_with(config, store, &clock).await;

    let cancel = CancellationToken::new();
    let handle = sso.start_maintenance(StdDuration::from_millis(20), cancel.clone());
    tokio::time::sleep(StdDuration::from_millis(60)).await;
    cancel.cancel();

    let joined = tokio::time::timeout(StdDuration::from_secs(5), handle).await;
    assert!(joined.is_ok_and(|result| result.is_ok()));
}

#[tokio::test]
async fn bootstrap_fails_when_discovery_is_unavailable() {
    let clock = MockClock::new();
    let (store, _dir) = sqlite_store(&clock);
    let mut config = evesso_domain::SsoConfig::new(
        support::CLIENT_ID,
        support::CLIENT_SECRET,
        support::CALLBACK_URL,
    );
    config.issuer = "http://127.0.0.1:9".into();

    let result = evesso_infra::EveSso::bootstrap(
        config,
        store,
        evesso_infra::HttpClient::builder().timeout(StdDuration::from_secs(2)).build().unwrap(),
    )
    .await;
    assert!(matches!(result, Err(EvessoError::Config(_))));
}
