//! Integration tests for the PKCE challenge lifecycle
//!
//! **Coverage:**
//! - Challenge creation and authorization URL rendering
//! - Validation inside and outside the five minute window
//! - At-most-once redemption under concurrency
//! - The sweep boundary
//!
//! **Infrastructure:**
//! - SQLite (tempdir) and in-memory stores
//! - MockClock pinned to whole seconds

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::Arc;

use chrono::Duration;
use evesso_common::time::MockClock;
use evesso_core::storage::{PkceRepository, SsoStore};
use evesso_core::PkceService;
use evesso_domain::EvessoError;
use evesso_infra::MemoryStore;
use serde_json::json;
use support::{create_profile, engine, sqlite_store, whole_second, Provider};
use url::Url;

fn service(store: Arc<dyn SsoStore>, clock: &MockClock) -> PkceService {
    PkceService::new(store, Arc::new(clock.clone()))
}

#[tokio::test]
async fn begin_authorization_persists_challenge_and_renders_url() {
    let provider = Provider::start().await;
    let clock = MockClock::new();
    let store = Arc::new(MemoryStore::new().with_clock(Arc::new(clock.clone())));
    let profile = create_profile(&*store, "main").await;
    let sso = engine(&provider, store.clone(), &clock).await;

    let reference = json!({"return_to": "/fleet"});
    let (record, url) = sso
        .begin_authorization(profile.id, &["publicData", "esi-skills.read_skills.v1"], Some(reference.clone()))
        .await
        .unwrap();

    let url = Url::parse(&url).unwrap();
    assert_eq!(url.path(), "/v2/oauth/authorize");
    let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        [
            "response_type",
            "client_id",
            "redirect_uri",
            "scope",
            "state",
            "code_challenge",
            "code_challenge_method",
            "access_type"
        ]
    );
    let value = |key: &str| params.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()).unwrap();
    assert_eq!(value("scope"), "esi-skills.read_skills.v1 publicData");
    assert_eq!(value("state"), record.state.to_string());
    assert_eq!(value("code_challenge"), record.code_challenge);
    assert_eq!(value("code_challenge_method"), "S256");

    let found = sso.context().pkce().validate(&record.state.to_string()).await.unwrap();
    assert_eq!(found.id, record.id);
    assert_eq!(found.code_verifier, record.code_verifier);
    assert_eq!(found.reference_data, Some(reference));
}

#[tokio::test]
async fn challenge_expires_at_five_minutes_without_a_sweep() {
    let clock = MockClock::at(whole_second(0));
    let (store, _dir) = sqlite_store(&clock);
    let profile = create_profile(&*store, "main").await;
    let pkce = service(store.clone(), &clock);

    let record = pkce.create_challenge(profile.id, &["publicData"], None).await.unwrap();
    let state = record.state.to_string();

    clock.advance(Duration::seconds(299));
    assert_eq!(pkce.validate(&state).await.unwrap().id, record.id);
    assert_eq!(pkce.get(record.id).await.unwrap().state, record.state);

    clock.advance(Duration::seconds(1));
    assert!(matches!(pkce.validate(&state).await, Err(EvessoError::NotFound(_))));
    assert!(matches!(pkce.get(record.id).await, Err(EvessoError::NotFound(_))));
}

#[tokio::test]
async fn malformed_or_unknown_state_is_not_found() {
    let clock = MockClock::new();
    let store: Arc<dyn SsoStore> = Arc::new(MemoryStore::new());
    let pkce = service(store, &clock);

    assert!(matches!(pkce.validate("not-a-uuid").await, Err(EvessoError::NotFound(_))));
    assert!(matches!(
        pkce.redeem_state("7b0b2f8c-5e0d-4f5e-9f5a-2d8c0c0f1a11").await,
        Err(EvessoError::NotFound(_))
    ));
}

#[tokio::test]
async fn state_is_redeemed_at_most_once_under_concurrency() {
    let clock = MockClock::new();
    let (store, _dir) = sqlite_store(&clock);
    let profile = create_profile(&*store, "main").await;
    let pkce = Arc::new(service(store.clone(), &clock));

    let record = pkce.create_challenge(profile.id, &["publicData"], None).await.unwrap();
    let state = record.state.to_string();

    let attempts = (0..8).map(|_| {
        let pkce = Arc::clone(&pkce);
        let state = state.clone();
        tokio::spawn(async move { pkce.redeem_state(&state).await })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| matches!(err, EvessoError::NotFound(_))));
    assert!(matches!(pkce.validate(&state).await, Err(EvessoError::NotFound(_))));
}

#[tokio::test]
async fn sweep_removes_only_records_past_the_grace_period() {
    let clock = MockClock::at(whole_second(0));
    let (store, _dir) = sqlite_store(&clock);
    let profile = create_profile(&*store, "main").await;
    let pkce = service(store.clone(), &clock);

    let record = pkce.create_challenge(profile.id, &["publicData"], None).await.unwrap();
    let created_at = record.created_at;

    // Five minutes and one second: exactly on the boundary, kept.
    clock.advance(Duration::seconds(301));
    assert_eq!(pkce.sweep().await.unwrap(), 0);
    let kept = store.get_pkce(record.id, created_at - Duration::seconds(1)).await.unwrap();
    assert_eq!(kept.id, record.id);

    clock.advance(Duration::milliseconds(1));
    assert_eq!(pkce.sweep().await.unwrap(), 1);
    let swept = store.get_pkce(record.id, created_at - Duration::seconds(1)).await;
    assert!(swept.unwrap_err().is_not_found());
}

#[tokio::test]
async fn sweep_keeps_younger_records() {
    let clock = MockClock::at(whole_second(0));
    let store = Arc::new(MemoryStore::new().with_clock(Arc::new(clock.clone())));
    let profile = create_profile(&*store, "main").await;
    let pkce = service(store.clone(), &clock);

    pkce.create_challenge(profile.id, &["publicData"], None).await.unwrap();
    clock.advance(Duration::minutes(4));
    let young = pkce.create_challenge(profile.id, &["publicData"], None).await.unwrap();

    clock.advance(Duration::seconds(62));
    assert_eq!(pkce.sweep().await.unwrap(), 1);
    assert_eq!(pkce.validate(&young.state.to_string()).await.unwrap().id, young.id);
}
