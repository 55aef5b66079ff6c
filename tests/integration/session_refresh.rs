//! Session handling: login, reactive refresh and single-flight

use crate::support::{api_config, harness, FakeApi, Route};
use pokemon_etl::fetcher::pagination::collect_all;
use pokemon_etl::fetcher::{DataFetcher, FetcherError};
use pokemon_etl::Resource;

#[tokio::test]
async fn test_login_yields_non_empty_token() {
    let h = harness(FakeApi::with_dataset(2, 0), api_config(), 0);

    let session = h.api.sessions().ensure_valid().await.unwrap();

    assert!(!session.token().is_empty());
    assert_eq!(session.generation(), 1);
    assert_eq!(h.fake.logins(), 1);
}

#[tokio::test]
async fn test_session_is_reused_across_requests() {
    let h = harness(FakeApi::with_dataset(30, 30), api_config(), 0);

    collect_all(h.api.fetch_all(Resource::Pokemon, 10, None))
        .await
        .unwrap();
    collect_all(h.api.fetch_all(Resource::Combats, 10, None))
        .await
        .unwrap();

    assert_eq!(h.fake.logins(), 1);
    assert!(h
        .fake
        .requests()
        .iter()
        .filter(|r| r.route != Route::Login)
        .all(|r| r.bearer.as_deref() == Some("token-1")));
}

#[tokio::test]
async fn test_expired_token_is_refreshed_mid_walk() {
    let h = harness(FakeApi::with_dataset(30, 0), api_config(), 0);
    h.api.ensure_session().await.unwrap();
    h.fake.expire_token();

    let records = collect_all(h.api.fetch_all(Resource::Pokemon, 10, None))
        .await
        .unwrap();

    assert_eq!(records.len(), 30);
    assert_eq!(h.fake.logins(), 2);
    let session = h.api.sessions().current().await.unwrap();
    assert_eq!(session.generation(), 2);
    // The refresh does not spend the (empty) retry budget
    assert!(h.sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_concurrent_401s_trigger_a_single_login() {
    let h = harness(FakeApi::with_dataset(20, 20).interleaved(), api_config(), 0);
    h.api.ensure_session().await.unwrap();
    h.fake.expire_token();

    let (pokemon, combats) = tokio::try_join!(
        collect_all(h.api.fetch_all(Resource::Pokemon, 5, None)),
        collect_all(h.api.fetch_all(Resource::Combats, 5, None)),
    )
    .unwrap();

    assert_eq!(pokemon.len(), 20);
    assert_eq!(combats.len(), 20);
    // Initial login plus exactly one refresh
    assert_eq!(h.fake.logins(), 2);
    assert_eq!(h.fake.count(Route::Login), 2);
}

#[tokio::test]
async fn test_second_401_after_refresh_is_auth_error() {
    let h = harness(FakeApi::with_dataset(5, 0), api_config(), 3);
    h.fake.reject_all_tokens();

    let error = collect_all(h.api.fetch_all(Resource::Pokemon, 10, None))
        .await
        .unwrap_err();

    assert!(matches!(error, FetcherError::AuthError(_)));
    assert_eq!(h.fake.count(Route::PokemonList), 2);
    assert_eq!(h.fake.logins(), 2);
    assert!(h.sleeper.delays().is_empty());
}
