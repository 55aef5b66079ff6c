//! Paginated fetching against the scripted API

use crate::support::{api_config, harness, FakeApi, Route};
use futures_util::StreamExt;
use pokemon_etl::fetcher::pagination::collect_all;
use pokemon_etl::fetcher::DataFetcher;
use pokemon_etl::Resource;
use std::collections::HashSet;

#[tokio::test]
async fn test_fetch_all_returns_every_record_once_in_order() {
    let h = harness(
        FakeApi::with_dataset(23, 0),
        api_config().with_page_sizes(5, 5),
        2,
    );

    let records = collect_all(h.api.fetch_all(Resource::Pokemon, 5, None))
        .await
        .unwrap();

    let ids: Vec<i64> = records.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, (1..=23).collect::<Vec<_>>());
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 23);

    // 23 records at 5 per page: pages 1..=5, the fifth reaches the total
    let pages: Vec<Option<u32>> = h
        .fake
        .requests()
        .iter()
        .filter(|r| r.route == Route::PokemonList)
        .map(|r| r.page)
        .collect();
    assert_eq!(pages, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
}

#[tokio::test]
async fn test_cap_overshoots_by_less_than_a_page() {
    let per_page = 10;
    let total = 95;
    for cap in [1usize, 10, 11, 50, 95, 200] {
        let h = harness(
            FakeApi::with_dataset(10, total),
            api_config().with_page_sizes(per_page, per_page),
            0,
        );

        let records = collect_all(h.api.fetch_all(Resource::Combats, per_page, Some(cap)))
            .await
            .unwrap();

        let expected_min = cap.min(total);
        assert!(
            records.len() >= expected_min,
            "cap {cap}: got {} records",
            records.len()
        );
        assert!(
            records.len() < cap + per_page as usize,
            "cap {cap}: got {} records",
            records.len()
        );
    }
}

#[tokio::test]
async fn test_empty_resource_stops_after_one_page() {
    let h = harness(FakeApi::with_dataset(3, 0), api_config(), 0);

    let records = collect_all(h.api.fetch_all(Resource::Combats, 100, None))
        .await
        .unwrap();

    assert!(records.is_empty());
    assert_eq!(h.fake.count(Route::Combats), 1);
}

#[tokio::test]
async fn test_zero_cap_makes_no_request() {
    let h = harness(FakeApi::with_dataset(3, 30), api_config(), 0);

    let records = collect_all(h.api.fetch_all(Resource::Combats, 10, Some(0)))
        .await
        .unwrap();

    assert!(records.is_empty());
    assert_eq!(h.fake.total_requests(), 0);
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let h = harness(FakeApi::with_dataset(40, 0), api_config(), 0);

    let mut stream = h.api.fetch_all(Resource::Pokemon, 10, None);
    let first: Vec<_> = (&mut stream).take(3).collect().await;

    assert_eq!(first.len(), 3);
    assert_eq!(h.fake.count(Route::PokemonList), 1);
}
