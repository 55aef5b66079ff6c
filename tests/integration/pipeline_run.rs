//! End-to-end runs against the scripted API and a filesystem store

use crate::support::{api_config, harness, unavailable, FakeApi, Harness, Route};
use pokemon_etl::fetcher::FetcherError;
use pokemon_etl::output::OutputKind;
use pokemon_etl::pipeline::{PipelineError, PipelineExecutor, ResourceOutcome};
use pokemon_etl::store::{FsRawStore, RefreshMode};
use pokemon_etl::transform::DataIntegrityWarning;
use pokemon_etl::Resource;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct Workspace {
    raw: TempDir,
    out: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            raw: TempDir::new().unwrap(),
            out: TempDir::new().unwrap(),
        }
    }

    fn executor(&self, h: &Harness, mode: RefreshMode) -> PipelineExecutor {
        PipelineExecutor::new(
            h.api.clone(),
            Arc::new(FsRawStore::new(self.raw.path(), mode)),
            self.out.path(),
        )
        .with_shutdown(h.shutdown.clone())
    }

    fn table(&self, kind: OutputKind) -> String {
        std::fs::read_to_string(self.out.path().join(kind.file_name())).unwrap()
    }
}

/// Three Pokémon and the two combats of the reference example
fn reference_api() -> FakeApi {
    let api = FakeApi::new();
    api.add_pokemon(1, "Bulbasaur", "Grass/Poison");
    api.add_pokemon(2, "Charmander", "Fire");
    api.add_pokemon(3, "Squirtle", "Water");
    api.set_combats(vec![
        json!({"first_pokemon": 1, "second_pokemon": 2, "winner": 1}),
        json!({"first_pokemon": 1, "second_pokemon": 3, "winner": 3}),
    ]);
    api
}

fn csv_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|ext| ext == "csv")
        })
        .count()
}

#[tokio::test]
async fn test_full_run_writes_every_table() {
    let ws = Workspace::new();
    let h = harness(reference_api(), api_config(), 0);

    let report = ws.executor(&h, RefreshMode::Reuse).run().await.unwrap();

    assert!(report.is_complete());
    let keys: Vec<&str> = report.manifest.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["by_type", "combats", "pokemon", "stats", "top10_losers", "top10_winners"]
    );
    for path in report.manifest.values() {
        assert!(path.exists(), "{} missing", path.display());
    }
    assert_eq!(
        report.resources[&Resource::Combats],
        ResourceOutcome::Fetched { records: 2 }
    );

    let stats = ws.table(OutputKind::Stats);
    let rows: Vec<&str> = stats.lines().collect();
    assert_eq!(
        rows,
        vec![
            "id,name,wins,losses,total_combats,win_rate,types,attack,defense,hp,speed",
            "1,Bulbasaur,1,1,2,0.5,Grass/Poison,51,45,41,55",
            "2,Charmander,0,1,1,0.0,Fire,52,45,42,55",
            "3,Squirtle,1,0,1,1.0,Water,53,45,43,55",
        ]
    );

    let by_type = ws.table(OutputKind::ByType);
    assert_eq!(
        by_type.lines().collect::<Vec<_>>(),
        vec!["type,count", "Fire,1", "Grass,1", "Poison,1", "Water,1"]
    );

    let combats = ws.table(OutputKind::Combats);
    assert!(combats.contains("Bulbasaur,Charmander,Bulbasaur"));

    let pokemon = ws.table(OutputKind::Pokemon);
    assert!(pokemon.starts_with("id,name,types,type_1,type_2,hp,attack"));
    assert!(pokemon.contains("1,Bulbasaur,Grass/Poison,Grass,Poison,41,51,45,60,60,55,1,false"));
}

#[tokio::test]
async fn test_second_run_reuses_snapshots_without_http() {
    let ws = Workspace::new();
    let h = harness(reference_api(), api_config(), 0);
    ws.executor(&h, RefreshMode::Reuse).run().await.unwrap();
    let requests_after_first = h.fake.total_requests();

    let report = ws.executor(&h, RefreshMode::Reuse).run().await.unwrap();

    assert_eq!(h.fake.total_requests(), requests_after_first);
    assert!(Resource::ALL.iter().all(|r| report.reused(*r)));
    assert_eq!(report.tables_written(), 6);
}

#[tokio::test]
async fn test_force_refresh_fetches_again() {
    let ws = Workspace::new();
    let h = harness(reference_api(), api_config(), 0);
    ws.executor(&h, RefreshMode::Reuse).run().await.unwrap();
    let details_before = h.fake.count(Route::PokemonDetail);

    let report = ws.executor(&h, RefreshMode::Force).run().await.unwrap();

    assert_eq!(h.fake.count(Route::PokemonDetail), details_before * 2);
    assert!(!report.reused(Resource::Combats));
}

#[tokio::test]
async fn test_new_pokemon_only_fetches_missing_details() {
    let ws = Workspace::new();
    let h = harness(reference_api(), api_config(), 0);
    ws.executor(&h, RefreshMode::Reuse).run().await.unwrap();
    assert_eq!(h.fake.count(Route::PokemonDetail), 3);

    // A stale listing is dropped so the next run walks /pokemon again
    h.fake.add_pokemon(4, "Pikachu", "Electric");
    std::fs::remove_file(ws.raw.path().join("pokemon_basic.json")).unwrap();

    let report = ws.executor(&h, RefreshMode::Reuse).run().await.unwrap();

    assert_eq!(h.fake.count(Route::PokemonDetail), 4);
    assert_eq!(
        report.resources[&Resource::PokemonAttributes],
        ResourceOutcome::Merged {
            reused: 3,
            fetched: 1
        }
    );
    assert!(ws.table(OutputKind::Pokemon).contains("Pikachu"));
}

#[tokio::test]
async fn test_unknown_combatant_is_a_warning() {
    let ws = Workspace::new();
    let fake = reference_api();
    fake.set_combats(vec![
        json!({"first_pokemon": 1, "second_pokemon": 99, "winner": 99}),
        json!({"first_pokemon": 1, "second_pokemon": 2, "winner": 2}),
    ]);
    let h = harness(fake, api_config(), 0);

    let report = ws.executor(&h, RefreshMode::Reuse).run().await.unwrap();

    assert_eq!(
        report.warnings,
        vec![DataIntegrityWarning::UnknownEntity {
            combat_index: 0,
            entity_id: 99
        }]
    );
    let stats = ws.table(OutputKind::Stats);
    assert!(stats.contains("1,Bulbasaur,0,1,1,0.0"));
    assert!(!stats.lines().any(|line| line.starts_with("99,")));
}

#[tokio::test]
async fn test_fetch_failure_aborts_without_output() {
    let ws = Workspace::new();
    let h = harness(reference_api(), api_config(), 1);
    h.fake
        .script(Route::Combats, vec![unavailable(), unavailable()]);

    let error = ws
        .executor(&h, RefreshMode::Reuse)
        .run()
        .await
        .unwrap_err();

    match &error {
        PipelineError::Fetch {
            resource: Resource::Combats,
            source: FetcherError::TransientFetchError { attempts: 2, .. },
        } => {}
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(error.stage(), "extract");
    assert_eq!(csv_files(ws.out.path()), 0);
}

#[tokio::test]
async fn test_corrupt_snapshot_is_refetched() {
    let ws = Workspace::new();
    let h = harness(reference_api(), api_config(), 0);
    ws.executor(&h, RefreshMode::Reuse).run().await.unwrap();
    std::fs::write(ws.raw.path().join("combats.json"), "{ not json").unwrap();
    let combat_requests = h.fake.count(Route::Combats);

    let report = ws.executor(&h, RefreshMode::Reuse).run().await.unwrap();

    assert_eq!(h.fake.count(Route::Combats), combat_requests + 1);
    assert_eq!(
        report.resources[&Resource::Combats],
        ResourceOutcome::Fetched { records: 2 }
    );
}

#[tokio::test]
async fn test_transform_only_uses_existing_snapshots() {
    let ws = Workspace::new();
    let h = harness(reference_api(), api_config(), 0);
    ws.executor(&h, RefreshMode::Reuse).extract().await.unwrap();
    assert_eq!(csv_files(ws.out.path()), 0);
    let requests = h.fake.total_requests();

    let report = ws
        .executor(&h, RefreshMode::Reuse)
        .transform_only()
        .await
        .unwrap();

    assert_eq!(h.fake.total_requests(), requests);
    assert_eq!(report.tables_written(), 6);
    assert_eq!(csv_files(ws.out.path()), 6);
}
