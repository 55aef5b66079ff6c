//! Filesystem snapshot store behavior

use pokemon_etl::store::{FsRawStore, RawStore, RefreshMode, StoreError};
use pokemon_etl::Resource;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_save_twice_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = FsRawStore::new(dir.path(), RefreshMode::Reuse);
    let records = vec![
        json!({"first_pokemon": 1, "second_pokemon": 2, "winner": 1}),
        json!({"first_pokemon": 2, "second_pokemon": 3, "winner": 3}),
    ];

    store.save(Resource::Combats, &records).unwrap();
    store.save(Resource::Combats, &records).unwrap();

    let snapshot = store.load_if_fresh(Resource::Combats).unwrap().unwrap();
    assert_eq!(snapshot.records(), records.as_slice());
    assert_eq!(snapshot.resource(), Resource::Combats);
}

#[test]
fn test_force_mode_skips_cache_but_keeps_file() {
    let dir = TempDir::new().unwrap();
    FsRawStore::new(dir.path(), RefreshMode::Reuse)
        .save(Resource::Pokemon, &[json!({"id": 1})])
        .unwrap();

    let forced = FsRawStore::new(dir.path(), RefreshMode::Force);
    assert!(forced.load_if_fresh(Resource::Pokemon).unwrap().is_none());
    assert_eq!(forced.load(Resource::Pokemon).unwrap().unwrap().len(), 1);
}

#[test]
fn test_save_leaves_no_temp_files() {
    let dir = TempDir::new().unwrap();
    let store = FsRawStore::new(dir.path(), RefreshMode::Reuse);
    for resource in Resource::ALL {
        store.save(resource, &[json!({"id": 1})]).unwrap();
    }

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "combats.json",
            "combats.lock",
            "pokemon_attributes.json",
            "pokemon_attributes.lock",
            "pokemon_basic.json",
            "pokemon_basic.lock",
        ]
    );
}

#[test]
fn test_replaced_snapshot_is_complete() {
    let dir = TempDir::new().unwrap();
    let store = FsRawStore::new(dir.path(), RefreshMode::Reuse);
    store
        .save(Resource::Combats, &[json!({"winner": 1})])
        .unwrap();

    let larger: Vec<_> = (0..500).map(|i| json!({"winner": i})).collect();
    store.save(Resource::Combats, &larger).unwrap();

    let contents = std::fs::read_to_string(store.path_for(Resource::Combats)).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed["records"].as_array().unwrap().len(), 500);
}

#[test]
fn test_unusable_snapshots_are_reported() {
    let dir = TempDir::new().unwrap();
    let store = FsRawStore::new(dir.path(), RefreshMode::Reuse);
    store.save(Resource::Pokemon, &[json!({"id": 1})]).unwrap();
    std::fs::write(store.path_for(Resource::Combats), "{ truncated").unwrap();
    std::fs::write(
        store.path_for(Resource::PokemonAttributes),
        r#"{"schema_version": "0.9.0", "resource": "pokemon_attributes", "records": []}"#,
    )
    .unwrap();

    let error = store.load(Resource::Combats).unwrap_err();
    assert!(matches!(error, StoreError::DeserializationError(_)));
    assert!(error.is_unusable_snapshot());

    let entries = store.verify_all().unwrap();
    assert_eq!(entries.len(), 3);
    let valid: Vec<bool> = entries.iter().map(|e| e.outcome.is_ok()).collect();
    // sorted by file name: combats, pokemon_attributes, pokemon_basic
    assert_eq!(valid, vec![false, false, true]);
    assert!(matches!(
        entries[1].outcome,
        Err(StoreError::SchemaVersionMismatch { .. })
    ));
}

#[test]
fn test_legacy_array_snapshot_is_accepted() {
    let dir = TempDir::new().unwrap();
    let store = FsRawStore::new(dir.path(), RefreshMode::Reuse);
    std::fs::write(
        store.path_for(Resource::Combats),
        r#"[{"first_pokemon": 1, "second_pokemon": 2, "winner": 2}]"#,
    )
    .unwrap();

    let snapshot = store.load(Resource::Combats).unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
}
