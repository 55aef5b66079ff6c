use pokemon_etl::transform::{self, DataIntegrityWarning};
use pokemon_etl::Resource;
use serde_json::{json, Value};

fn roster() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "Bulbasaur", "types": "Grass/Poison", "attack": 49}),
        json!({"id": 2, "name": "Charmander", "types": "Fire", "attack": 52}),
        json!({"id": 3, "name": "Missingno"}),
    ]
}

#[test]
fn test_untyped_pokemon_counts_as_unknown() {
    let output = transform::transform(&roster(), &[]);

    let by_type: Vec<(String, u32)> = output
        .tables
        .by_type
        .iter()
        .map(|row| (row.type_name.clone(), row.count))
        .collect();
    assert_eq!(
        by_type,
        vec![
            ("Fire".to_string(), 1),
            ("Grass".to_string(), 1),
            ("Poison".to_string(), 1),
            ("Unknown".to_string(), 1),
        ]
    );
}

#[test]
fn test_pokemon_without_combats_has_no_win_rate() {
    let output = transform::transform(&roster(), &[]);

    assert_eq!(output.tables.stats.len(), 3);
    assert!(output.tables.stats.iter().all(|row| row.total_combats == 0));
    assert!(output.tables.stats.iter().all(|row| row.win_rate.is_none()));
}

#[test]
fn test_mirror_and_foreign_winner_combats_are_warnings() {
    let combats = vec![
        json!({"first_pokemon": 1, "second_pokemon": 1, "winner": 1}),
        json!({"first_pokemon": 1, "second_pokemon": 2, "winner": 3}),
        json!({"first_pokemon": 1, "second_pokemon": 2, "winner": 2}),
    ];

    let output = transform::transform(&roster(), &combats);

    assert_eq!(output.warnings.len(), 2);
    assert!(output
        .warnings
        .iter()
        .all(|w| matches!(w, DataIntegrityWarning::InvalidCombat { .. })));
    let charmander = output.tables.stats.iter().find(|r| r.id == 2).unwrap();
    assert_eq!((charmander.wins, charmander.losses), (1, 0));
    assert_eq!(charmander.win_rate, Some(1.0));
}

#[test]
fn test_malformed_records_are_skipped_with_warning() {
    let combats = vec![json!({"first_pokemon": 1}), json!("garbage")];

    let output = transform::transform(&roster(), &combats);

    assert!(output.combats.is_empty());
    assert_eq!(
        output
            .warnings
            .iter()
            .filter(|w| matches!(
                w,
                DataIntegrityWarning::MalformedRecord {
                    resource: Resource::Combats,
                    ..
                }
            ))
            .count(),
        2
    );
}

#[test]
fn test_top_tables_break_ties_by_id() {
    let combats = vec![
        json!({"first_pokemon": 1, "second_pokemon": 3, "winner": 1}),
        json!({"first_pokemon": 2, "second_pokemon": 3, "winner": 2}),
    ];

    let output = transform::transform(&roster(), &combats);

    let winners: Vec<i64> = output.tables.top10_winners.iter().map(|r| r.id).collect();
    let losers: Vec<i64> = output.tables.top10_losers.iter().map(|r| r.id).collect();
    assert_eq!(winners, vec![1, 2, 3]);
    assert_eq!(losers, vec![3, 1, 2]);
}
