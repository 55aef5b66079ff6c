use pokemon_etl::fetcher::parser::PokemonParser;
use pokemon_etl::fetcher::FetcherError;
use serde_json::json;

#[test]
fn test_combat_ids_accept_numeric_strings() {
    let combat = PokemonParser::parse_combat(&json!({
        "first_pokemon": "12",
        "second_pokemon": 7,
        "winner": "7"
    }))
    .unwrap();

    assert_eq!(combat.first_pokemon, 12);
    assert_eq!(combat.second_pokemon, 7);
    assert_eq!(combat.winner, 7);
}

#[test]
fn test_combat_without_winner_is_rejected() {
    let error =
        PokemonParser::parse_combat(&json!({"first_pokemon": 1, "second_pokemon": 2})).unwrap_err();

    assert!(matches!(error, FetcherError::ParseError(ref msg) if msg.contains("winner")));
}

#[test]
fn test_pokemon_without_name_is_rejected() {
    let error = PokemonParser::parse_pokemon(&json!({"id": 3, "name": "  "})).unwrap_err();
    assert!(matches!(error, FetcherError::ParseError(_)));
}

#[test]
fn test_types_are_deduplicated_in_order() {
    let pokemon = PokemonParser::parse_pokemon(&json!({
        "id": 6,
        "name": "Charizard",
        "types": [{"name": "Fire"}, "Flying", "Fire"]
    }))
    .unwrap();

    assert_eq!(pokemon.types, vec!["Fire", "Flying"]);
}

#[test]
fn test_record_id_ignores_non_objects() {
    assert_eq!(PokemonParser::record_id(&json!({"Id": "25"})), Some(25));
    assert_eq!(PokemonParser::record_id(&json!([1, 2])), None);
    assert_eq!(PokemonParser::record_id(&json!({"name": "Pikachu"})), None);
}
