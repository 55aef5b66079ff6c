//! Raw records to output tables
//!
//! Parsing, aggregation and table shaping are pure functions over the
//! snapshot records; nothing here touches the network or the filesystem.

use crate::fetcher::parser::PokemonParser;
use crate::{Combat, Pokemon, Resource};
use serde_json::Value;
use tracing::info;

pub mod aggregate;
pub mod tables;

pub use aggregate::{aggregate, Aggregation, CategoryRow, DataIntegrityWarning, StatsRow};
pub use tables::{CombatRow, PokemonRow, StatsTableRow, TypeCountRow};

/// All six tables of a run
#[derive(Debug, Clone, Default)]
pub struct Tables {
    /// `pokemon.csv`
    pub pokemon: Vec<PokemonRow>,
    /// `combats.csv`
    pub combats: Vec<CombatRow>,
    /// `pokemon_stats.csv`
    pub stats: Vec<StatsTableRow>,
    /// `pokemon_by_type.csv`
    pub by_type: Vec<TypeCountRow>,
    /// `top10_winners.csv`
    pub top10_winners: Vec<StatsTableRow>,
    /// `top10_losers.csv`
    pub top10_losers: Vec<StatsTableRow>,
}

/// Result of [`transform`]
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    /// Parsed Pokémon, ordered by id
    pub pokemon: Vec<Pokemon>,
    /// Parsed combats, in snapshot order
    pub combats: Vec<Combat>,
    /// Stats and type distribution
    pub aggregation: Aggregation,
    /// Rows ready to be written
    pub tables: Tables,
    /// Parse and aggregation warnings
    pub warnings: Vec<DataIntegrityWarning>,
}

/// Parse Pokémon records, reporting the ones that cannot be used
pub fn parse_pokemon(records: &[Value]) -> (Vec<Pokemon>, Vec<DataIntegrityWarning>) {
    let mut pokemon = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let parsed = PokemonParser::parse_pokemon(record)
            .map_err(|e| e.to_string())
            .and_then(|p| p.validate().map(|()| p));
        match parsed {
            Ok(p) => pokemon.push(p),
            Err(reason) => warnings.push(DataIntegrityWarning::MalformedRecord {
                resource: Resource::PokemonAttributes,
                index,
                reason,
            }),
        }
    }

    pokemon.sort_by_key(|p| p.id);
    (pokemon, warnings)
}

/// Parse combat records, reporting the ones that cannot be used
pub fn parse_combats(records: &[Value]) -> (Vec<Combat>, Vec<DataIntegrityWarning>) {
    let mut combats = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match PokemonParser::parse_combat(record) {
            Ok(combat) => combats.push(combat),
            Err(e) => warnings.push(DataIntegrityWarning::MalformedRecord {
                resource: Resource::Combats,
                index,
                reason: e.to_string(),
            }),
        }
    }

    (combats, warnings)
}

/// Turn the attribute and combat snapshots into tables
pub fn transform(attribute_records: &[Value], combat_records: &[Value]) -> TransformOutput {
    let (pokemon, mut warnings) = parse_pokemon(attribute_records);
    let (combats, combat_warnings) = parse_combats(combat_records);
    warnings.extend(combat_warnings);

    let aggregation = aggregate(&pokemon, &combats);
    warnings.extend(aggregation.warnings.iter().cloned());

    let stats = tables::stats_rows(&aggregation.stats, &pokemon);
    let tables = Tables {
        pokemon: pokemon.iter().map(PokemonRow::from).collect(),
        combats: tables::combat_rows(&combats, &pokemon),
        top10_winners: tables::top_winners(&stats),
        top10_losers: tables::top_losers(&stats),
        by_type: aggregation.categories.iter().map(TypeCountRow::from).collect(),
        stats,
    };

    info!(
        pokemon = pokemon.len(),
        combats = combats.len(),
        types = tables.by_type.len(),
        warnings = warnings.len(),
        "Transform complete"
    );

    TransformOutput {
        pokemon,
        combats,
        aggregation,
        tables,
        warnings,
    }
}
