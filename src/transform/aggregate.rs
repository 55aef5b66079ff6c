//! Win/loss aggregation and type distribution

use crate::{Combat, Pokemon, Resource};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Category used for Pokémon that list no type, so every entity is counted at least once
pub const UNCATEGORIZED: &str = "Unknown";

/// Data-quality issue found while aggregating; never aborts a run
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataIntegrityWarning {
    /// Combat references a Pokémon id missing from the entity snapshot
    #[error("combat #{combat_index} references unknown pokemon {entity_id}")]
    UnknownEntity {
        /// Position of the combat in the combat snapshot
        combat_index: usize,
        /// Unresolved id
        entity_id: i64,
    },

    /// Winner is neither participant, or both sides are the same Pokémon
    #[error("combat #{combat_index} is inconsistent: {reason}")]
    InvalidCombat {
        /// Position of the combat in the combat snapshot
        combat_index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// Raw record could not be parsed
    #[error("{resource} record #{index} skipped: {reason}")]
    MalformedRecord {
        /// Resource the record came from
        resource: Resource,
        /// Position in the snapshot
        index: usize,
        /// Parse failure
        reason: String,
    },

    /// Same id listed more than once; the first record is kept
    #[error("pokemon {id} appears more than once, keeping the first record")]
    DuplicateEntity {
        /// Duplicated id
        id: i64,
    },
}

/// Per-Pokémon combat statistics
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    /// Pokémon id
    pub entity_id: i64,
    /// Combats won
    pub wins: u32,
    /// Combats lost
    pub losses: u32,
    /// wins + losses
    pub total_combats: u32,
    /// wins / total_combats; `None` when the Pokémon never fought
    pub win_rate: Option<f64>,
}

/// Number of Pokémon per type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRow {
    /// Type name
    pub category: String,
    /// Pokémon having this type
    pub count: u32,
}

/// Output of [`aggregate`]
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// One row per distinct Pokémon, ordered by id
    pub stats: Vec<StatsRow>,
    /// One row per type, ordered by name
    pub categories: Vec<CategoryRow>,
    /// Issues found along the way
    pub warnings: Vec<DataIntegrityWarning>,
}

#[derive(Default)]
struct Tally {
    wins: u32,
    losses: u32,
}

/// Join Pokémon with combats into stats and type distribution rows
///
/// A combat is counted only when both participants are known, they differ,
/// and the winner is one of them. Everything else becomes a warning.
pub fn aggregate(entities: &[Pokemon], combats: &[Combat]) -> Aggregation {
    let mut warnings = Vec::new();
    let mut tallies: BTreeMap<i64, Tally> = BTreeMap::new();
    let mut categories: BTreeMap<String, u32> = BTreeMap::new();

    for pokemon in entities {
        if tallies.contains_key(&pokemon.id) {
            warnings.push(DataIntegrityWarning::DuplicateEntity { id: pokemon.id });
            continue;
        }
        tallies.insert(pokemon.id, Tally::default());

        if pokemon.categories().is_empty() {
            *categories.entry(UNCATEGORIZED.to_string()).or_default() += 1;
        }
        for category in pokemon.categories() {
            *categories.entry(category.clone()).or_default() += 1;
        }
    }

    for (combat_index, combat) in combats.iter().enumerate() {
        let unknown: Vec<i64> = [combat.first_pokemon, combat.second_pokemon]
            .into_iter()
            .filter(|id| !tallies.contains_key(id))
            .collect();
        if !unknown.is_empty() {
            warnings.extend(unknown.into_iter().map(|entity_id| {
                DataIntegrityWarning::UnknownEntity {
                    combat_index,
                    entity_id,
                }
            }));
            continue;
        }

        if let Err(reason) = combat.validate() {
            warnings.push(DataIntegrityWarning::InvalidCombat {
                combat_index,
                reason,
            });
            continue;
        }

        let Some(loser) = combat.loser() else {
            continue;
        };
        if let Some(tally) = tallies.get_mut(&combat.winner) {
            tally.wins += 1;
        }
        if let Some(tally) = tallies.get_mut(&loser) {
            tally.losses += 1;
        }
    }

    let stats = tallies
        .into_iter()
        .map(|(entity_id, tally)| {
            let total_combats = tally.wins + tally.losses;
            let win_rate =
                (total_combats > 0).then(|| f64::from(tally.wins) / f64::from(total_combats));
            StatsRow {
                entity_id,
                wins: tally.wins,
                losses: tally.losses,
                total_combats,
                win_rate,
            }
        })
        .collect::<Vec<_>>();

    let categories = categories
        .into_iter()
        .map(|(category, count)| CategoryRow { category, count })
        .collect();

    if !warnings.is_empty() {
        warn!(count = warnings.len(), "Data integrity warnings during aggregation");
        for warning in &warnings {
            debug!(%warning, "Data integrity warning");
        }
    }

    Aggregation {
        stats,
        categories,
        warnings,
    }
}

/// Count warnings per kind, for summaries
pub fn warning_summary(warnings: &[DataIntegrityWarning]) -> HashMap<&'static str, usize> {
    let mut summary = HashMap::new();
    for warning in warnings {
        let kind = match warning {
            DataIntegrityWarning::UnknownEntity { .. } => "unknown_entity",
            DataIntegrityWarning::InvalidCombat { .. } => "invalid_combat",
            DataIntegrityWarning::MalformedRecord { .. } => "malformed_record",
            DataIntegrityWarning::DuplicateEntity { .. } => "duplicate_entity",
        };
        *summary.entry(kind).or_insert(0) += 1;
    }
    summary
}
