//! Output table rows
//!
//! Shapes the parsed records and the aggregation into the rows of the six
//! CSV tables read by the dashboard.

use super::aggregate::{CategoryRow, StatsRow};
use crate::output::TableRow;
use crate::{Combat, Pokemon};
use serde::Serialize;
use serde_json::Number;
use std::collections::HashMap;

/// Rows kept in each top-10 table
pub const TOP_N: usize = 10;

/// Decimal places kept for the win rate
const WIN_RATE_DECIMALS: i32 = 4;

/// `pokemon.csv`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PokemonRow {
    /// Pokédex id
    pub id: i64,
    /// Name
    pub name: String,
    /// Types joined with `/`
    pub types: String,
    /// Primary type
    pub type_1: String,
    /// Secondary type, empty when absent
    pub type_2: String,
    /// Hit points
    pub hp: Option<Number>,
    /// Attack
    pub attack: Option<Number>,
    /// Defense
    pub defense: Option<Number>,
    /// Special attack
    pub sp_attack: Option<Number>,
    /// Special defense
    pub sp_defense: Option<Number>,
    /// Speed
    pub speed: Option<Number>,
    /// Generation
    pub generation: Option<Number>,
    /// Legendary flag
    pub legendary: bool,
}

impl TableRow for PokemonRow {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "name",
        "types",
        "type_1",
        "type_2",
        "hp",
        "attack",
        "defense",
        "sp_attack",
        "sp_defense",
        "speed",
        "generation",
        "legendary",
    ];
}

impl From<&Pokemon> for PokemonRow {
    fn from(pokemon: &Pokemon) -> Self {
        let stat = |name: &str| pokemon.attribute(name).and_then(to_number);
        Self {
            id: pokemon.id,
            name: pokemon.name.clone(),
            types: pokemon.types_label(),
            type_1: pokemon.type_1().to_string(),
            type_2: pokemon.type_2().to_string(),
            hp: stat("hp"),
            attack: stat("attack"),
            defense: stat("defense"),
            sp_attack: stat("sp_attack"),
            sp_defense: stat("sp_defense"),
            speed: stat("speed"),
            generation: stat("generation"),
            legendary: pokemon.is_legendary,
        }
    }
}

/// `combats.csv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombatRow {
    /// First participant (name when known)
    pub first_pokemon: String,
    /// Second participant (name when known)
    pub second_pokemon: String,
    /// Winner (name when known)
    pub winner: String,
}

impl TableRow for CombatRow {
    const HEADERS: &'static [&'static str] = &["first_pokemon", "second_pokemon", "winner"];
}

/// `pokemon_stats.csv`, `top10_winners.csv` and `top10_losers.csv`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsTableRow {
    /// Pokédex id
    pub id: i64,
    /// Name
    pub name: String,
    /// Combats won
    pub wins: u32,
    /// Combats lost
    pub losses: u32,
    /// wins + losses
    pub total_combats: u32,
    /// Rounded win rate; empty when the Pokémon never fought
    pub win_rate: Option<f64>,
    /// Types joined with `/`
    pub types: String,
    /// Attack
    pub attack: Option<Number>,
    /// Defense
    pub defense: Option<Number>,
    /// Hit points
    pub hp: Option<Number>,
    /// Speed
    pub speed: Option<Number>,
}

impl TableRow for StatsTableRow {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "name",
        "wins",
        "losses",
        "total_combats",
        "win_rate",
        "types",
        "attack",
        "defense",
        "hp",
        "speed",
    ];
}

/// `pokemon_by_type.csv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCountRow {
    /// Type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Pokémon having this type
    pub count: u32,
}

impl TableRow for TypeCountRow {
    const HEADERS: &'static [&'static str] = &["type", "count"];
}

impl From<&CategoryRow> for TypeCountRow {
    fn from(row: &CategoryRow) -> Self {
        Self {
            type_name: row.category.clone(),
            count: row.count,
        }
    }
}

/// Whole numbers print without a fractional part
fn to_number(value: f64) -> Option<Number> {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(Number::from(value as i64))
    } else {
        Number::from_f64(value)
    }
}

/// Round a win rate for output
pub fn round_win_rate(rate: f64) -> f64 {
    let factor = 10f64.powi(WIN_RATE_DECIMALS);
    (rate * factor).round() / factor
}

/// Combat rows with ids replaced by names where the id is known
pub fn combat_rows(combats: &[Combat], pokemon: &[Pokemon]) -> Vec<CombatRow> {
    let names: HashMap<i64, &str> = pokemon
        .iter()
        .rev()
        .map(|p| (p.id, p.name.as_str()))
        .collect();
    let display = |id: i64| {
        names
            .get(&id)
            .map(|name| name.to_string())
            .unwrap_or_else(|| id.to_string())
    };

    combats
        .iter()
        .map(|combat| CombatRow {
            first_pokemon: display(combat.first_pokemon),
            second_pokemon: display(combat.second_pokemon),
            winner: display(combat.winner),
        })
        .collect()
}

/// Join stats with Pokémon attributes, keeping the id order of `stats`
pub fn stats_rows(stats: &[StatsRow], pokemon: &[Pokemon]) -> Vec<StatsTableRow> {
    let mut by_id: HashMap<i64, &Pokemon> = HashMap::with_capacity(pokemon.len());
    for p in pokemon {
        by_id.entry(p.id).or_insert(p);
    }

    stats
        .iter()
        .map(|row| {
            let entity = by_id.get(&row.entity_id);
            let stat = |name: &str| {
                entity
                    .and_then(|p| p.attribute(name))
                    .and_then(to_number)
            };
            StatsTableRow {
                id: row.entity_id,
                name: entity.map(|p| p.name.clone()).unwrap_or_default(),
                wins: row.wins,
                losses: row.losses,
                total_combats: row.total_combats,
                win_rate: row.win_rate.map(round_win_rate),
                types: entity.map(|p| p.types_label()).unwrap_or_default(),
                attack: stat("attack"),
                defense: stat("defense"),
                hp: stat("hp"),
                speed: stat("speed"),
            }
        })
        .collect()
}

/// Ten rows with the most wins; ties go to the lower id
pub fn top_winners(rows: &[StatsTableRow]) -> Vec<StatsTableRow> {
    top_by(rows, |row| row.wins)
}

/// Ten rows with the most losses; ties go to the lower id
pub fn top_losers(rows: &[StatsTableRow]) -> Vec<StatsTableRow> {
    top_by(rows, |row| row.losses)
}

fn top_by(rows: &[StatsTableRow], key: impl Fn(&StatsTableRow) -> u32) -> Vec<StatsTableRow> {
    let mut sorted: Vec<&StatsTableRow> = rows.iter().collect();
    sorted.sort_by(|a, b| key(b).cmp(&key(a)).then(a.id.cmp(&b.id)));
    sorted.into_iter().take(TOP_N).cloned().collect()
}
