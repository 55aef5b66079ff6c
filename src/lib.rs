//! # Pokémon ETL Library
//!
//! Extracts paginated, authenticated records from the Pokémon REST API, keeps
//! them as raw snapshots on disk and turns them into tabular combat statistics
//! consumed by the dashboard.
//!
//! ## Features
//!
//! - **Session Handling**: Bearer token login with reactive, single-flight refresh on 401
//! - **Resilient Fetching**: Bounded retries with exponential backoff and `Retry-After` support
//! - **Incremental Extraction**: Snapshots are reused unless a full refresh is forced
//! - **Atomic Persistence**: Snapshots and CSV outputs are replaced via temp file + rename
//! - **Aggregation**: Per-Pokémon win/loss/win-rate and per-type distributions
//!
//! ## Quick Start
//!
//! ```no_run
//! use pokemon_etl::pipeline::{PipelineConfig, PipelineExecutor};
//! use pokemon_etl::fetcher::ApiConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiConfig::new("https://pokemon.example.com", "ash", "pikachu");
//! let config = PipelineConfig::new(api, "data/raw", "data/processed");
//!
//! let executor = PipelineExecutor::from_config(&config)?;
//! let report = executor.run().await?;
//! for (name, path) in report.manifest.iter() {
//!     println!("{name}: {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - Session manager, retry controller and paginated API access
//! - [`store`] - Raw snapshot persistence (filesystem and in-memory)
//! - [`transform`] - Aggregation of Pokémon and combat records into tables
//! - [`output`] - CSV writers and output layout
//! - [`pipeline`] - Orchestration of extract → transform → write
//! - [`cli`] - Command line surface

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Remote API access
pub mod fetcher;

/// Observability counters and histograms
pub mod metrics;

/// Tabular output writers
pub mod output;

/// Extraction and transformation orchestration
pub mod pipeline;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Raw snapshot storage
pub mod store;

/// Aggregation of raw records into derived tables
pub mod transform;

/// A Pokémon as served by `/pokemon/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pokemon {
    /// Pokédex id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Numeric stats keyed by lower-case attribute name (hp, attack, ...)
    pub numeric_attributes: BTreeMap<String, f64>,
    /// Types in the order the API lists them, without duplicates
    pub types: Vec<String>,
    /// Legendary flag
    pub is_legendary: bool,
}

impl Pokemon {
    /// Validate entity integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.id <= 0 {
            return Err(format!("Pokemon id must be positive, got {}", self.id));
        }

        if self.name.trim().is_empty() {
            return Err(format!("Pokemon {} has an empty name", self.id));
        }

        if let Some((name, value)) = self
            .numeric_attributes
            .iter()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(format!(
                "Pokemon {} has a non-finite attribute {name}={value}",
                self.id
            ));
        }

        Ok(())
    }

    /// Categories this Pokémon is counted under in the type distribution
    pub fn categories(&self) -> &[String] {
        &self.types
    }

    /// Look up a numeric attribute by name
    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.numeric_attributes.get(name).copied()
    }

    /// Primary type (empty when the API sent none)
    pub fn type_1(&self) -> &str {
        self.types.first().map(String::as_str).unwrap_or("")
    }

    /// Secondary type (empty for single-type Pokémon)
    pub fn type_2(&self) -> &str {
        self.types.get(1).map(String::as_str).unwrap_or("")
    }

    /// Types joined the way the API writes them ("Grass/Poison")
    pub fn types_label(&self) -> String {
        self.types.join("/")
    }
}

/// A single combat between two Pokémon
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Combat {
    /// Id of the first participant
    pub first_pokemon: i64,
    /// Id of the second participant
    pub second_pokemon: i64,
    /// Id of the winner
    pub winner: i64,
}

impl Combat {
    /// Validate that the winner is one of two distinct participants
    pub fn validate(&self) -> Result<(), String> {
        if self.first_pokemon == self.second_pokemon {
            return Err(format!(
                "Combat has the same participant on both sides ({})",
                self.first_pokemon
            ));
        }

        if self.winner != self.first_pokemon && self.winner != self.second_pokemon {
            return Err(format!(
                "Winner {} is not a participant of {} vs {}",
                self.winner, self.first_pokemon, self.second_pokemon
            ));
        }

        Ok(())
    }

    /// Id of the losing participant, if the winner is one of the participants
    pub fn loser(&self) -> Option<i64> {
        if self.winner == self.first_pokemon {
            Some(self.second_pokemon)
        } else if self.winner == self.second_pokemon {
            Some(self.first_pokemon)
        } else {
            None
        }
    }
}

/// Named collections served by the upstream API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Paginated basic listing (`/pokemon`)
    #[serde(rename = "pokemon_basic")]
    Pokemon,
    /// Per-id detail records (`/pokemon/{id}`)
    PokemonAttributes,
    /// Paginated combat listing (`/combats`)
    Combats,
}

impl Resource {
    /// All resources in extraction order
    pub const ALL: [Resource; 3] = [
        Resource::Pokemon,
        Resource::PokemonAttributes,
        Resource::Combats,
    ];

    /// Name used for the snapshot file and in logs
    pub fn snapshot_name(&self) -> &'static str {
        match self {
            Resource::Pokemon => "pokemon_basic",
            Resource::PokemonAttributes => "pokemon_attributes",
            Resource::Combats => "combats",
        }
    }

    /// Endpoint path relative to the API base URL
    pub fn endpoint(&self) -> &'static str {
        match self {
            Resource::Pokemon | Resource::PokemonAttributes => "/pokemon",
            Resource::Combats => "/combats",
        }
    }

    /// JSON key holding the records of a list page
    pub fn list_key(&self) -> &'static str {
        match self {
            Resource::Pokemon | Resource::PokemonAttributes => "pokemons",
            Resource::Combats => "combats",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.snapshot_name())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pokemon_basic" | "pokemon" => Ok(Resource::Pokemon),
            "pokemon_attributes" => Ok(Resource::PokemonAttributes),
            "combats" => Ok(Resource::Combats),
            _ => Err(format!("Invalid resource: {s}")),
        }
    }
}
