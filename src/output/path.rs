//! Output file layout

use std::path::{Path, PathBuf};

/// Tables produced by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputKind {
    /// One row per Pokémon with its attributes
    Pokemon,
    /// One row per combat, ids replaced by names
    Combats,
    /// Win/loss statistics per Pokémon
    Stats,
    /// Pokémon count per type
    ByType,
    /// Ten Pokémon with the most wins
    Top10Winners,
    /// Ten Pokémon with the most losses
    Top10Losers,
}

impl OutputKind {
    /// All tables in write order
    pub const ALL: [OutputKind; 6] = [
        OutputKind::Pokemon,
        OutputKind::Combats,
        OutputKind::Stats,
        OutputKind::ByType,
        OutputKind::Top10Winners,
        OutputKind::Top10Losers,
    ];

    /// Key in the run manifest
    pub fn manifest_key(&self) -> &'static str {
        match self {
            OutputKind::Pokemon => "pokemon",
            OutputKind::Combats => "combats",
            OutputKind::Stats => "stats",
            OutputKind::ByType => "by_type",
            OutputKind::Top10Winners => "top10_winners",
            OutputKind::Top10Losers => "top10_losers",
        }
    }

    /// File name inside the output directory
    pub fn file_name(&self) -> &'static str {
        match self {
            OutputKind::Pokemon => "pokemon.csv",
            OutputKind::Combats => "combats.csv",
            OutputKind::Stats => "pokemon_stats.csv",
            OutputKind::ByType => "pokemon_by_type.csv",
            OutputKind::Top10Winners => "top10_winners.csv",
            OutputKind::Top10Losers => "top10_losers.csv",
        }
    }
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.manifest_key())
    }
}

/// Where the tables of a run are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    dir: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of one table
    pub fn path_for(&self, kind: OutputKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}
