//! Run report

use crate::output::OutputKind;
use crate::transform::aggregate::warning_summary;
use crate::transform::DataIntegrityWarning;
use crate::Resource;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// How a resource's snapshot was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOutcome {
    /// Snapshot reused without any request
    Reused {
        /// Records in the snapshot
        records: usize,
    },
    /// Snapshot fetched in full
    Fetched {
        /// Records fetched
        records: usize,
    },
    /// Previous snapshot extended with newly fetched records
    Merged {
        /// Records kept from the previous snapshot
        reused: usize,
        /// Records fetched this run
        fetched: usize,
    },
}

impl ResourceOutcome {
    /// Records in the resulting snapshot
    pub fn records(&self) -> usize {
        match self {
            Self::Reused { records } | Self::Fetched { records } => *records,
            Self::Merged { reused, fetched } => reused + fetched,
        }
    }

    /// Whether any request was made for this resource
    pub fn touched_network(&self) -> bool {
        !matches!(self, Self::Reused { .. })
    }
}

impl fmt::Display for ResourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reused { records } => write!(f, "reused ({records} records)"),
            Self::Fetched { records } => write!(f, "fetched ({records} records)"),
            Self::Merged { reused, fetched } => {
                write!(f, "merged ({reused} reused + {fetched} fetched)")
            }
        }
    }
}

/// What a run produced
#[derive(Debug, Default)]
pub struct RunReport {
    /// Table name → written path
    pub manifest: BTreeMap<String, PathBuf>,
    /// Table name → write error
    pub write_failures: BTreeMap<String, String>,
    /// Data-quality issues found by the transform
    pub warnings: Vec<DataIntegrityWarning>,
    /// How each resource was obtained
    pub resources: BTreeMap<Resource, ResourceOutcome>,
}

impl RunReport {
    /// Record a written table
    pub fn record_written(&mut self, kind: OutputKind, path: PathBuf) {
        self.manifest.insert(kind.manifest_key().to_string(), path);
    }

    /// Record a table that could not be written
    pub fn record_failed(&mut self, kind: OutputKind, error: impl fmt::Display) {
        self.write_failures
            .insert(kind.manifest_key().to_string(), error.to_string());
    }

    /// Whether every table was written
    pub fn is_complete(&self) -> bool {
        self.write_failures.is_empty()
    }

    /// Number of tables written
    pub fn tables_written(&self) -> usize {
        self.manifest.len()
    }

    /// Whether `resource` was served from the store
    pub fn reused(&self, resource: Resource) -> bool {
        matches!(
            self.resources.get(&resource),
            Some(ResourceOutcome::Reused { .. })
        )
    }

    /// Warning counts per kind, sorted by kind
    pub fn warning_counts(&self) -> BTreeMap<&'static str, usize> {
        warning_summary(&self.warnings).into_iter().collect()
    }
}
