//! Raw snapshot storage
//!
//! One snapshot per [`Resource`], replaced wholesale on save. Readers either
//! see the previous snapshot or the new one, never a partial write.
//!
//! Two-phase contract used by the pipeline:
//! 1. [`RawStore::load_if_fresh`] returns the cached snapshot unless a refresh is forced
//! 2. [`RawStore::save`] atomically replaces the snapshot after a successful fetch

use crate::Resource;
use serde_json::Value;

pub mod fs;
pub mod memory;
pub mod snapshot;

pub use fs::{FsRawStore, VerifyEntry};
pub use memory::MemoryRawStore;
pub use snapshot::{Snapshot, SNAPSHOT_SCHEMA_VERSION};

/// Whether cached snapshots may be reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Reuse a snapshot when one exists
    #[default]
    Reuse,
    /// Ignore snapshots and re-fetch everything
    Force,
}

impl RefreshMode {
    /// Mode for a force-refresh flag
    pub fn from_force_flag(force: bool) -> Self {
        if force {
            Self::Force
        } else {
            Self::Reuse
        }
    }
}

/// Snapshot storage backend
pub trait RawStore: Send + Sync {
    /// Refresh mode this store was opened with
    fn mode(&self) -> RefreshMode;

    /// Load the snapshot for `resource` regardless of the refresh mode
    fn load(&self, resource: Resource) -> StoreResult<Option<Snapshot>>;

    /// Cached snapshot, or `None` when absent or when a refresh is forced
    fn load_if_fresh(&self, resource: Resource) -> StoreResult<Option<Snapshot>> {
        match self.mode() {
            RefreshMode::Force => Ok(None),
            RefreshMode::Reuse => self.load(resource),
        }
    }

    /// Atomically replace the snapshot for `resource`
    fn save(&self, resource: Resource, records: &[Value]) -> StoreResult<Snapshot>;
}

/// Raw store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Snapshot written by an incompatible version
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// Snapshot file above the size guard
    #[error("snapshot too large: {size} bytes (max: {max} bytes)")]
    SnapshotTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// Snapshot content belongs to another resource
    #[error("snapshot holds `{found}`, expected `{expected}`")]
    ResourceMismatch {
        /// Resource the file was opened for
        expected: String,
        /// Resource recorded in the file
        found: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),
}

impl StoreError {
    /// Whether the snapshot exists but cannot be used (re-fetching replaces it)
    pub fn is_unusable_snapshot(&self) -> bool {
        matches!(
            self,
            Self::SchemaVersionMismatch { .. }
                | Self::SnapshotTooLarge { .. }
                | Self::ResourceMismatch { .. }
                | Self::DeserializationError(_)
        )
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
