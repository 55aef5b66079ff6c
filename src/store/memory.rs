//! In-memory snapshot store

use super::snapshot::Snapshot;
use super::{RawStore, RefreshMode, StoreResult};
use crate::Resource;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Snapshot store backed by a map; used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryRawStore {
    mode: RefreshMode,
    snapshots: Mutex<HashMap<Resource, Snapshot>>,
    saves: Mutex<Vec<Resource>>,
}

impl MemoryRawStore {
    /// Empty store
    pub fn new(mode: RefreshMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Seed a snapshot without counting it as a save
    pub fn insert(&self, snapshot: Snapshot) {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.resource(), snapshot);
    }

    /// Resources saved so far, in order
    pub fn saved(&self) -> Vec<Resource> {
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RawStore for MemoryRawStore {
    fn mode(&self) -> RefreshMode {
        self.mode
    }

    fn load(&self, resource: Resource) -> StoreResult<Option<Snapshot>> {
        Ok(self
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&resource)
            .cloned())
    }

    fn save(&self, resource: Resource, records: &[Value]) -> StoreResult<Snapshot> {
        let snapshot = Snapshot::new(resource, records.to_vec());
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource, snapshot.clone());
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource);
        Ok(snapshot)
    }
}
