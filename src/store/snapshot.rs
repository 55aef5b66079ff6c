//! Snapshot document format

use super::{StoreError, StoreResult};
use crate::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Current snapshot schema version
pub const SNAPSHOT_SCHEMA_VERSION: &str = "1.0.0";

/// Raw, unaggregated record set of one resource as last fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    schema_version: String,
    resource: Resource,
    fetched_at: DateTime<Utc>,
    records: Vec<Value>,
}

impl Snapshot {
    /// Snapshot of `records` fetched now
    pub fn new(resource: Resource, records: Vec<Value>) -> Self {
        Self::fetched_at(resource, records, Utc::now())
    }

    /// Snapshot with an explicit fetch time
    pub fn fetched_at(resource: Resource, records: Vec<Value>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            resource,
            fetched_at,
            records,
        }
    }

    /// Resource the records belong to
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// When the records were fetched
    pub fn fetch_time(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Records in API order
    pub fn records(&self) -> &[Value] {
        &self.records
    }

    /// Take the records
    pub fn into_records(self) -> Vec<Value> {
        self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::SerializationError(e.to_string()))
    }

    /// Parse a snapshot document for `expected`
    ///
    /// A bare JSON array (the layout older runs wrote) is accepted as a
    /// legacy snapshot stamped with `legacy_time`.
    pub fn from_json(
        contents: &str,
        expected: Resource,
        legacy_time: DateTime<Utc>,
    ) -> StoreResult<Self> {
        let value: Value = serde_json::from_str(contents)
            .map_err(|e| StoreError::DeserializationError(e.to_string()))?;

        if let Value::Array(records) = value {
            info!(
                resource = %expected,
                records = records.len(),
                "Loaded legacy array snapshot"
            );
            return Ok(Self::fetched_at(expected, records, legacy_time));
        }

        let found_version = value
            .get("schema_version")
            .and_then(Value::as_str)
            .unwrap_or("<missing>");
        if found_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersionMismatch {
                expected: SNAPSHOT_SCHEMA_VERSION.to_string(),
                found: found_version.to_string(),
            });
        }

        let snapshot: Snapshot = serde_json::from_value(value)
            .map_err(|e| StoreError::DeserializationError(e.to_string()))?;

        if snapshot.resource != expected {
            return Err(StoreError::ResourceMismatch {
                expected: expected.to_string(),
                found: snapshot.resource.to_string(),
            });
        }

        Ok(snapshot)
    }
}
