//! Filesystem snapshot store
//!
//! Layout: `{dir}/{snapshot_name}.json` plus an advisory `{snapshot_name}.lock`.
//! Saves write a temp file in the same directory, fsync it and rename it over
//! the target, so an interrupted run leaves the previous snapshot intact.

use super::snapshot::Snapshot;
use super::{RawStore, RefreshMode, StoreError, StoreResult};
use crate::Resource;
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Maximum snapshot file size (64 MiB) accepted on load
pub const MAX_SNAPSHOT_SIZE: u64 = 64 * 1024 * 1024;

/// Snapshot store rooted at a directory
#[derive(Debug, Clone)]
pub struct FsRawStore {
    dir: PathBuf,
    mode: RefreshMode,
}

/// Result of checking one snapshot file
#[derive(Debug)]
pub struct VerifyEntry {
    /// File that was checked
    pub path: PathBuf,
    /// Resource, record count and fetch time, or why the file is unusable
    pub outcome: StoreResult<(Resource, usize, DateTime<Utc>)>,
}

impl FsRawStore {
    /// Open a store in `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>, mode: RefreshMode) -> Self {
        Self {
            dir: dir.into(),
            mode,
        }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot path for `resource`
    pub fn path_for(&self, resource: Resource) -> PathBuf {
        self.dir.join(format!("{}.json", resource.snapshot_name()))
    }

    /// Check every `*.json` file in the store directory
    pub fn verify_all(&self) -> StoreResult<Vec<VerifyEntry>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::IoError(e.to_string())),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|path| {
                let outcome = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .ok_or_else(|| StoreError::IoError("invalid file name".to_string()))
                    .and_then(|stem| {
                        Resource::from_str(stem).map_err(|_| StoreError::ResourceMismatch {
                            expected: "a known resource".to_string(),
                            found: stem.to_string(),
                        })
                    })
                    .and_then(|resource| read_snapshot(&path, resource))
                    .map(|snapshot| (snapshot.resource(), snapshot.len(), snapshot.fetch_time()));
                VerifyEntry { path, outcome }
            })
            .collect())
    }
}

impl RawStore for FsRawStore {
    fn mode(&self) -> RefreshMode {
        self.mode
    }

    fn load(&self, resource: Resource) -> StoreResult<Option<Snapshot>> {
        let path = self.path_for(resource);
        if !path.exists() {
            debug!(%resource, path = %path.display(), "No snapshot on disk");
            return Ok(None);
        }
        read_snapshot(&path, resource).map(Some)
    }

    fn save(&self, resource: Resource, records: &[Value]) -> StoreResult<Snapshot> {
        let snapshot = Snapshot::new(resource, records.to_vec());
        write_snapshot(&self.path_for(resource), &snapshot)?;
        Ok(snapshot)
    }
}

fn open_lock_file(path: &Path) -> StoreResult<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path.with_extension("lock"))
        .map_err(|e| StoreError::LockError(format!("Failed to create lock file: {e}")))
}

fn read_snapshot(path: &Path, resource: Resource) -> StoreResult<Snapshot> {
    debug!(%resource, path = %path.display(), "Loading snapshot");

    let lock = RwLock::new(open_lock_file(path)?);
    let _guard = lock
        .read()
        .map_err(|e| StoreError::LockError(format!("Failed to acquire read lock: {e}")))?;

    let metadata = std::fs::metadata(path).map_err(|e| StoreError::IoError(e.to_string()))?;
    if metadata.len() > MAX_SNAPSHOT_SIZE {
        return Err(StoreError::SnapshotTooLarge {
            size: metadata.len(),
            max: MAX_SNAPSHOT_SIZE,
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|e| StoreError::IoError(e.to_string()))?;
    let legacy_time = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let snapshot = Snapshot::from_json(&contents, resource, legacy_time).map_err(|e| {
        warn!(%resource, error = %e, "Snapshot unusable");
        e
    })?;

    info!(
        %resource,
        records = snapshot.len(),
        fetched_at = %snapshot.fetch_time(),
        "Snapshot loaded"
    );
    Ok(snapshot)
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> StoreResult<()> {
    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir).map_err(|e| StoreError::IoError(e.to_string()))?;

    let json = snapshot.to_json()?;

    let mut lock = RwLock::new(open_lock_file(path)?);
    let _guard = lock
        .write()
        .map_err(|e| StoreError::LockError(format!("Failed to acquire write lock: {e}")))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| StoreError::IoError(format!("Failed to create temp file: {e}")))?;

    temp_file
        .write_all(json.as_bytes())
        .map_err(|e| StoreError::IoError(format!("Failed to write to temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| StoreError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| StoreError::IoError(format!("Failed to sync temp file: {e}")))?;

    temp_file
        .persist(path)
        .map_err(|e| StoreError::IoError(format!("Failed to persist temp file: {e}")))?;

    // Make the rename itself durable
    if let Ok(dir) = File::open(parent_dir) {
        let _ = dir.sync_all();
    }

    info!(
        resource = %snapshot.resource(),
        path = %path.display(),
        records = snapshot.len(),
        "Snapshot saved"
    );
    Ok(())
}
