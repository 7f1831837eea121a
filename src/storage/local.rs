//! Local filesystem storage implementation.
//!
//! Every document is written atomically (temporary file, then rename), so a
//! failed write leaves the previous version in place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{AppError, Result};
use crate::models::{PathsConfig, RunSnapshot};
use crate::storage::{NotifiedState, NotifiedStore, SnapshotStore};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    notified_key: String,
    snapshot_key: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_paths(root_dir, &PathsConfig::default())
    }

    /// Create a LocalStorage with custom file names.
    pub fn with_paths(root_dir: impl Into<PathBuf>, paths: &PathsConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            notified_key: paths.notified_file.clone(),
            snapshot_key: paths.snapshot_file.clone(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Write JSON data.
    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes)
    }

    /// Read bytes, returning None if file doesn't exist.
    fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl NotifiedStore for LocalStorage {
    fn read_state(&self) -> Result<Option<NotifiedState>> {
        self.read_json(&self.notified_key)
    }

    fn write_state(&self, state: &NotifiedState) -> Result<()> {
        self.write_json(&self.notified_key, state)
    }
}

impl SnapshotStore for LocalStorage {
    fn read_snapshot(&self) -> Result<Option<RunSnapshot>> {
        self.read_json(&self.snapshot_key)
    }

    fn write_snapshot(&self, snapshot: &RunSnapshot) -> Result<()> {
        self.write_json(&self.snapshot_key, snapshot)
    }
}
