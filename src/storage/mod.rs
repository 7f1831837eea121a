//! Storage abstractions for monitor state.
//!
//! Two documents are persisted between runs:
//!
//! ```text
//! storage/
//! ├── config.toml           # Monitor configuration
//! ├── notified_exams.json   # Ids already pushed to the user
//! └── exams.json            # Snapshot of the latest run
//! ```

pub mod local;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::RunSnapshot;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Persisted notified-id set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotifiedState {
    /// ISO 8601 timestamp of the last save
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notified_ids: Vec<String>,
    #[serde(default)]
    pub count: usize,
}

impl NotifiedState {
    pub fn new(notified_ids: Vec<String>) -> Self {
        Self {
            last_updated: Some(Utc::now()),
            count: notified_ids.len(),
            notified_ids,
        }
    }
}

/// Backend for the notified-id set.
pub trait NotifiedStore {
    /// Read the persisted state; `Ok(None)` when nothing was ever saved.
    fn read_state(&self) -> Result<Option<NotifiedState>>;

    /// Replace the persisted state.
    fn write_state(&self, state: &NotifiedState) -> Result<()>;
}

/// Backend for run snapshots.
pub trait SnapshotStore {
    /// Read the latest snapshot; `Ok(None)` when no run has been recorded.
    fn read_snapshot(&self) -> Result<Option<RunSnapshot>>;

    /// Replace the latest snapshot.
    fn write_snapshot(&self, snapshot: &RunSnapshot) -> Result<()>;
}
