//! In-memory storage for tests and dry runs.

use std::sync::{Mutex, MutexGuard};

use crate::error::{AppError, Result};
use crate::models::RunSnapshot;
use crate::storage::{NotifiedState, NotifiedStore, SnapshotStore};

/// Storage that keeps documents in memory.
///
/// With `failing_writes` every write returns an I/O error and leaves the
/// stored documents untouched.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<Option<NotifiedState>>,
    snapshot: Mutex<Option<RunSnapshot>>,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with previously persisted ids.
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids.into_iter().map(Into::into).collect();
        Self {
            state: Mutex::new(Some(NotifiedState::new(ids))),
            ..Self::default()
        }
    }

    /// Reject every write.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Ids currently stored, in stored order.
    pub fn stored_ids(&self) -> Vec<String> {
        lock(&self.state)
            .as_ref()
            .map(|s| s.notified_ids.clone())
            .unwrap_or_default()
    }

    /// Latest stored snapshot.
    pub fn stored_snapshot(&self) -> Option<RunSnapshot> {
        lock(&self.snapshot).clone()
    }

    pub fn set_snapshot(&self, snapshot: RunSnapshot) {
        *lock(&self.snapshot) = Some(snapshot);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(AppError::Io(std::io::Error::other("write rejected")));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl NotifiedStore for MemoryStorage {
    fn read_state(&self) -> Result<Option<NotifiedState>> {
        Ok(lock(&self.state).clone())
    }

    fn write_state(&self, state: &NotifiedState) -> Result<()> {
        self.check_writable()?;
        *lock(&self.state) = Some(state.clone());
        Ok(())
    }
}

impl SnapshotStore for MemoryStorage {
    fn read_snapshot(&self) -> Result<Option<RunSnapshot>> {
        Ok(lock(&self.snapshot).clone())
    }

    fn write_snapshot(&self, snapshot: &RunSnapshot) -> Result<()> {
        self.check_writable()?;
        *lock(&self.snapshot) = Some(snapshot.clone());
        Ok(())
    }
}
