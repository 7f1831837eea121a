// src/services/tracker.rs

//! Notified-set tracker.
//!
//! Remembers which announcement ids have already been pushed so later runs
//! only report new ones. The set is read once when the tracker is created
//! and written back by [`NotifiedSetTracker::save`]. Storage problems are
//! logged and never abort a run.

use std::collections::{BTreeSet, HashMap};

use chrono::{Days, Local, NaiveDate};

use crate::models::ExamRecord;
use crate::storage::{NotifiedState, NotifiedStore};

/// Set of already-notified ids backed by a [`NotifiedStore`].
pub struct NotifiedSetTracker<'a> {
    store: &'a dyn NotifiedStore,
    ids: BTreeSet<String>,
    dirty: bool,
}

impl<'a> NotifiedSetTracker<'a> {
    /// Load the persisted set. Missing or unreadable state yields an empty set.
    pub fn load(store: &'a dyn NotifiedStore) -> Self {
        let ids = match store.read_state() {
            Ok(Some(state)) => {
                let ids: BTreeSet<String> = state.notified_ids.into_iter().collect();
                log::info!("Loaded {} previously notified exam id(s)", ids.len());
                ids
            }
            Ok(None) => {
                log::info!("No notified-exam history found, starting a new one");
                BTreeSet::new()
            }
            Err(e) => {
                log::warn!("Failed to load notified-exam history: {}. Starting empty.", e);
                BTreeSet::new()
            }
        };

        Self {
            store,
            ids,
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Tracked ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Records not yet notified, in input order.
    ///
    /// Records without an id cannot be deduplicated and are always new.
    pub fn filter_new<T>(&self, records: &[T]) -> Vec<T>
    where
        T: AsRef<ExamRecord> + Clone,
    {
        let fresh: Vec<T> = records
            .iter()
            .filter(|r| match r.as_ref().id.as_deref() {
                Some(id) => !self.ids.contains(id),
                None => true,
            })
            .cloned()
            .collect();

        if fresh.is_empty() {
            log::info!("No new exams (all matches were notified before)");
        } else {
            log::info!("Found {} new exam(s):", fresh.len());
            for record in &fresh {
                let record = record.as_ref();
                log::info!(
                    "    - {} (id: {})",
                    record.title,
                    record.id.as_deref().unwrap_or("none")
                );
            }
        }

        fresh
    }

    /// Remember the ids of delivered records.
    pub fn mark_notified<T: AsRef<ExamRecord>>(&mut self, records: &[T]) {
        for record in records {
            if let Some(id) = record.as_ref().id.as_deref() {
                if self.ids.insert(id.to_string()) {
                    self.dirty = true;
                }
            }
        }
    }

    /// Persist the set if it changed since the last load or save.
    ///
    /// Returns whether a write succeeded. A failed write is logged and the
    /// set stays marked as changed.
    pub fn save(&mut self) -> bool {
        if !self.dirty {
            log::debug!("Notified-exam history unchanged, nothing to save");
            return false;
        }

        let state = NotifiedState::new(self.ids.iter().cloned().collect());
        match self.store.write_state(&state) {
            Ok(()) => {
                self.dirty = false;
                log::info!("Saved {} notified exam id(s)", state.count);
                true
            }
            Err(e) => {
                log::error!("Failed to save notified-exam history: {}", e);
                false
            }
        }
    }

    /// Drop ids whose exam took place more than `retention_days` ago.
    pub fn evict_older_than<T: AsRef<ExamRecord>>(
        &mut self,
        retention_days: u32,
        snapshot: &[T],
    ) -> usize {
        self.evict_older_than_on(retention_days, snapshot, Local::now().date_naive())
    }

    /// Eviction relative to an explicit date.
    ///
    /// Only ids found in `snapshot` with a readable exam date can be evicted.
    pub fn evict_older_than_on<T: AsRef<ExamRecord>>(
        &mut self,
        retention_days: u32,
        snapshot: &[T],
        today: NaiveDate,
    ) -> usize {
        let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(retention_days))) else {
            return 0;
        };

        let mut dated: HashMap<&str, NaiveDate> = HashMap::new();
        for record in snapshot {
            let record = record.as_ref();
            let (Some(id), Some(raw)) = (record.id.as_deref(), record.exam_date.as_deref()) else {
                continue;
            };
            if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                // Keep the latest date if an id shows up twice
                dated
                    .entry(id)
                    .and_modify(|d| *d = (*d).max(day))
                    .or_insert(day);
            }
        }

        let before = self.ids.len();
        self.ids
            .retain(|id| dated.get(id.as_str()).is_none_or(|day| *day >= cutoff));
        let removed = before - self.ids.len();

        if removed > 0 {
            self.dirty = true;
            log::info!("Evicted {} notified id(s) with exams before {}", removed, cutoff);
        }
        removed
    }
}
