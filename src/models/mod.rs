// src/models/mod.rs

//! Domain models for the exam monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod exam;
mod snapshot;

// Re-export all public types
pub use config::{
    Config, FetchConfig, FilterConfig, NotifyChannel, NotifyConfig, PathsConfig, TrackerConfig,
};
pub use exam::{ExamLink, ExamRecord, MatchedExam, RawAnnouncement, SignupPeriod};
pub use snapshot::{RunSnapshot, RunSummary, SnapshotFilter};
