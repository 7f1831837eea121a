//! Service layer for the exam monitor.
//!
//! This module contains the business logic for:
//! - Record extraction (`RecordExtractor`)
//! - Criteria filtering (`CriteriaFilter`)
//! - Notified-set tracking (`NotifiedSetTracker`)
//! - Notice board retrieval (`BoardFetcher`)
//! - Push delivery (`PushNotifier`)

pub mod extractor;
mod fetcher;
mod filter;
mod notifier;
mod tracker;

pub use extractor::RecordExtractor;
pub use fetcher::{AnnouncementSource, BoardFetcher, parse_board, parse_detail, select_recent};
pub use filter::{CriteriaFilter, MatchReason, MatchResult, Rejection};
pub use notifier::{Delivery, Notifier, PushNotifier, format_markdown, format_title};
pub use tracker::NotifiedSetTracker;
