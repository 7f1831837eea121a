//! Run snapshot written at the end of every monitor pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FilterConfig, MatchedExam};

/// Filter settings echoed into the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFilter {
    pub exam_types: Vec<String>,
    pub locations: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub include_keywords: Vec<String>,
}

impl From<&FilterConfig> for SnapshotFilter {
    fn from(filter: &FilterConfig) -> Self {
        Self {
            exam_types: filter.exam_types.clone(),
            locations: filter.locations.clone(),
            exclude_keywords: filter.exclude_keywords.clone(),
            include_keywords: filter.include_keywords.clone(),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Announcements extracted
    pub total_found: usize,
    /// Announcements passing every filter rule
    pub matched: usize,
    /// Announcements whose exam date is today or later
    pub future_exams: usize,
    /// Matched announcements not reported before
    pub new_exams: usize,
}

/// Full result of one run, persisted as `exams.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub last_updated: DateTime<Utc>,
    pub config: SnapshotFilter,
    pub summary: RunSummary,
    pub exams: Vec<MatchedExam>,
}

impl RunSnapshot {
    pub fn new(filter: &FilterConfig, summary: RunSummary, exams: Vec<MatchedExam>) -> Self {
        Self {
            last_updated: Utc::now(),
            config: SnapshotFilter::from(filter),
            summary,
            exams,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_uses_camel_case_keys() {
        let filter = FilterConfig {
            exam_types: vec!["B类".to_string()],
            ..FilterConfig::default()
        };
        let summary = RunSummary {
            total_found: 2,
            matched: 1,
            future_exams: 1,
            new_exams: 1,
        };

        let value = serde_json::to_value(RunSnapshot::new(&filter, summary, Vec::new())).unwrap();
        assert_eq!(value["config"]["examTypes"][0], "B类");
        assert!(value["config"]["includeKeywords"].as_array().unwrap().is_empty());
        assert_eq!(value["summary"]["totalFound"], 2);
        assert_eq!(value["summary"]["futureExams"], 1);
        assert!(value["lastUpdated"].is_string());
    }
}
