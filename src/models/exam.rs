//! Exam announcement data structures.

use serde::{Deserialize, Serialize};

/// A link to one announcement, as listed on the notice board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExamLink {
    /// Absolute URL of the announcement page
    pub url: String,

    /// Title shown on the board
    pub title: String,

    /// Publish date shown on the board, if any
    pub publish_date: Option<String>,
}

/// Raw announcement text together with its link metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawAnnouncement {
    pub url: String,
    pub title: String,
    pub publish_date: Option<String>,
    /// Plain page text, already stripped of markup
    pub full_text: String,
}

impl RawAnnouncement {
    /// Attach fetched page text to a board link.
    pub fn from_link(link: ExamLink, full_text: impl Into<String>) -> Self {
        Self {
            url: link.url,
            title: link.title,
            publish_date: link.publish_date,
            full_text: full_text.into(),
        }
    }
}

/// Registration window found in an announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignupPeriod {
    /// Matched source text
    pub raw: String,
    /// Normalized `YYYY-MM-DD`
    pub start: String,
    /// Normalized `YYYY-MM-DD`
    pub end: String,
}

/// Structured exam record derived from one announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    /// Numeric identifier parsed from the URL; `None` when the URL has none
    pub id: Option<String>,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub publish_date: Option<String>,

    /// Normalized `YYYY-MM-DD`
    #[serde(default)]
    pub exam_date: Option<String>,
    #[serde(default)]
    pub exam_date_raw: Option<String>,

    #[serde(default)]
    pub signup_period: Option<SignupPeriod>,

    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub exam_types: Vec<String>,

    #[serde(default)]
    pub content_preview: String,
    #[serde(default)]
    pub full_content: String,
}

/// A record that passed the filter, with its match explanation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchedExam {
    #[serde(flatten)]
    pub record: ExamRecord,

    /// Joined per-rule justifications, e.g. `类型: B类; 地点: 广州`
    #[serde(default)]
    pub matched_reasons: String,
}

impl AsRef<ExamRecord> for ExamRecord {
    fn as_ref(&self) -> &ExamRecord {
        self
    }
}

impl AsRef<ExamRecord> for MatchedExam {
    fn as_ref(&self) -> &ExamRecord {
        &self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ExamRecord {
        ExamRecord {
            id: Some("8789915".to_string()),
            url: "http://www.ragd.org.cn/newsinfo/8789915.html".to_string(),
            title: "广东省A、B类业余电台操作技能考试报名通知".to_string(),
            publish_date: Some("2025-10-16".to_string()),
            exam_date: Some("2025-11-08".to_string()),
            exam_date_raw: Some("11月8日".to_string()),
            signup_period: None,
            locations: vec!["广州".to_string()],
            venue: None,
            exam_types: vec!["A类".to_string(), "B类".to_string()],
            content_preview: String::new(),
            full_content: String::new(),
        }
    }

    #[test]
    fn test_matched_exam_flattens_record() {
        let exam = MatchedExam {
            record: sample_record(),
            matched_reasons: "类型: B类".to_string(),
        };

        let value = serde_json::to_value(&exam).unwrap();
        assert_eq!(value["id"], "8789915");
        assert_eq!(value["examDate"], "2025-11-08");
        assert_eq!(value["matchedReasons"], "类型: B类");
        assert!(value["signupPeriod"].is_null());
    }

    #[test]
    fn test_record_tolerates_missing_optional_fields() {
        let json = r#"{"id": null, "url": "u", "title": "t"}"#;
        let record: ExamRecord = serde_json::from_str(json).unwrap();
        assert!(record.id.is_none());
        assert!(record.exam_date.is_none());
        assert!(record.locations.is_empty());
    }
}
