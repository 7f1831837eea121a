// src/services/filter.rs

//! Criteria filter.
//!
//! Evaluates an [`ExamRecord`] against a [`FilterConfig`] with an ordered
//! list of rules. Evaluation stops at the first rejecting rule; a passing
//! rule may contribute a [`MatchReason`] to the final explanation.

use std::fmt;

use chrono::{Local, NaiveDate};

use crate::models::{ExamRecord, FilterConfig};

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No exam date could be read from the announcement
    NoExamDate,
    /// Exam date is before today
    Expired,
    /// None of the record's exam classes is configured
    TypeMismatch,
    /// None of the record's regions is configured
    LocationMismatch,
    /// Text contains an excluded keyword
    ExcludedKeyword(String),
    /// Text contains none of the required keywords
    MissingKeyword,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoExamDate => f.write_str("未识别到考试日期"),
            Self::Expired => f.write_str("考试已过期"),
            Self::TypeMismatch => f.write_str("考试类型不匹配"),
            Self::LocationMismatch => f.write_str("地点不匹配"),
            Self::ExcludedKeyword(kw) => write!(f, "包含排除关键词: {kw}"),
            Self::MissingKeyword => f.write_str("不包含必需关键词"),
        }
    }
}

/// Justification recorded by a passing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    Types(Vec<String>),
    Locations(Vec<String>),
    Keywords(Vec<String>),
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, values) = match self {
            Self::Types(v) => ("类型", v),
            Self::Locations(v) => ("地点", v),
            Self::Keywords(v) => ("关键词", v),
        };
        write!(f, "{}: {}", label, values.join(","))
    }
}

/// Verdict for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Matched(Vec<MatchReason>),
    Rejected(Rejection),
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// All justifications joined with `; ` on a match, the single rejection
    /// reason otherwise.
    pub fn explanation(&self) -> String {
        match self {
            Self::Matched(reasons) => reasons
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
            Self::Rejected(rejection) => rejection.to_string(),
        }
    }
}

type RuleOutcome = Result<Option<MatchReason>, Rejection>;
type Rule = fn(&CriteriaFilter, &ExamRecord, NaiveDate) -> RuleOutcome;

/// Evaluation order.
const RULES: [(&str, Rule); 5] = [
    ("future_date", CriteriaFilter::future_date_rule),
    ("exam_type", CriteriaFilter::exam_type_rule),
    ("location", CriteriaFilter::location_rule),
    ("exclude_keyword", CriteriaFilter::exclude_keyword_rule),
    ("include_keyword", CriteriaFilter::include_keyword_rule),
];

/// Pure filter over a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct CriteriaFilter {
    config: FilterConfig,
}

impl CriteriaFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Evaluate against today's local date.
    pub fn evaluate(&self, record: &ExamRecord) -> MatchResult {
        self.evaluate_on(record, Local::now().date_naive())
    }

    /// Evaluate with an explicit evaluation date.
    pub fn evaluate_on(&self, record: &ExamRecord, today: NaiveDate) -> MatchResult {
        let mut reasons = Vec::new();
        for (name, rule) in RULES {
            match rule(self, record, today) {
                Ok(Some(reason)) => reasons.push(reason),
                Ok(None) => {}
                Err(rejection) => {
                    log::debug!(
                        "Rejected {:?} at rule {}: {}",
                        record.title,
                        name,
                        rejection
                    );
                    return MatchResult::Rejected(rejection);
                }
            }
        }
        MatchResult::Matched(reasons)
    }

    /// Whether the exam takes place today or later.
    pub fn is_future_exam(record: &ExamRecord) -> bool {
        Self::is_future_exam_on(record, Local::now().date_naive())
    }

    pub fn is_future_exam_on(record: &ExamRecord, today: NaiveDate) -> bool {
        exam_day(record).is_some_and(|day| day >= today)
    }

    fn future_date_rule(&self, record: &ExamRecord, today: NaiveDate) -> RuleOutcome {
        match exam_day(record) {
            None => Err(Rejection::NoExamDate),
            Some(day) if day < today => Err(Rejection::Expired),
            Some(_) => Ok(None),
        }
    }

    fn exam_type_rule(&self, record: &ExamRecord, _today: NaiveDate) -> RuleOutcome {
        intersect(&self.config.exam_types, &record.exam_types)
            .map(|found| found.map(MatchReason::Types))
            .ok_or(Rejection::TypeMismatch)
    }

    fn location_rule(&self, record: &ExamRecord, _today: NaiveDate) -> RuleOutcome {
        intersect(&self.config.locations, &record.locations)
            .map(|found| found.map(MatchReason::Locations))
            .ok_or(Rejection::LocationMismatch)
    }

    fn exclude_keyword_rule(&self, record: &ExamRecord, _today: NaiveDate) -> RuleOutcome {
        let haystack = searchable_text(record);
        match self
            .config
            .exclude_keywords
            .iter()
            .find(|kw| haystack.contains(kw.as_str()))
        {
            Some(kw) => Err(Rejection::ExcludedKeyword(kw.clone())),
            None => Ok(None),
        }
    }

    fn include_keyword_rule(&self, record: &ExamRecord, _today: NaiveDate) -> RuleOutcome {
        if self.config.include_keywords.is_empty() {
            return Ok(None);
        }
        let haystack = searchable_text(record);
        let found: Vec<String> = self
            .config
            .include_keywords
            .iter()
            .filter(|kw| haystack.contains(kw.as_str()))
            .cloned()
            .collect();
        if found.is_empty() {
            Err(Rejection::MissingKeyword)
        } else {
            Ok(Some(MatchReason::Keywords(found)))
        }
    }
}

/// Record values that appear in `wanted`.
///
/// `Some(None)` when `wanted` is empty (no constraint), `Some(Some(found))`
/// on overlap, `None` when there is no overlap.
fn intersect(wanted: &[String], actual: &[String]) -> Option<Option<Vec<String>>> {
    if wanted.is_empty() {
        return Some(None);
    }
    let found: Vec<String> = actual
        .iter()
        .filter(|value| wanted.contains(*value))
        .cloned()
        .collect();
    (!found.is_empty()).then_some(Some(found))
}

fn exam_day(record: &ExamRecord) -> Option<NaiveDate> {
    let raw = record.exam_date.as_deref()?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn searchable_text(record: &ExamRecord) -> String {
    format!("{}{}", record.title, record.full_content)
}
