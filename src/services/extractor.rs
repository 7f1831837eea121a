// src/services/extractor.rs

//! Record extraction from announcement text.
//!
//! Every field is produced by an ordered table of rules. Rules are tried in
//! table order and the first one that yields a value wins; a rule that finds
//! nothing (or finds an impossible calendar date) simply passes to the next.
//! Nothing here fails: unresolved fields become `None` or empty.

use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::{Captures, Regex};

use crate::models::{ExamRecord, RawAnnouncement, SignupPeriod};
use crate::utils::text::preview;
use crate::utils::url::extract_exam_id;

/// Characters kept in `content_preview`.
pub const PREVIEW_CHARS: usize = 200;

/// Recognized regions, in reporting order.
pub const GAZETTEER: [&str; 21] = [
    "广州", "深圳", "东莞", "佛山", "惠州", "珠海", "中山", "江门", "肇庆", "汕头", "潮州",
    "揭阳", "汕尾", "湛江", "茂名", "阳江", "云浮", "韶关", "清远", "梅州", "河源",
];

/// Exam classes and the spellings that indicate them.
pub const EXAM_CLASSES: [(&str, [&str; 2]); 3] = [
    ("A类", ["A类", "A級"]),
    ("B类", ["B类", "B級"]),
    ("C类", ["C类", "C級"]),
];

/// Where the year of a matched date comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum YearSource {
    /// Pattern captures year, month and day
    Captured,
    /// Pattern captures month and day; year is inferred
    Inferred,
}

const EXAM_DATE_PATTERNS: [(&str, &str, YearSource); 2] = [
    (
        "full_date",
        r"([0-9]{4})年([0-9]{1,2})月([0-9]{1,2})日",
        YearSource::Captured,
    ),
    (
        "month_day",
        r"([0-9]{1,2})月([0-9]{1,2})日",
        YearSource::Inferred,
    ),
];

const SIGNUP_PATTERNS: [(&str, &str); 2] = [
    (
        "labeled_window",
        r"报名时间[：:]\s*([0-9]{4}年[0-9]{1,2}月[0-9]{1,2}日).*?[至到].*?([0-9]{4}年[0-9]{1,2}月[0-9]{1,2}日)",
    ),
    (
        "bare_window",
        r"([0-9]{4}年[0-9]{1,2}月[0-9]{1,2}日)\s*[至到]\s*([0-9]{4}年[0-9]{1,2}月[0-9]{1,2}日)",
    ),
];

const VENUE_PATTERNS: [(&str, &str); 2] = [
    ("exam_location", r"考试地点[：:]\s*([^\n。；]{5,100})"),
    ("location", r"地\s*点[：:]\s*([^\n。；]{5,100})"),
];

const CHINESE_DATE_PATTERN: &str = r"([0-9]{4})年([0-9]{1,2})月([0-9]{1,2})日";

/// A named pattern in a rule table.
struct PatternRule<K> {
    name: &'static str,
    pattern: Regex,
    kind: K,
}

fn compile<K: Copy>(table: &[(&'static str, &str, K)]) -> Vec<PatternRule<K>> {
    table
        .iter()
        .filter_map(|&(name, source, kind)| match Regex::new(source) {
            Ok(pattern) => Some(PatternRule {
                name,
                pattern,
                kind,
            }),
            Err(e) => {
                log::error!("Extraction rule '{}' failed to compile: {}", name, e);
                None
            }
        })
        .collect()
}

fn compile_plain(table: &[(&'static str, &str)]) -> Vec<PatternRule<()>> {
    let with_kind: Vec<_> = table.iter().map(|&(name, source)| (name, source, ())).collect();
    compile(&with_kind)
}

static EXAM_DATE_RULES: LazyLock<Vec<PatternRule<YearSource>>> =
    LazyLock::new(|| compile(&EXAM_DATE_PATTERNS));

static SIGNUP_RULES: LazyLock<Vec<PatternRule<()>>> =
    LazyLock::new(|| compile_plain(&SIGNUP_PATTERNS));

static VENUE_RULES: LazyLock<Vec<PatternRule<()>>> =
    LazyLock::new(|| compile_plain(&VENUE_PATTERNS));

static CHINESE_DATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(CHINESE_DATE_PATTERN).ok());

/// An exam date as found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    /// Matched substring, e.g. `11月8日`
    pub raw: String,
    pub date: NaiveDate,
    /// Name of the rule that produced the match
    pub rule: &'static str,
}

/// Stateless record extractor.
///
/// The only setting is the reference date used to infer the year of
/// `M月D日` dates; it defaults to the local calendar date at extraction time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordExtractor {
    reference_date: Option<NaiveDate>,
}

impl RecordExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Infer years relative to a fixed date instead of today.
    pub fn with_reference_date(date: NaiveDate) -> Self {
        Self {
            reference_date: Some(date),
        }
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Build a structured record from one announcement.
    pub fn extract(&self, raw: &RawAnnouncement) -> ExamRecord {
        let text = raw.full_text.as_str();
        let exam_date = self.match_exam_date(text);

        ExamRecord {
            id: extract_exam_id(&raw.url),
            url: raw.url.clone(),
            title: raw.title.clone(),
            publish_date: raw.publish_date.clone(),
            exam_date: exam_date.as_ref().map(|m| format_date(m.date)),
            exam_date_raw: exam_date.map(|m| m.raw),
            signup_period: extract_signup_period(text),
            locations: extract_locations(text),
            venue: extract_venue(text),
            exam_types: extract_exam_types(text),
            content_preview: preview(text, PREVIEW_CHARS),
            full_content: raw.full_text.clone(),
        }
    }

    /// Exam date from the first rule whose pattern matches.
    ///
    /// Later rules are not consulted once a pattern matches, so an impossible
    /// calendar date yields `None`.
    pub fn match_exam_date(&self, text: &str) -> Option<DateMatch> {
        let (rule, caps) = EXAM_DATE_RULES
            .iter()
            .find_map(|rule| rule.pattern.captures(text).map(|caps| (rule, caps)))?;

        let date = match rule.kind {
            YearSource::Captured => {
                ymd(capture_num(&caps, 1)?, capture_num(&caps, 2)?, capture_num(&caps, 3)?)
            }
            YearSource::Inferred => {
                let month = capture_num(&caps, 1)?;
                let year = infer_year(month, self.today());
                ymd(year, month, capture_num(&caps, 2)?)
            }
        }?;

        Some(DateMatch {
            raw: caps.get(0)?.as_str().to_string(),
            date,
            rule: rule.name,
        })
    }

    /// Normalized `YYYY-MM-DD` exam date.
    pub fn exam_date(&self, text: &str) -> Option<String> {
        self.match_exam_date(text).map(|m| format_date(m.date))
    }

    /// Source substring the exam date was read from.
    pub fn exam_date_raw(&self, text: &str) -> Option<String> {
        self.match_exam_date(text).map(|m| m.raw)
    }
}

/// Year for a bare `M月D日` date: this year unless the month has already
/// passed, in which case next year.
pub fn infer_year(month: u32, today: NaiveDate) -> i32 {
    if month >= today.month() {
        today.year()
    } else {
        today.year() + 1
    }
}

/// Registration window from the first rule whose pattern matches.
///
/// Both bounds must resolve; otherwise the result is `None`.
pub fn extract_signup_period(text: &str) -> Option<SignupPeriod> {
    let caps = SIGNUP_RULES
        .iter()
        .find_map(|rule| rule.pattern.captures(text))?;

    let start = parse_chinese_date(caps.get(1)?.as_str())?;
    let end = parse_chinese_date(caps.get(2)?.as_str())?;
    Some(SignupPeriod {
        raw: caps.get(0)?.as_str().to_string(),
        start: format_date(start),
        end: format_date(end),
    })
}

/// Gazetteer regions mentioned in the text, in gazetteer order.
pub fn extract_locations(text: &str) -> Vec<String> {
    GAZETTEER
        .iter()
        .filter(|city| text.contains(*city))
        .map(|city| city.to_string())
        .collect()
}

/// Free-text venue from a labeled field.
pub fn extract_venue(text: &str) -> Option<String> {
    VENUE_RULES.iter().find_map(|rule| {
        let venue = rule.pattern.captures(text)?.get(1)?.as_str().trim();
        (!venue.is_empty()).then(|| venue.to_string())
    })
}

/// Exam classes mentioned in the text, in class order.
pub fn extract_exam_types(text: &str) -> Vec<String> {
    EXAM_CLASSES
        .iter()
        .filter(|(_, spellings)| spellings.iter().any(|s| text.contains(s)))
        .map(|(label, _)| label.to_string())
        .collect()
}

/// Parse a full `YYYY年M月D日` date.
pub fn parse_chinese_date(s: &str) -> Option<NaiveDate> {
    let caps = CHINESE_DATE.as_ref()?.captures(s)?;
    ymd(capture_num(&caps, 1)?, capture_num(&caps, 2)?, capture_num(&caps, 3)?)
}

fn capture_num<T: std::str::FromStr>(caps: &Captures<'_>, index: usize) -> Option<T> {
    caps.get(index)?.as_str().parse().ok()
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
