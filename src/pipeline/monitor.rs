// src/pipeline/monitor.rs

//! Monitor pipeline: fetch, extract, filter, deduplicate, notify, persist.

use chrono::{Local, NaiveDate};

use crate::error::Result;
use crate::models::{Config, ExamRecord, MatchedExam, RunSnapshot, RunSummary};
use crate::services::{
    AnnouncementSource, CriteriaFilter, Delivery, Notifier, NotifiedSetTracker, RecordExtractor,
};
use crate::storage::{NotifiedStore, SnapshotStore};
use crate::utils::console;

/// Outcome of one monitor run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Matched exams that had not been notified before this run
    pub new_exams: Vec<MatchedExam>,
    /// Whether the notifier confirmed delivery of `new_exams`
    pub delivered: bool,
}

/// Run one monitor pass against today's local date.
pub async fn run_monitor<S>(
    config: &Config,
    source: &dyn AnnouncementSource,
    notifier: &dyn Notifier,
    storage: &S,
) -> Result<RunReport>
where
    S: NotifiedStore + SnapshotStore,
{
    run_monitor_on(config, source, notifier, storage, Local::now().date_naive()).await
}

/// Run one monitor pass with `today` as the reference date.
///
/// Only fetch failures and snapshot write failures are returned as errors.
/// Tracker storage and notifier problems are logged and the run continues.
pub async fn run_monitor_on<S>(
    config: &Config,
    source: &dyn AnnouncementSource,
    notifier: &dyn Notifier,
    storage: &S,
    today: NaiveDate,
) -> Result<RunReport>
where
    S: NotifiedStore + SnapshotStore,
{
    console::header("Radio exam monitor");

    let mut tracker = NotifiedSetTracker::load(storage);
    if let Some(days) = config.tracker.retention_days {
        evict_stale(&mut tracker, storage, days, today);
    }

    let links = source.fetch_links().await?;
    if links.is_empty() {
        log::warn!("No exam notices found on the board");
        tracker.save();
        return Ok(RunReport::default());
    }

    let details = source.fetch_details(&links).await?;
    if details.is_empty() {
        log::warn!("Could not fetch any notice details");
        tracker.save();
        return Ok(RunReport::default());
    }

    log::info!("Extracting {} announcement(s)", details.len());
    let extractor = RecordExtractor::with_reference_date(today);
    let records: Vec<ExamRecord> = details.iter().map(|raw| extractor.extract(raw)).collect();

    log::info!("Filtering exams");
    let filter = CriteriaFilter::new(config.filter.clone());
    let matched = match_records(&filter, records.iter(), today);
    let future_exams = records
        .iter()
        .filter(|r| CriteriaFilter::is_future_exam_on(r, today))
        .count();

    let new_exams = tracker.filter_new(&matched);
    let mut delivered = false;
    if !new_exams.is_empty() {
        match notifier.send(&new_exams).await {
            Ok(Delivery::Delivered) => {
                tracker.mark_notified(&new_exams);
                delivered = true;
            }
            Ok(Delivery::Skipped) => {
                log::info!("Notification skipped; new exams stay unmarked");
            }
            Err(e) => {
                log::error!("Notification failed: {}", e);
            }
        }
    }
    tracker.save();

    let summary = RunSummary {
        total_found: records.len(),
        matched: matched.len(),
        future_exams,
        new_exams: new_exams.len(),
    };
    storage.write_snapshot(&RunSnapshot::new(&config.filter, summary, matched))?;

    console::summary(
        "Monitor complete",
        &[
            ("Notices found", summary.total_found.to_string()),
            ("Future exams", summary.future_exams.to_string()),
            ("Matched", summary.matched.to_string()),
            ("New", summary.new_exams.to_string()),
        ],
    );

    Ok(RunReport {
        summary,
        new_exams,
        delivered,
    })
}

fn match_records<'a>(
    filter: &CriteriaFilter,
    records: impl Iterator<Item = &'a ExamRecord>,
    today: NaiveDate,
) -> Vec<MatchedExam> {
    records
        .filter_map(|record| {
            let result = filter.evaluate_on(record, today);
            if !result.is_match() {
                log::debug!("Skipped {}: {}", record.title, result.explanation());
                return None;
            }

            let reasons = result.explanation();
            log::info!("  ✓ {}", record.title);
            if !reasons.is_empty() {
                console::sub_item(&format!("Matched: {reasons}"));
            }
            console::sub_item(&format!(
                "Exam date: {}",
                record.exam_date.as_deref().unwrap_or("unknown")
            ));
            console::sub_item(&format!("Link: {}", record.url));

            Some(MatchedExam {
                record: record.clone(),
                matched_reasons: reasons,
            })
        })
        .collect()
}

fn evict_stale<S>(tracker: &mut NotifiedSetTracker<'_>, storage: &S, days: u32, today: NaiveDate)
where
    S: SnapshotStore,
{
    match storage.read_snapshot() {
        Ok(Some(previous)) => {
            tracker.evict_older_than_on(days, &previous.exams, today);
        }
        Ok(None) => log::debug!("No previous snapshot, skipping eviction"),
        Err(e) => log::warn!("Could not read previous snapshot for eviction: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::AppError;
    use crate::models::{ExamLink, FilterConfig, RawAnnouncement};
    use crate::storage::MemoryStorage;

    struct FakeSource {
        pages: Vec<RawAnnouncement>,
    }

    impl FakeSource {
        fn new(pages: &[(&str, &str)]) -> Self {
            let pages = pages
                .iter()
                .map(|(id, text)| RawAnnouncement {
                    url: format!("http://www.ragd.org.cn/newsinfo/{id}.html"),
                    title: format!("通知 {id}"),
                    publish_date: Some("2025-10-01".to_string()),
                    full_text: text.to_string(),
                })
                .collect();
            Self { pages }
        }
    }

    #[async_trait]
    impl AnnouncementSource for FakeSource {
        async fn fetch_links(&self) -> Result<Vec<ExamLink>> {
            Ok(self
                .pages
                .iter()
                .map(|p| ExamLink {
                    url: p.url.clone(),
                    title: p.title.clone(),
                    publish_date: p.publish_date.clone(),
                })
                .collect())
        }

        async fn fetch_details(&self, _links: &[ExamLink]) -> Result<Vec<RawAnnouncement>> {
            Ok(self.pages.clone())
        }
    }

    /// Notifier returning a fixed outcome; `None` means a delivery error.
    struct FakeNotifier {
        outcome: Option<Delivery>,
        calls: Mutex<Vec<usize>>,
    }

    impl FakeNotifier {
        fn new(outcome: Option<Delivery>) -> Self {
            Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn send(&self, exams: &[MatchedExam]) -> Result<Delivery> {
            self.calls.lock().unwrap().push(exams.len());
            self.outcome
                .ok_or_else(|| AppError::notify("fake", "service unavailable"))
        }
    }

    const FUTURE_EXAM: &str = "考试时间：2025年11月8日\n考试地点：广州市天河区某某路1号\nB类操作技能考试";
    const PAST_EXAM: &str = "考试时间：2025年9月1日\n地点：广州\nB类考试";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 20).unwrap()
    }

    fn b_class_config() -> Config {
        Config {
            filter: FilterConfig {
                exam_types: vec!["B类".to_string()],
                ..FilterConfig::default()
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_only_future_matches_are_notified() {
        let source = FakeSource::new(&[("100", FUTURE_EXAM), ("101", PAST_EXAM)]);
        let notifier = FakeNotifier::new(Some(Delivery::Delivered));
        let storage = MemoryStorage::new();

        let report = run_monitor_on(&b_class_config(), &source, &notifier, &storage, today())
            .await
            .unwrap();

        assert_eq!(
            report.summary,
            RunSummary {
                total_found: 2,
                matched: 1,
                future_exams: 1,
                new_exams: 1,
            }
        );
        assert!(report.delivered);
        assert_eq!(notifier.calls(), vec![1]);
        assert_eq!(storage.stored_ids(), vec!["100"]);

        let snapshot = storage.stored_snapshot().unwrap();
        assert_eq!(snapshot.exams.len(), 1);
        assert_eq!(snapshot.exams[0].record.id.as_deref(), Some("100"));
        assert_eq!(snapshot.exams[0].matched_reasons, "类型: B类");
        assert_eq!(snapshot.config.exam_types, vec!["B类"]);
    }

    #[tokio::test]
    async fn test_known_ids_are_not_renotified() {
        let source = FakeSource::new(&[("100", FUTURE_EXAM)]);
        let notifier = FakeNotifier::new(Some(Delivery::Delivered));
        let storage = MemoryStorage::with_ids(["100"]);

        let report = run_monitor_on(&b_class_config(), &source, &notifier, &storage, today())
            .await
            .unwrap();

        assert!(report.new_exams.is_empty());
        assert!(!report.delivered);
        assert!(notifier.calls().is_empty());
        assert_eq!(storage.stored_snapshot().unwrap().summary.matched, 1);
    }

    #[tokio::test]
    async fn test_skipped_delivery_leaves_ids_unmarked() {
        let source = FakeSource::new(&[("100", FUTURE_EXAM)]);
        let notifier = FakeNotifier::new(Some(Delivery::Skipped));
        let storage = MemoryStorage::new();

        let report = run_monitor_on(&Config::default(), &source, &notifier, &storage, today())
            .await
            .unwrap();

        assert_eq!(report.new_exams.len(), 1);
        assert!(!report.delivered);
        assert!(storage.stored_ids().is_empty());
        assert!(storage.stored_snapshot().is_some());
    }

    #[tokio::test]
    async fn test_notifier_error_does_not_abort_run() {
        let source = FakeSource::new(&[("100", FUTURE_EXAM)]);
        let notifier = FakeNotifier::new(None);
        let storage = MemoryStorage::new();

        let report = run_monitor_on(&Config::default(), &source, &notifier, &storage, today())
            .await
            .unwrap();

        assert!(!report.delivered);
        assert!(storage.stored_ids().is_empty());
        assert_eq!(storage.stored_snapshot().unwrap().summary.new_exams, 1);
    }

    #[tokio::test]
    async fn test_empty_board_writes_no_snapshot() {
        let source = FakeSource::new(&[]);
        let notifier = FakeNotifier::new(Some(Delivery::Delivered));
        let storage = MemoryStorage::new();

        let report = run_monitor_on(&Config::default(), &source, &notifier, &storage, today())
            .await
            .unwrap();

        assert_eq!(report.summary, RunSummary::default());
        assert!(storage.stored_snapshot().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_write_failure_is_returned() {
        let source = FakeSource::new(&[("100", FUTURE_EXAM)]);
        let notifier = FakeNotifier::new(Some(Delivery::Delivered));
        let storage = MemoryStorage::new().failing_writes();

        let result =
            run_monitor_on(&Config::default(), &source, &notifier, &storage, today()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_retention_evicts_ids_from_previous_snapshot() {
        let storage = MemoryStorage::with_ids(["555"]);
        let old = RecordExtractor::with_reference_date(today()).extract(&RawAnnouncement {
            url: "http://www.ragd.org.cn/newsinfo/555.html".to_string(),
            title: "旧考试".to_string(),
            publish_date: None,
            full_text: "考试时间：2025年1月11日".to_string(),
        });
        storage.set_snapshot(RunSnapshot::new(
            &FilterConfig::default(),
            RunSummary::default(),
            vec![MatchedExam {
                record: old,
                matched_reasons: String::new(),
            }],
        ));

        let mut config = Config::default();
        config.tracker.retention_days = Some(30);
        let source = FakeSource::new(&[("100", FUTURE_EXAM)]);
        let notifier = FakeNotifier::new(Some(Delivery::Delivered));

        run_monitor_on(&config, &source, &notifier, &storage, today())
            .await
            .unwrap();

        assert_eq!(storage.stored_ids(), vec!["100"]);
    }
}
