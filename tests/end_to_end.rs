//! Full monitor pass over file-backed storage with in-process collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;
use exam_monitor::error::Result;
use exam_monitor::models::{Config, ExamLink, MatchedExam, RawAnnouncement};
use exam_monitor::pipeline::run_monitor_on;
use exam_monitor::services::{AnnouncementSource, Delivery, Notifier};
use exam_monitor::storage::{LocalStorage, SnapshotStore};
use tempfile::TempDir;

struct StaticBoard(Vec<RawAnnouncement>);

#[async_trait]
impl AnnouncementSource for StaticBoard {
    async fn fetch_links(&self) -> Result<Vec<ExamLink>> {
        Ok(self
            .0
            .iter()
            .map(|a| ExamLink {
                url: a.url.clone(),
                title: a.title.clone(),
                publish_date: a.publish_date.clone(),
            })
            .collect())
    }

    async fn fetch_details(&self, links: &[ExamLink]) -> Result<Vec<RawAnnouncement>> {
        Ok(self
            .0
            .iter()
            .filter(|a| links.iter().any(|l| l.url == a.url))
            .cloned()
            .collect())
    }
}

struct AlwaysDelivers;

#[async_trait]
impl Notifier for AlwaysDelivers {
    async fn send(&self, _exams: &[MatchedExam]) -> Result<Delivery> {
        Ok(Delivery::Delivered)
    }
}

fn announcement(id: &str, title: &str, text: &str) -> RawAnnouncement {
    RawAnnouncement {
        url: format!("http://www.ragd.org.cn/newsinfo/{id}.html"),
        title: title.to_string(),
        publish_date: Some("2025-10-16".to_string()),
        full_text: text.to_string(),
    }
}

fn board() -> StaticBoard {
    StaticBoard(vec![
        announcement(
            "8789915",
            "（11月8日广州）广东省A、B类业余电台操作技能考试报名通知",
            "考试时间：2025年11月8日\n考试地点：广州市花都区森林消防大队\n\
             报名时间：2025年10月20日至2025年10月30日\n本次考试包括A类、B类。",
        ),
        announcement(
            "8700001",
            "（9月6日深圳）广东省A类业余电台操作技能考试报名通知",
            "考试时间：2025年9月6日\n地点：深圳市罗湖区无线电协会\nA类考试",
        ),
    ])
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 20).unwrap()
}

#[tokio::test]
async fn future_exam_is_matched_and_persisted() {
    let tmp = TempDir::new().unwrap();
    let storage = LocalStorage::new(tmp.path());
    let config = Config::default();

    let report = run_monitor_on(&config, &board(), &AlwaysDelivers, &storage, today())
        .await
        .unwrap();

    assert_eq!(report.summary.total_found, 2);
    assert_eq!(report.summary.matched, 1);
    assert_eq!(report.summary.future_exams, 1);
    assert!(report.delivered);

    let snapshot = storage.read_snapshot().unwrap().unwrap();
    assert_eq!(snapshot.exams.len(), 1);
    let exam = &snapshot.exams[0].record;
    assert_eq!(exam.id.as_deref(), Some("8789915"));
    assert_eq!(exam.exam_date.as_deref(), Some("2025-11-08"));
    assert_eq!(exam.locations, vec!["广州"]);
    assert_eq!(exam.exam_types, vec!["A类", "B类"]);
    assert_eq!(
        exam.signup_period.as_ref().map(|p| p.end.as_str()),
        Some("2025-10-30")
    );

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(tmp.path().join("exams.json")).unwrap())
            .unwrap();
    assert_eq!(raw["summary"]["futureExams"], 1);
    assert_eq!(raw["exams"][0]["examDate"], "2025-11-08");
}

#[tokio::test]
async fn second_run_reports_nothing_new() {
    let tmp = TempDir::new().unwrap();
    let storage = LocalStorage::new(tmp.path());
    let config = Config::default();

    let first = run_monitor_on(&config, &board(), &AlwaysDelivers, &storage, today())
        .await
        .unwrap();
    assert_eq!(first.summary.new_exams, 1);

    let second = run_monitor_on(&config, &board(), &AlwaysDelivers, &storage, today())
        .await
        .unwrap();
    assert_eq!(second.summary.matched, 1);
    assert_eq!(second.summary.new_exams, 0);
    assert!(!second.delivered);

    let state: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(tmp.path().join("notified_exams.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["notifiedIds"], serde_json::json!(["8789915"]));
    assert_eq!(state["count"], 1);
}
