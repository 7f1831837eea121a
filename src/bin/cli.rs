//! Radio exam monitor CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use exam_monitor::{
    error::{AppError, Result},
    models::{Config, ExamRecord, MatchedExam, RawAnnouncement, SignupPeriod},
    pipeline,
    services::{
        BoardFetcher, CriteriaFilter, Delivery, Notifier, NotifiedSetTracker, PushNotifier,
        RecordExtractor,
    },
    storage::{LocalStorage, SnapshotStore},
    utils::http,
};

/// Radio exam monitor
#[derive(Parser, Debug)]
#[command(
    name = "exam-monitor",
    version,
    about = "Watches the radio exam notice board and pushes new matching exams"
)]
struct Cli {
    /// Path to storage directory containing config and state files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the board, filter, notify and write the snapshot
    Run,

    /// Extract a local text file and show the record and its verdict
    Parse {
        /// Plain-text announcement body
        file: PathBuf,

        /// Source URL used for the record id
        #[arg(long)]
        url: Option<String>,

        /// Announcement title (default: file name)
        #[arg(long)]
        title: Option<String>,
    },

    /// Forget notified ids whose exam is older than the given age
    Cleanup {
        /// Retention window in days
        #[arg(long)]
        days: u32,
    },

    /// Push two sample exams through the configured channel
    NotifyTest,

    /// Validate configuration
    Validate,

    /// Show snapshot and tracker state
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path).with_process_env();
    let storage = LocalStorage::with_paths(&cli.storage_dir, &config.paths);

    log::debug!("Using storage directory {}", cli.storage_dir.display());

    match cli.command {
        Command::Run => {
            config.validate()?;
            log_filter(&config);

            let client = http::create_async_client(&config.fetch)?;
            let fetcher = BoardFetcher::with_client(&config.fetch, client.clone());
            let notifier = PushNotifier::new(&config.notify, client);

            let report = pipeline::run_monitor(&config, &fetcher, &notifier, &storage).await?;
            if report.delivered {
                log::info!("Pushed {} new exam(s)", report.new_exams.len());
            }
        }

        Command::Parse { file, url, title } => {
            let raw = RawAnnouncement {
                url: url.unwrap_or_default(),
                title: title.unwrap_or_else(|| file_title(&file)),
                publish_date: None,
                full_text: std::fs::read_to_string(&file)?,
            };

            let record = RecordExtractor::new().extract(&raw);
            let result = CriteriaFilter::new(config.filter.clone()).evaluate(&record);

            println!("{}", serde_json::to_string_pretty(&record)?);
            if result.is_match() {
                log::info!("✓ Matches: {}", result.explanation());
            } else {
                log::info!("✗ Rejected: {}", result.explanation());
            }
        }

        Command::Cleanup { days } => {
            let Some(snapshot) = storage.read_snapshot()? else {
                log::warn!("No snapshot found; nothing can be dated. Run 'run' first.");
                return Ok(());
            };

            let mut tracker = NotifiedSetTracker::load(&storage);
            let removed = tracker.evict_older_than(days, &snapshot.exams);
            tracker.save();
            log::info!("Removed {} id(s), {} remain", removed, tracker.len());
        }

        Command::NotifyTest => {
            if !config.notify.enabled() {
                log::error!("No notification token configured.");
                log::info!("Set NOTIFICATION_TOKEN (and NOTIFICATION_TYPE=serverchan|pushplus),");
                log::info!("or add a [notify] section to {}", config_path.display());
                return Err(AppError::config("notification token missing"));
            }

            let client = http::create_async_client(&config.fetch)?;
            let notifier = PushNotifier::new(&config.notify, client);
            match notifier.send(&sample_exams()).await? {
                Delivery::Delivered => {
                    log::info!("Test notification delivered via {}", config.notify.channel)
                }
                Delivery::Skipped => log::warn!("Test notification skipped"),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
            log_filter(&config);
            log::info!(
                "Notifications: {}",
                if config.notify.enabled() {
                    config.notify.channel.to_string()
                } else {
                    "disabled".to_string()
                }
            );
        }

        Command::Info => {
            log::info!("Storage directory: {}", storage.root_dir().display());

            let tracker = NotifiedSetTracker::load(&storage);
            log::info!("Notified ids: {}", tracker.len());

            match storage.read_snapshot()? {
                Some(snapshot) => {
                    log::info!("Last run: {}", snapshot.last_updated);
                    log::info!(
                        "Found {} / future {} / matched {} / new {}",
                        snapshot.summary.total_found,
                        snapshot.summary.future_exams,
                        snapshot.summary.matched,
                        snapshot.summary.new_exams
                    );
                    for exam in &snapshot.exams {
                        log::info!(
                            "    {} {}",
                            exam.record.exam_date.as_deref().unwrap_or("????-??-??"),
                            exam.record.title
                        );
                    }
                }
                None => log::info!("No snapshot found yet."),
            }
        }
    }

    Ok(())
}

fn log_filter(config: &Config) {
    let filter = &config.filter;
    log::info!("Board: {}", config.fetch.board_url);
    for (label, values) in [
        ("Exam types", &filter.exam_types),
        ("Locations", &filter.locations),
        ("Excluded keywords", &filter.exclude_keywords),
        ("Required keywords", &filter.include_keywords),
    ] {
        if !values.is_empty() {
            log::info!("{}: {}", label, values.join(", "));
        }
    }
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sample_exams() -> Vec<MatchedExam> {
    let exam = |id: &str,
                title: &str,
                exam_date: &str,
                locations: &[&str],
                venue: &str,
                types: &[&str]| {
        ExamRecord {
            id: Some(id.to_string()),
            url: format!("http://www.ragd.org.cn/newsinfo/{id}.html"),
            title: title.to_string(),
            publish_date: None,
            exam_date: Some(exam_date.to_string()),
            exam_date_raw: None,
            signup_period: None,
            locations: locations.iter().map(|s| s.to_string()).collect(),
            venue: Some(venue.to_string()),
            exam_types: types.iter().map(|s| s.to_string()).collect(),
            content_preview: String::new(),
            full_content: String::new(),
        }
    };

    let mut guangzhou = exam(
        "8789915",
        "（11月8日广州）广东省A、B类业余电台操作技能考试报名通知",
        "2025-11-08",
        &["广州", "东莞"],
        "广州市花都区森林消防大队",
        &["A类", "B类"],
    );
    guangzhou.signup_period = Some(SignupPeriod {
        raw: "2025年10月20日至2025年10月30日".to_string(),
        start: "2025-10-20".to_string(),
        end: "2025-10-30".to_string(),
    });

    let shenzhen = exam(
        "8789916",
        "（11月22日深圳）广东省A类业余电台操作技能考试报名通知",
        "2025-11-22",
        &["深圳"],
        "深圳市罗湖区无线电协会",
        &["A类"],
    );

    vec![
        MatchedExam {
            record: guangzhou,
            matched_reasons: "类型: B类; 地点: 广州".to_string(),
        },
        MatchedExam {
            record: shenzhen,
            matched_reasons: "类型: A类; 地点: 深圳".to_string(),
        },
    ]
}
