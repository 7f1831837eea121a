// src/services/notifier.rs

//! Push notification service.
//!
//! Formats new exams as a markdown message and delivers it through
//! ServerChan or PushPlus.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{MatchedExam, NotifyChannel, NotifyConfig};

const SERVERCHAN_API: &str = "https://sctapi.ftqq.com";
const PUSHPLUS_API: &str = "https://www.pushplus.plus/send";

/// Outcome of a send attempt that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The push service confirmed the message
    Delivered,
    /// Nothing was sent because no channel is configured
    Skipped,
}

/// Destination for new-exam notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, exams: &[MatchedExam]) -> Result<Delivery>;
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    code: i64,
    #[serde(default, alias = "msg")]
    message: Option<String>,
}

/// Notifier for the ServerChan and PushPlus web APIs.
pub struct PushNotifier {
    config: NotifyConfig,
    client: Client,
}

impl PushNotifier {
    pub fn new(config: &NotifyConfig, client: Client) -> Self {
        Self {
            config: config.clone(),
            client,
        }
    }

    async fn post(&self, url: &str, body: serde_json::Value) -> Result<ApiReply> {
        let reply = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .json::<ApiReply>()
            .await?;
        Ok(reply)
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    async fn send(&self, exams: &[MatchedExam]) -> Result<Delivery> {
        let Some(token) = self.config.token.as_deref().filter(|t| !t.trim().is_empty()) else {
            log::warn!("Notifications disabled: no token configured");
            return Ok(Delivery::Skipped);
        };

        if exams.is_empty() {
            log::info!("No exams to push");
            return Ok(Delivery::Delivered);
        }

        let channel = self.config.channel;
        log::info!("Pushing {} exam(s) via {}", exams.len(), channel);

        let title = format_title(exams);
        let content = format_markdown(exams);

        let (reply, success_code) = match channel {
            NotifyChannel::ServerChan => {
                let url = format!("{SERVERCHAN_API}/{token}.send");
                let body = json!({ "title": title, "desp": content });
                (self.post(&url, body).await?, 0)
            }
            NotifyChannel::PushPlus => {
                let body = json!({
                    "token": token,
                    "title": title,
                    "content": content,
                    "template": "markdown",
                });
                (self.post(PUSHPLUS_API, body).await?, 200)
            }
        };

        if reply.code == success_code {
            log::info!("Push via {} succeeded", channel);
            Ok(Delivery::Delivered)
        } else {
            Err(AppError::notify(
                channel.to_string(),
                format!(
                    "code {}: {}",
                    reply.code,
                    reply.message.as_deref().unwrap_or("no message")
                ),
            ))
        }
    }
}

/// Message title: the single exam's place and class, or a count.
pub fn format_title(exams: &[MatchedExam]) -> String {
    match exams {
        [exam] => {
            let location = exam.record.locations.first().map_or("未知地点", String::as_str);
            let class = exam.record.exam_types.first().map_or("考试", String::as_str);
            format!("🔔 {location}{class}报名通知")
        }
        _ => format!("🔔 发现 {} 个新考试", exams.len()),
    }
}

/// Markdown body with one section per exam.
pub fn format_markdown(exams: &[MatchedExam]) -> String {
    let mut content = String::from("## 📻 无线电考试监控\n\n");
    content.push_str(&format!("发现 **{}** 个符合条件的考试：\n\n---\n\n", exams.len()));

    for (index, exam) in exams.iter().enumerate() {
        let record = &exam.record;
        content.push_str(&format!("### {}. {}\n\n", index + 1, record.title));
        content.push_str(&format!(
            "- 📅 **考试日期**: {}\n",
            record.exam_date.as_deref().unwrap_or("未知")
        ));
        content.push_str(&format!("- 📍 **考试地点**: {}\n", joined(&record.locations)));
        content.push_str(&format!("- 📝 **考试类型**: {}\n", joined(&record.exam_types)));

        if let Some(venue) = &record.venue {
            content.push_str(&format!("- 🏢 **考试场地**: {venue}\n"));
        }
        if let Some(period) = &record.signup_period {
            content.push_str(&format!("- 📆 **报名时间**: {}\n", period.raw));
        }

        content.push_str(&format!("- 🔗 **查看详情**: [点击查看]({})\n", record.url));
        content.push_str("\n---\n\n");
    }

    content.push_str("\n\n> 🤖 此消息由自动监控系统发送");
    content
}

fn joined(values: &[String]) -> String {
    if values.is_empty() {
        "未知".to_string()
    } else {
        values.join("、")
    }
}
