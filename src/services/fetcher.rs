// src/services/fetcher.rs

//! Announcement fetcher service.
//!
//! Reads the exam notice board and the announcement pages it links to,
//! handing plain text to the extractor.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ExamLink, FetchConfig, RawAnnouncement};
use crate::utils::http::{create_async_client, fetch_text};
use crate::utils::resolve_url;
use crate::utils::text::normalize_whitespace;

const ROW_SELECTOR: &str = ".w-al-unit.w-list-item";
const TITLE_SELECTOR: &str = ".w-al-title";
const DATE_SELECTOR: &str = ".w-al-date";

/// Detail page containers, most specific first.
const CONTENT_SELECTORS: [&str; 6] = [
    ".content",
    ".article-content",
    ".detail-content",
    "article",
    ".main-content",
    "body",
];

/// Elements that start a new line in extracted text.
const BLOCK_TAGS: [&str; 17] = [
    "address", "article", "br", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "p", "section",
    "table", "td", "tr", "ul",
];

/// Elements whose text is never part of the page content.
const HIDDEN_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Source of raw announcements.
#[async_trait]
pub trait AnnouncementSource: Send + Sync {
    /// Most recent announcement links, newest first.
    async fn fetch_links(&self) -> Result<Vec<ExamLink>>;

    /// Page text for each link. Pages that cannot be retrieved are skipped.
    async fn fetch_details(&self, links: &[ExamLink]) -> Result<Vec<RawAnnouncement>>;
}

/// Fetcher for the association's notice board.
pub struct BoardFetcher {
    config: FetchConfig,
    client: Client,
}

impl BoardFetcher {
    /// Create a fetcher with its own HTTP client.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = create_async_client(config)?;
        Ok(Self::with_client(config, client))
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(config: &FetchConfig, client: Client) -> Self {
        Self {
            config: config.clone(),
            client,
        }
    }

    async fn fetch_detail(&self, link: &ExamLink) -> Option<RawAnnouncement> {
        log::info!("Fetching: {}", title_excerpt(&link.title));
        match fetch_text(&self.client, &link.url, self.config.retries).await {
            Ok(html) => Some(RawAnnouncement::from_link(link.clone(), parse_detail(&html))),
            Err(e) => {
                log::warn!("Failed to fetch {}: {}", link.url, e);
                None
            }
        }
    }
}

#[async_trait]
impl AnnouncementSource for BoardFetcher {
    async fn fetch_links(&self) -> Result<Vec<ExamLink>> {
        log::info!("Fetching notice board: {}", self.config.board_url);
        let base = Url::parse(&self.config.board_url)?;
        let html = fetch_text(&self.client, &self.config.board_url, self.config.retries).await?;

        let links = parse_board(&html, &base)?;
        log::info!("Found {} exam notice(s)", links.len());

        let recent = select_recent(links, self.config.max_recent_notifications);
        log::info!("Keeping the {} most recent notice(s)", recent.len());
        Ok(recent)
    }

    async fn fetch_details(&self, links: &[ExamLink]) -> Result<Vec<RawAnnouncement>> {
        let batch_size = self.config.max_concurrent.max(1);
        let delay = Duration::from_millis(self.config.request_delay_ms);
        let batch_count = links.len().div_ceil(batch_size);

        log::info!(
            "Fetching {} detail page(s) (concurrency: {})",
            links.len(),
            batch_size
        );

        let mut details = Vec::with_capacity(links.len());
        for (index, batch) in links.chunks(batch_size).enumerate() {
            log::debug!("Batch {}/{}", index + 1, batch_count);

            let results = join_all(batch.iter().map(|link| self.fetch_detail(link))).await;
            details.extend(results.into_iter().flatten());

            if index + 1 < batch_count && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if details.len() < links.len() {
            log::warn!(
                "{} of {} detail page(s) could not be fetched",
                links.len() - details.len(),
                links.len()
            );
        }
        Ok(details)
    }
}

/// Parse board rows into links. Rows without a titled anchor are skipped.
pub fn parse_board(html: &str, base: &Url) -> Result<Vec<ExamLink>> {
    let document = Html::parse_document(html);
    let row_sel = parse_selector(ROW_SELECTOR)?;
    let title_sel = parse_selector(TITLE_SELECTOR)?;
    let date_sel = parse_selector(DATE_SELECTOR)?;

    let links = document
        .select(&row_sel)
        .filter_map(|row| {
            let title_elem = row.select(&title_sel).next()?;
            let href = title_elem.value().attr("href")?;
            let title = normalize_whitespace(&title_elem.text().collect::<String>());
            if title.is_empty() {
                return None;
            }

            let publish_date = row
                .select(&date_sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|d| !d.is_empty());

            Some(ExamLink {
                url: resolve_url(base, href),
                title,
                publish_date,
            })
        })
        .collect();

    Ok(links)
}

/// Newest `max` links by publish date. Undated links sort last, in board order.
pub fn select_recent(mut links: Vec<ExamLink>, max: usize) -> Vec<ExamLink> {
    links.sort_by(|a, b| b.publish_date.cmp(&a.publish_date));
    links.truncate(max);
    links
}

/// Plain text of the first content container present on a detail page.
pub fn parse_detail(html: &str) -> String {
    let document = Html::parse_document(html);
    let container = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    element_text(container)
}

/// Text content with block elements on their own lines.
fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => out.push('\n'),
            Node::Text(text) => {
                let hidden = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|el| el.name()))
                    .is_some_and(|name| HIDDEN_TAGS.contains(&name));
                if !hidden {
                    out.push_str(text);
                }
            }
            _ => {}
        }
    }

    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn title_excerpt(title: &str) -> String {
    title.chars().take(40).collect()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD_HTML: &str = r#"
        <html><body><div class="w-list">
          <div class="w-al-unit w-list-item">
            <a class="w-al-title" href="/newsinfo/100.html">2025年第三季度考试通知</a>
            <span class="w-al-date">2025-07-01</span>
          </div>
          <div class="w-al-unit w-list-item">
            <a class="w-al-title" href="/newsinfo/300.html">
              广州 A类 考试报名
            </a>
            <span class="w-al-date">2025-10-16</span>
          </div>
          <div class="w-al-unit w-list-item">
            <a class="w-al-title" href="http://other.example/newsinfo/200.html">深圳考试</a>
          </div>
          <div class="w-al-unit w-list-item">
            <span class="w-al-date">2025-10-20</span>
          </div>
          <div class="w-al-unit w-list-item">
            <a class="w-al-title" href="/newsinfo/400.html">佛山考试</a>
            <span class="w-al-date">2025-09-01</span>
          </div>
        </div></body></html>
    "#;

    fn base() -> Url {
        Url::parse("http://www.ragd.org.cn/kstz").unwrap()
    }

    #[test]
    fn test_parse_selector_valid() {
        assert!(parse_selector(ROW_SELECTOR).is_ok());
        assert!(parse_selector(TITLE_SELECTOR).is_ok());
        assert!(parse_selector(DATE_SELECTOR).is_ok());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_parse_board_rows() {
        let links = parse_board(BOARD_HTML, &base()).unwrap();
        assert_eq!(links.len(), 4);

        assert_eq!(links[0].url, "http://www.ragd.org.cn/newsinfo/100.html");
        assert_eq!(links[0].publish_date.as_deref(), Some("2025-07-01"));
        assert_eq!(links[1].title, "广州 A类 考试报名");
        assert_eq!(links[2].url, "http://other.example/newsinfo/200.html");
        assert!(links[2].publish_date.is_none());
    }

    #[test]
    fn test_select_recent_newest_first() {
        let links = parse_board(BOARD_HTML, &base()).unwrap();
        let recent = select_recent(links, 3);

        let urls: Vec<_> = recent.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://www.ragd.org.cn/newsinfo/300.html",
                "http://www.ragd.org.cn/newsinfo/400.html",
                "http://www.ragd.org.cn/newsinfo/100.html",
            ]
        );
    }

    #[test]
    fn test_select_recent_undated_last() {
        let links = parse_board(BOARD_HTML, &base()).unwrap();
        let all = select_recent(links, 10);
        assert_eq!(all.len(), 4);
        assert!(all[3].publish_date.is_none());
    }

    #[test]
    fn test_parse_detail_prefers_content_container() {
        let html = r#"
            <html><body>
              <div class="nav">首页 新闻</div>
              <div class="content">
                <p>考试时间：2025年11月8日</p>
                <p>考试地点：广州市天河区某某路1号</p>
                <script>var x = 1;</script>
              </div>
            </body></html>
        "#;
        let text = parse_detail(html);
        assert_eq!(text, "考试时间：2025年11月8日\n考试地点：广州市天河区某某路1号");
    }

    #[test]
    fn test_parse_detail_falls_back_to_body() {
        let html = "<html><body><p>第一段</p><p>第二段</p><style>p{}</style></body></html>";
        assert_eq!(parse_detail(html), "第一段\n第二段");
    }

    #[test]
    fn test_parse_detail_breaks_on_br() {
        let html = "<html><body><article>报名时间<br>截止日期</article></body></html>";
        assert_eq!(parse_detail(html), "报名时间\n截止日期");
    }
}
