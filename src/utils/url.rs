// src/utils/url.rs

//! URL helpers for announcement links.

use std::sync::LazyLock;

use regex::Regex;

/// Digit run directly before the page extension, e.g. `/newsinfo/8789915.html`.
static EXAM_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/([0-9]+)\.html").ok());

/// Extract the stable announcement identifier from its URL.
///
/// Only the path is inspected; query strings and fragments are ignored.
///
/// # Examples
/// ```
/// use exam_monitor::utils::url::extract_exam_id;
///
/// assert_eq!(
///     extract_exam_id("http://www.ragd.org.cn/newsinfo/8789915.html"),
///     Some("8789915".to_string())
/// );
/// assert_eq!(extract_exam_id("http://www.ragd.org.cn/kstz"), None);
/// ```
pub fn extract_exam_id(url: &str) -> Option<String> {
    let path = match ::url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // Relative hrefs: drop query and fragment by hand
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    let pattern = EXAM_ID.as_ref()?;
    pattern
        .captures(&path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
