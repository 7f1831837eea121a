//! Utility functions and helpers.

pub mod console;
pub mod http;
pub mod text;
pub mod url;

use ::url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("http://www.ragd.org.cn/kstz").unwrap();
        assert_eq!(
            resolve_url(&base, "/newsinfo/8789915.html"),
            "http://www.ragd.org.cn/newsinfo/8789915.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }
}
