//! Plain-text normalization.

/// Collapse every run of whitespace (newlines included) to one space and
/// trim both ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of the whitespace-normalized text.
///
/// Leading and trailing whitespace is dropped before counting.
pub fn preview(s: &str, max_chars: usize) -> String {
    normalize_whitespace(s).chars().take(max_chars).collect()
}
