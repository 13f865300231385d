//! Text helpers used by the feed reader, the summarizers and logging.
//!
//! - Whitespace compaction with a character bound
//! - HTML stripping for feed descriptions
//! - String truncation for log lines
//! - JSON error detection for truncated LLM replies

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Collapse runs of whitespace and bound the result to `limit` characters.
///
/// Cut strings end in `…`, which is not counted against `limit`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(compact("  a \n  b ", 10), "a b");
/// assert_eq!(compact("abcdef", 3), "abc…");
/// ```
pub fn compact(s: &str, limit: usize) -> String {
    let collapsed = WHITESPACE.replace_all(s.trim(), " ");
    match collapsed.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &collapsed[..cut]),
        None => collapsed.into_owned(),
    }
}

/// Text content of an HTML fragment, tags removed.
pub fn strip_html(fragment: &str) -> String {
    Html::parse_fragment(fragment)
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the number
/// of omitted bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM reply is cut off (e.g. by a token limit) parsing fails with
/// an EOF error; such replies are worth asking for again.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}
