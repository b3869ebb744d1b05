//! Text normalization for search-engine result fields.
//!
//! The search API wraps query hits in highlight markup (a `<span>` carrying the
//! `search-keyword` class) and occasionally leaks other HTML fragments into
//! titles and abstracts. This module removes that markup so titles can be
//! compared, grouped, and exported.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Marker class used by the search API for highlighted query hits.
pub const HIGHLIGHT_CLASS: &str = "search-keyword";

// Opening highlight tag, e.g. `<span class="search-keyword">`
static HIGHLIGHT_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"<span\b[^<>]*\bclass\s*=\s*["']?{}["']?[^<>]*>"#,
        regex::escape(HIGHLIGHT_CLASS)
    ))
    .expect("Invalid highlight open-tag pattern")
});

static HIGHLIGHT_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</span\s*>").expect("Invalid highlight close-tag pattern"));

// Any remaining markup tag
static GENERIC_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^<>]*>").expect("Invalid generic tag pattern"));

/// Remove highlight and generic markup from `text` and trim it.
///
/// Highlight tags are deleted first (their content is kept), then any other
/// tag is stripped. Generic stripping repeats until nothing tag-shaped is
/// left, so inputs like `<<b>b>` cannot reassemble into a new tag. This makes
/// the function idempotent: `clean(&clean(x)) == clean(x)`.
///
/// # Example
/// ```ignore
/// let title = clean(r#"  <span class="search-keyword">Climate</span> Models "#);
/// assert_eq!(title, "Climate Models");
/// ```
pub fn clean(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let without_open = HIGHLIGHT_OPEN.replace_all(text, "");
    let mut stripped = HIGHLIGHT_CLOSE.replace_all(&without_open, "").into_owned();

    loop {
        let next = GENERIC_TAG.replace_all(&stripped, "");
        if next.len() == stripped.len() {
            break;
        }
        stripped = next.into_owned();
    }

    stripped.trim().to_string()
}

/// Clean a JSON field value.
///
/// Strings go through [`clean`]; every other value (null, numbers, arrays,
/// objects) is returned unchanged, as is the empty string.
pub fn clean_value(value: &Value) -> Value {
    match value {
        Value::String(s) if !s.is_empty() => Value::String(clean(s)),
        other => other.clone(),
    }
}

/// Grouping key for a title: cleaned, lower-cased, trimmed.
pub fn normalize_key(text: &str) -> String {
    clean(text).to_lowercase().trim().to_string()
}

/// Whether the raw text carries the highlight opening tag.
pub fn contains_highlight(text: &str) -> bool {
    HIGHLIGHT_OPEN.is_match(text)
}
