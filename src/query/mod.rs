//! Search queries and free-text relevance scoring.
//!
//! A harvest run issues two kinds of searches: exact keyword searches from the
//! configured term list, and free-text searches for individual titles. Title
//! searches return many near-duplicates, so each candidate is ranked with a
//! small heuristic built from token overlap, adjacent-pair matches, early
//! match position, and the API's own highlighting.
//!
//! # Usage
//!
//! ```ignore
//! use paper_harvest::query::{score_relevance, SearchQuery};
//!
//! let query = SearchQuery::title("Regional Climate Models for Africa");
//! let breakdown = score_relevance(&document, "\"climate models\"");
//! println!("{:.2}", breakdown.combined_score);
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{RawDocument, RelevanceScoreBreakdown, SearchMode};
use crate::text::{clean, contains_highlight};

/// Words ignored when tokenizing titles and queries.
pub const STOP_WORDS: [&str; 15] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from",
];

/// Tokens of this many characters or fewer are ignored.
pub const MIN_TOKEN_LEN: usize = 2;

/// Weight applied to the query-token match ratio.
pub const MATCH_RATIO_WEIGHT: f64 = 10.0;

/// Bonus per adjacent query-token pair found verbatim in the title.
pub const CONSECUTIVE_PAIR_BONUS: f64 = 0.2;

/// Bonus when the raw title carries API highlight markup.
pub const HIGHLIGHT_BONUS: f64 = 2.0;

/// Category label used for title searches.
pub const TITLE_CATEGORY: &str = "title";

/// One search to run against the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Search key: the keyword term or the title text
    pub key: String,

    /// Keyword or free-text mode
    pub mode: SearchMode,

    /// Human-readable description for reports
    pub description: String,

    /// Category label for reports
    pub category: String,
}

impl SearchQuery {
    /// An exact keyword search.
    pub fn keyword(term: &str, description: &str, category: &str) -> Self {
        Self {
            key: term.to_string(),
            mode: SearchMode::Keyword,
            description: description.to_string(),
            category: category.to_string(),
        }
    }

    /// A free-text title search. The title doubles as the scoring query.
    pub fn title(title: &str) -> Self {
        Self {
            key: title.to_string(),
            mode: SearchMode::TextQuery(title.to_string()),
            description: format!("Title search: {}", title),
            category: TITLE_CATEGORY.to_string(),
        }
    }

    pub fn is_text_query(&self) -> bool {
        matches!(self.mode, SearchMode::TextQuery(_))
    }
}

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Split lower-cased text on whitespace, dropping stop words and short tokens.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .filter(|t| !is_stop_word(t) && t.chars().count() > MIN_TOKEN_LEN)
        .collect()
}

/// Score how well `doc`'s title matches a free-text `query`.
///
/// A query with no meaningful tokens scores all zeros.
pub fn score_relevance(doc: &RawDocument, query: &str) -> RelevanceScoreBreakdown {
    let raw_title = doc.title();
    let title = clean(raw_title).to_lowercase();
    let query = query
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .to_lowercase();

    let query_tokens = tokenize(&query);
    if query_tokens.is_empty() {
        return RelevanceScoreBreakdown::default();
    }
    let title_tokens = tokenize(&title);

    let query_set: HashSet<&str> = query_tokens.iter().copied().collect();
    let title_set: HashSet<&str> = title_tokens.iter().copied().collect();
    let exact_matches = query_set.intersection(&title_set).count();
    let match_ratio = exact_matches as f64 / query_tokens.len() as f64;

    let consecutive_bonus = query_tokens
        .windows(2)
        .filter(|pair| title.contains(&format!("{} {}", pair[0], pair[1])))
        .count() as f64
        * CONSECUTIVE_PAIR_BONUS;

    let position_bonus = title_tokens
        .iter()
        .position(|t| query_set.contains(t))
        .map(|pos| (1.0 - pos as f64 / title_tokens.len() as f64).max(0.0))
        .unwrap_or(0.0);

    let highlighting_bonus = if contains_highlight(raw_title) {
        HIGHLIGHT_BONUS
    } else {
        0.0
    };

    let combined_score = match_ratio * MATCH_RATIO_WEIGHT
        + consecutive_bonus
        + highlighting_bonus
        + position_bonus;

    RelevanceScoreBreakdown {
        exact_matches,
        match_ratio,
        consecutive_bonus,
        position_bonus,
        highlighting_bonus,
        combined_score,
    }
}
