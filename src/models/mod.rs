//! Core data models for the publication harvest pipeline.
//!
//! This module contains the raw search documents returned by the search API,
//! the transient relevance breakdown computed for free-text searches, and the
//! projected publication records that leave the pipeline.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::text::{clean_value, normalize_key};

/// Publication type tags accepted by the pipeline.
///
/// Declaration order is the duplicate-resolution priority:
/// article > book > chapter > preprint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PubClass {
    Article,
    Book,
    Chapter,
    Preprint,
}

impl PubClass {
    /// Fixed priority order used when duplicates span several types.
    pub const PRIORITY: [PubClass; 4] = [
        PubClass::Article,
        PubClass::Book,
        PubClass::Chapter,
        PubClass::Preprint,
    ];

    /// Parse an API `pub_class_id` tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "article" => Some(PubClass::Article),
            "book" => Some(PubClass::Book),
            "chapter" => Some(PubClass::Chapter),
            "preprint" => Some(PubClass::Preprint),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PubClass::Article => "article",
            PubClass::Book => "book",
            PubClass::Chapter => "chapter",
            PubClass::Preprint => "preprint",
        }
    }
}

/// How a batch was searched.
///
/// Keyword searches are exact and keep every surviving document. Text-query
/// searches look up a free-text title and keep only the best match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "query", rename_all = "snake_case")]
pub enum SearchMode {
    Keyword,
    TextQuery(String),
}

impl SearchMode {
    pub fn label(&self) -> &'static str {
        match self {
            SearchMode::Keyword => "keyword",
            SearchMode::TextQuery(_) => "text_query",
        }
    }
}

/// Score components for a free-text title match.
///
/// Computed by [`crate::query::score_relevance`] and attached to a document
/// while a text-query batch is ranked. It is never serialized with the
/// document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RelevanceScoreBreakdown {
    /// Distinct query tokens found among the title tokens
    pub exact_matches: usize,

    /// `exact_matches` over the number of query tokens
    pub match_ratio: f64,

    /// Bonus for adjacent query-token pairs appearing verbatim in the title
    pub consecutive_bonus: f64,

    /// Bonus for an early first match in the title
    pub position_bonus: f64,

    /// Bonus when the API highlighted part of the title
    pub highlighting_bonus: f64,

    /// Weighted sum of the components above
    pub combined_score: f64,
}

/// A single document as returned by the search API.
///
/// The API schema is not modelled: the document is kept as a JSON object and
/// the fields the pipeline needs are read through accessors that substitute
/// defaults for missing or mistyped values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    #[serde(skip)]
    pub relevance: Option<RelevanceScoreBreakdown>,
}

impl RawDocument {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            relevance: None,
        }
    }

    /// Build a document from a JSON value. Non-object values yield an empty document.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::new(fields),
            _ => Self::default(),
        }
    }

    /// Raw field lookup; `None` when absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Stable identity key.
    ///
    /// String ids are returned as-is and numeric ids in decimal form. Missing,
    /// null, or structured ids mean the document has no identity.
    pub fn id(&self) -> Option<String> {
        match self.fields.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Raw title, possibly carrying highlight markup. Empty when absent.
    pub fn title(&self) -> &str {
        self.fields
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Title grouping key (cleaned, lower-cased, trimmed).
    pub fn title_key(&self) -> String {
        normalize_key(self.title())
    }

    pub fn pub_class_id(&self) -> Option<&str> {
        self.fields.get("pub_class_id").and_then(Value::as_str)
    }

    /// Publication type, when the tag is one the pipeline accepts.
    pub fn pub_class(&self) -> Option<PubClass> {
        self.pub_class_id().and_then(PubClass::from_tag)
    }

    /// API-assigned relevance score; 0.0 when absent or not numeric.
    pub fn score(&self) -> f64 {
        self.fields
            .get("score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }

    /// Combined relevance from the attached breakdown, 0.0 when unscored.
    pub fn combined_score(&self) -> f64 {
        self.relevance.map(|r| r.combined_score).unwrap_or(0.0)
    }
}

/// Result of one search API call.
///
/// Deserialization never fails on a bad element: a missing, null or
/// non-integer `count` reads as 0, and `docs` entries that are not objects
/// are dropped while the rest of the batch is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchBatchResult {
    /// Server-reported hit count (may exceed `documents.len()`)
    #[serde(rename = "count", default, deserialize_with = "lenient_count")]
    pub total_count: u64,

    #[serde(rename = "docs", default, deserialize_with = "lenient_documents")]
    pub documents: Vec<RawDocument>,
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().unwrap_or_default())
}

fn lenient_documents<'de, D>(deserializer: D) -> Result<Vec<RawDocument>, D::Error>
where
    D: Deserializer<'de>,
{
    let documents = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(RawDocument::new(fields)),
                other => {
                    debug!("Skipping malformed document: {}", other);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(documents)
}

impl SearchBatchResult {
    pub fn new(total_count: u64, documents: Vec<RawDocument>) -> Self {
        Self {
            total_count,
            documents,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Date fields considered for the projected publication date, in fallback order.
pub const DATE_FIELDS: [&str; 3] = ["print_pub_date", "online_pub_date", "pub_date"];

/// Exported publication record.
///
/// Every field is the cleaned value from the source document, or `null` when
/// the document lacks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredPublication {
    pub title: Value,
    pub author_list: Value,
    pub journal_title: Value,
    pub source_title: Value,
    pub doi: Value,
    pub short_abstract: Value,
    pub publication_date: Value,
}

impl FilteredPublication {
    /// Project a raw document onto the exported fields.
    pub fn from_document(doc: &RawDocument) -> Self {
        let field = |key: &str| doc.get(key).map(clean_value).unwrap_or(Value::Null);

        let author_list = match doc.get("author_list") {
            Some(value) if !is_blank(value) => clean_value(value),
            _ => field("editor_list"),
        };

        Self {
            title: field("title"),
            author_list,
            journal_title: field("journal_title"),
            source_title: field("source_title"),
            doi: field("doi"),
            short_abstract: field("short_abstract"),
            publication_date: earliest_publication_date(doc),
        }
    }
}

/// Earliest of the document's publication dates.
///
/// Null, empty strings and empty lists are not dates; any other value,
/// whitespace-only strings included, takes part. When every present date is
/// a string the lexicographic minimum wins, which orders ISO-style dates
/// (`2021`, `2021-05`, `2021-05-03`) chronologically. When every present date
/// is a number the numeric minimum wins. Mixed or structured values cannot be
/// compared, so the first available value in [`DATE_FIELDS`] order is used.
pub fn earliest_publication_date(doc: &RawDocument) -> Value {
    let present: Vec<&Value> = DATE_FIELDS
        .iter()
        .filter_map(|key| doc.get(key))
        .filter(|value| !is_blank(value))
        .collect();

    let earliest = if present.iter().all(|v| v.is_string()) {
        present.iter().copied().min_by(|a, b| a.as_str().cmp(&b.as_str()))
    } else if present.iter().all(|v| v.is_number()) {
        present.iter().copied().min_by(|a, b| {
            a.as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal)
        })
    } else {
        present.first().copied()
    };

    earliest.cloned().unwrap_or(Value::Null)
}

/// Statistics for one search of a harvest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Search key (keyword term or title)
    pub key: String,

    pub description: String,

    pub category: String,

    /// `keyword` or `text_query`
    pub mode: String,

    /// Server-reported hit count
    pub total_count: u64,

    /// Documents actually returned
    pub retrieved: usize,

    /// Documents kept after filtering
    pub kept: usize,

    /// Upstream failure, if the batch could not be fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchRecord {
    /// Whether this search belongs in the failed-searches export.
    pub fn is_failed(&self) -> bool {
        self.kept == 0 || self.error.is_some()
    }
}

/// Run-level metadata attached to the detailed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub total_searches: usize,

    /// Documents accumulated across all batches, duplicates included
    pub total_results_before_dedup: usize,

    pub total_unique_results: usize,

    /// RFC 3339 UTC timestamp of finalization
    pub timestamp: String,

    pub searches: Vec<SearchRecord>,
}

/// Audit view of a run: unique documents exactly as the API returned them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedReport {
    pub search_metadata: SearchMetadata,
    pub unique_publications: Vec<RawDocument>,
}

// Null, empty strings and empty lists count as absent.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
