//! Harvest configuration.
//!
//! A harvest is driven by a fixed list of keyword terms plus a list of titles
//! that changes between runs. Both live in a JSON config file; titles may also
//! come from a plain text file with one title per line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::SearchQuery;

/// Default pause between successive provider calls.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;

/// Upper bound accepted for the inter-request delay.
pub const MAX_REQUEST_DELAY_MS: u64 = 60_000;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config or titles file could not be read
    #[error("IO error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for this schema
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Values are present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A keyword term with its reporting labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordTerm {
    pub term: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: String,
}

impl KeywordTerm {
    pub fn new(term: &str, description: &str, category: &str) -> Self {
        Self {
            term: term.to_string(),
            description: description.to_string(),
            category: category.to_string(),
        }
    }
}

/// Built-in keyword terms used when the config file does not list any.
pub fn default_keyword_terms() -> Vec<KeywordTerm> {
    vec![
        KeywordTerm::new("climate change adaptation", "Adaptation research", "climate"),
        KeywordTerm::new("sea level rise", "Sea level studies", "climate"),
        KeywordTerm::new("ocean acidification", "Ocean chemistry", "oceans"),
        KeywordTerm::new("biodiversity loss", "Biodiversity decline", "ecology"),
    ]
}

fn default_request_delay_ms() -> u64 {
    DEFAULT_REQUEST_DELAY_MS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_true() -> bool {
    true
}

/// Configuration for one harvest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Exact keyword searches, run first and in order
    #[serde(default = "default_keyword_terms")]
    pub keyword_terms: Vec<KeywordTerm>,

    /// Free-text title searches, run after the keyword terms
    #[serde(default)]
    pub titles: Vec<String>,

    /// Optional newline-separated titles file, appended to `titles`
    #[serde(default)]
    pub titles_file: Option<PathBuf>,

    /// Pause between successive searches, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Directory receiving the output files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Also write the detailed audit report
    #[serde(default = "default_true")]
    pub write_detailed: bool,

    /// Also write the failed-searches export
    #[serde(default = "default_true")]
    pub write_failed: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            keyword_terms: default_keyword_terms(),
            titles: Vec::new(),
            titles_file: None,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            output_dir: default_output_dir(),
            write_detailed: true,
            write_failed: true,
        }
    }
}

impl HarvestConfig {
    /// Read a config file and validate it. Titles from `titles_file` are
    /// not loaded here; see [`HarvestConfig::resolve_titles`].
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let body = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&body)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(term) = self.keyword_terms.iter().find(|t| t.term.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "keyword term with description '{}' is empty",
                term.description
            )));
        }
        if self.request_delay_ms > MAX_REQUEST_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "request_delay_ms {} exceeds maximum of {}",
                self.request_delay_ms, MAX_REQUEST_DELAY_MS
            )));
        }
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Inline titles followed by those from `titles_file`, with blank lines,
    /// `#` comments and exact repeats removed.
    pub fn resolve_titles(&self) -> ConfigResult<Vec<String>> {
        let mut titles: Vec<String> = self.titles.clone();
        if let Some(path) = &self.titles_file {
            let body = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
                path: path.clone(),
                source,
            })?;
            titles.extend(parse_titles(&body));
        }

        let mut seen = std::collections::HashSet::new();
        Ok(titles
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect())
    }

    /// Every search of the run: keyword terms first, then titles.
    pub fn build_queries(&self) -> ConfigResult<Vec<SearchQuery>> {
        let mut queries: Vec<SearchQuery> = self
            .keyword_terms
            .iter()
            .map(|t| SearchQuery::keyword(&t.term, &t.description, &t.category))
            .collect();
        queries.extend(self.resolve_titles()?.iter().map(|t| SearchQuery::title(t)));
        Ok(queries)
    }
}

/// Titles from a newline-separated list; blank lines and `#` comments skipped.
pub fn parse_titles(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: HarvestConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, HarvestConfig::default());
        assert_eq!(config.request_delay(), Duration::from_millis(1000));
        assert!(!config.keyword_terms.is_empty());
    }

    #[test]
    fn test_load_and_validate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harvest.json");
        std::fs::write(
            &path,
            r#"{"keyword_terms": [{"term": "permafrost"}], "request_delay_ms": 0, "write_detailed": false}"#,
        )
        .unwrap();

        let config = HarvestConfig::load(&path).unwrap();
        assert_eq!(config.keyword_terms, vec![KeywordTerm::new("permafrost", "", "")]);
        assert_eq!(config.request_delay_ms, 0);
        assert!(!config.write_detailed);
        assert!(config.write_failed);
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");

        std::fs::write(&path, r#"{"keyword_terms": [{"term": "  "}]}"#).unwrap();
        assert!(matches!(HarvestConfig::load(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, r#"{"request_delay_ms": 600000}"#).unwrap();
        assert!(matches!(HarvestConfig::load(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "[").unwrap();
        assert!(matches!(HarvestConfig::load(&path), Err(ConfigError::ParseError(_))));

        let missing = dir.path().join("missing.json");
        assert!(matches!(HarvestConfig::load(&missing), Err(ConfigError::IoError { .. })));
    }

    #[test]
    fn test_parse_titles_skips_comments_and_blanks() {
        let body = "# weekly list\nFirst Title\n\n  Second Title  \n#skip\n";
        assert_eq!(parse_titles(body), vec!["First Title", "Second Title"]);
    }

    #[test]
    fn test_build_queries_orders_keywords_before_titles() {
        let dir = TempDir::new().unwrap();
        let titles_path = dir.path().join("titles.txt");
        std::fs::write(&titles_path, "From File\nInline Title\n").unwrap();

        let config = HarvestConfig {
            keyword_terms: vec![KeywordTerm::new("glaciers", "Glacier studies", "cryosphere")],
            titles: vec!["Inline Title".to_string(), " ".to_string()],
            titles_file: Some(titles_path),
            ..HarvestConfig::default()
        };

        let queries = config.build_queries().unwrap();
        let keys: Vec<&str> = queries.iter().map(|q| q.key.as_str()).collect();
        assert_eq!(keys, vec!["glaciers", "Inline Title", "From File"]);
        assert!(!queries[0].is_text_query());
        assert!(queries[1].is_text_query());
        assert_eq!(queries[0].category, "cryosphere");
    }
}
