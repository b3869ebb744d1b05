//! Replay provider backed by captured JSON responses.
//!
//! Each search key maps to `<dir>/<slug>.json`, where the file holds the API
//! response body (`{"count": n, "docs": [...]}`). This lets a harvest run be
//! reproduced offline from previously captured responses.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{ProviderError, ProviderResult, SearchProvider};
use crate::models::SearchBatchResult;
use crate::query::SearchQuery;

/// Provider that reads one JSON response file per search key.
#[derive(Debug, Clone)]
pub struct JsonReplayProvider {
    dir: PathBuf,
    name: String,
}

impl JsonReplayProvider {
    /// Create a provider reading responses from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = format!("JsonReplayProvider({})", dir.display());
        Self { dir, name }
    }

    /// Path of the response file for a search key.
    pub fn response_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slug(key)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// File-name slug for a search key: lower-cased, every run of
/// non-alphanumeric characters replaced by a single `-`.
pub fn slug(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut pending_dash = false;
    for c in key.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}

#[async_trait]
impl SearchProvider for JsonReplayProvider {
    async fn search(&self, query: &SearchQuery) -> ProviderResult<SearchBatchResult> {
        let path = self.response_path(&query.key);
        debug!("Replaying '{}' from {}", query.key, path.display());

        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::NotFound(format!(
                    "{} (expected {})",
                    query.key,
                    path.display()
                )));
            }
            Err(e) => return Err(ProviderError::IoError(e)),
        };

        if body.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(query.key.clone()));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", path.display(), e)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
