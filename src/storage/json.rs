//! JSON file storage implementation.
//!
//! Writes each artifact as a pretty-printed JSON file inside one output
//! directory:
//! - `publications.json`: compact publication records
//! - `publications_detailed.json`: detailed audit report
//! - `failed_searches.json`: searches that failed or kept nothing

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use super::{PublicationStore, StorageError, StorageResult};
use crate::models::{DetailedReport, FilteredPublication, SearchRecord};

pub const PUBLICATIONS_FILE: &str = "publications.json";
pub const DETAILED_FILE: &str = "publications_detailed.json";
pub const FAILED_SEARCHES_FILE: &str = "failed_searches.json";

/// File-based publication store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    /// Directory holding the output files
    output_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store writing into `output_dir`.
    ///
    /// The directory is created by [`PublicationStore::initialize`].
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    async fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> StorageResult<()> {
        let body = serde_json::to_string_pretty(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let path = self.path_for(file_name);
        tokio::fs::write(&path, body).await?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl PublicationStore for JsonFileStore {
    async fn initialize(&mut self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    async fn save_publications(&mut self, publications: &[FilteredPublication]) -> StorageResult<()> {
        self.write_json(PUBLICATIONS_FILE, publications).await?;
        info!(
            "Saved {} publications to {}",
            publications.len(),
            self.path_for(PUBLICATIONS_FILE).display()
        );
        Ok(())
    }

    async fn save_detailed(&mut self, report: &DetailedReport) -> StorageResult<()> {
        self.write_json(DETAILED_FILE, report).await
    }

    async fn save_failed_searches(&mut self, failed: &[SearchRecord]) -> StorageResult<()> {
        self.write_json(FAILED_SEARCHES_FILE, failed).await
    }

    async fn load_publications(&self) -> StorageResult<Option<Vec<FilteredPublication>>> {
        let path = self.path_for(PUBLICATIONS_FILE);
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::IoError(e)),
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| StorageError::SerializationError(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchMetadata, RawDocument};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn publication(title: &str) -> FilteredPublication {
        FilteredPublication {
            title: json!(title),
            author_list: json!("A. Author"),
            journal_title: Value::Null,
            source_title: Value::Null,
            doi: json!("10.1/abc"),
            short_abstract: Value::Null,
            publication_date: json!("2022-01"),
        }
    }

    #[tokio::test]
    async fn test_initialize_creates_nested_dir() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("a").join("b"));
        store.initialize().await.unwrap();
        assert!(store.output_dir().is_dir());
        store.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn test_publications_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        store.initialize().await.unwrap();

        assert!(store.load_publications().await.unwrap().is_none());

        let pubs = vec![publication("One"), publication("Two")];
        store.save_publications(&pubs).await.unwrap();
        assert_eq!(store.load_publications().await.unwrap(), Some(pubs));
    }

    #[tokio::test]
    async fn test_detailed_and_failed_files_written() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        store.initialize().await.unwrap();

        let record = SearchRecord {
            key: "nothing".to_string(),
            description: "d".to_string(),
            category: "c".to_string(),
            mode: "keyword".to_string(),
            total_count: 0,
            retrieved: 0,
            kept: 0,
            error: Some("No response".to_string()),
        };
        let report = DetailedReport {
            search_metadata: SearchMetadata {
                total_searches: 1,
                total_results_before_dedup: 1,
                total_unique_results: 1,
                timestamp: "2024-01-01T00:00:00+00:00".to_string(),
                searches: vec![record.clone()],
            },
            unique_publications: vec![RawDocument::from_value(json!({"id": "x", "extra": [1, 2]}))],
        };

        store.save_detailed(&report).await.unwrap();
        store.save_failed_searches(&[record]).await.unwrap();

        let detailed: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path_for(DETAILED_FILE)).unwrap()).unwrap();
        assert_eq!(detailed["search_metadata"]["total_searches"], json!(1));
        assert_eq!(detailed["unique_publications"][0]["extra"], json!([1, 2]));

        let failed: Value = serde_json::from_str(
            &std::fs::read_to_string(store.path_for(FAILED_SEARCHES_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(failed[0]["error"], json!("No response"));
    }

    #[tokio::test]
    async fn test_corrupt_publications_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PUBLICATIONS_FILE), "not json").unwrap();
        let store = JsonFileStore::new(dir.path());
        let result = store.load_publications().await;
        assert!(matches!(result, Err(StorageError::SerializationError(_))));
    }
}
