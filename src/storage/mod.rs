//! Storage layer abstraction and implementations.
//!
//! This module defines the interface for persisting the artifacts of a
//! harvest run: the compact publication list, the optional detailed audit
//! report, and the list of searches that produced nothing.

pub mod json;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DetailedReport, FilteredPublication, SearchRecord};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Data serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Other unexpected errors
    #[error("Unexpected storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for harvest output backends.
#[async_trait]
pub trait PublicationStore: Send + Sync {
    /// Prepare the backend (create directories, tables, etc.).
    ///
    /// This should be idempotent and safe to call multiple times.
    async fn initialize(&mut self) -> StorageResult<()>;

    /// Persist the compact publication list, replacing any previous list.
    async fn save_publications(&mut self, publications: &[FilteredPublication]) -> StorageResult<()>;

    /// Persist the detailed audit report.
    async fn save_detailed(&mut self, report: &DetailedReport) -> StorageResult<()>;

    /// Persist the searches that failed or kept nothing.
    async fn save_failed_searches(&mut self, failed: &[SearchRecord]) -> StorageResult<()>;

    /// Load the most recently saved publication list, if any.
    async fn load_publications(&self) -> StorageResult<Option<Vec<FilteredPublication>>>;
}
