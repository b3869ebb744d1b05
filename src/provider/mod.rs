//! Search provider module.
//!
//! This module defines the interface for obtaining raw search results for a
//! single query. The harvest pipeline only ever sees the `{count, docs}`
//! shaped [`SearchBatchResult`]; issuing requests, authenticating, and parsing
//! responses belong to the provider.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::SearchBatchResult;
use crate::query::SearchQuery;

pub mod json;

/// Errors that can occur when fetching a search batch.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Response could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// No response is available for the query
    #[error("No response for query: {0}")]
    NotFound(String),

    /// The source answered with nothing
    #[error("Empty response for query: {0}")]
    EmptyResponse(String),

    /// Other provider-specific errors
    #[error("Provider error: {0}")]
    Other(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for sourcing raw search batches.
///
/// # Design Notes
///
/// - Providers return documents untouched; filtering, grouping and
///   deduplication happen in the pipeline
/// - Providers do not retry; a failed call is recorded against the search and
///   the run moves on
/// - Pacing between calls is owned by the pipeline, not the provider
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search and return the raw batch.
    ///
    /// # Errors
    /// Returns `ProviderError` if the batch cannot be fetched or parsed
    async fn search(&self, query: &SearchQuery) -> ProviderResult<SearchBatchResult>;

    /// Human-readable name of this provider, for logging.
    fn name(&self) -> &str;
}
