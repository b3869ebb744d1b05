//! Harvest pipeline module.
//!
//! This module runs a harvest: every configured search is sent to a
//! [`SearchProvider`] in turn, each batch is reduced by the result filter, and
//! the survivors are accumulated into a [`HarvestRun`]. Once every search has
//! run, the accumulated documents are deduplicated by identifier, projected to
//! [`FilteredPublication`] records and handed to a [`PublicationStore`].
//!
//! # Usage
//!
//! ```ignore
//! use paper_harvest::config::HarvestConfig;
//! use paper_harvest::ingestion::HarvestPipeline;
//! use paper_harvest::provider::json::JsonReplayProvider;
//! use paper_harvest::storage::json::JsonFileStore;
//!
//! let config = HarvestConfig::load("harvest.json".as_ref())?;
//! let provider = JsonReplayProvider::new("responses/");
//! let store = JsonFileStore::new(&config.output_dir);
//! let mut pipeline = HarvestPipeline::initialize(provider, store, &config).await?;
//!
//! let summary = pipeline.run(&config.build_queries()?).await?;
//! println!("Unique: {}, failed searches: {}", summary.unique, summary.failed);
//! ```
//!
//! Searches run strictly one after another with a fixed pause between calls.
//! A provider failure is recorded against its search and treated as an empty
//! batch; a storage failure aborts the run.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, HarvestConfig};
use crate::filter::filter_batch;
use crate::models::{
    DetailedReport, FilteredPublication, RawDocument, SearchBatchResult, SearchMetadata,
    SearchRecord,
};
use crate::provider::{ProviderResult, SearchProvider};
use crate::query::SearchQuery;
use crate::storage::{PublicationStore, StorageError};

/// Errors that can abort a harvest run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Configuration could not be used
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

/// Result type for harvest operations.
pub type HarvestResult<T> = Result<T, HarvestError>;

/// Accumulated state of one harvest run.
///
/// Holds the filtered documents of every batch in processing order plus the
/// per-search statistics. Each run owns its own instance.
#[derive(Debug, Default)]
pub struct HarvestRun {
    documents: Vec<RawDocument>,
    searches: Vec<SearchRecord>,
}

impl HarvestRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append filtered documents to the running collection.
    pub fn accumulate(&mut self, documents: impl IntoIterator<Item = RawDocument>) {
        self.documents.extend(documents);
    }

    /// Record the statistics of one search.
    pub fn record_search(&mut self, record: SearchRecord) {
        self.searches.push(record);
    }

    /// Filter one provider outcome, record it and accumulate the survivors.
    ///
    /// A failed fetch is handled exactly like an empty batch, with the error
    /// kept on the search record.
    pub fn process_batch(
        &mut self,
        query: &SearchQuery,
        outcome: ProviderResult<SearchBatchResult>,
    ) -> &SearchRecord {
        let (batch, error) = match outcome {
            Ok(batch) => (batch, None),
            Err(e) => (SearchBatchResult::empty(), Some(e.to_string())),
        };

        let retrieved = batch.documents.len();
        let kept = filter_batch(batch.documents, &query.mode);

        self.record_search(SearchRecord {
            key: query.key.clone(),
            description: query.description.clone(),
            category: query.category.clone(),
            mode: query.mode.label().to_string(),
            total_count: batch.total_count,
            retrieved,
            kept: kept.len(),
            error,
        });
        self.accumulate(kept);

        &self.searches[self.searches.len() - 1]
    }

    /// All accumulated documents, duplicates included.
    pub fn documents(&self) -> &[RawDocument] {
        &self.documents
    }

    pub fn searches(&self) -> &[SearchRecord] {
        &self.searches
    }

    /// Searches that failed upstream or kept nothing.
    pub fn failed_searches(&self) -> Vec<SearchRecord> {
        self.searches.iter().filter(|s| s.is_failed()).cloned().collect()
    }

    /// First-seen document for every distinct identifier.
    ///
    /// Documents without an identifier are skipped.
    pub fn unique_documents(&self) -> Vec<&RawDocument> {
        let mut seen = HashSet::new();
        self.documents
            .iter()
            .filter(|doc| match doc.id() {
                Some(id) => seen.insert(id),
                None => {
                    debug!("Skipping document without id: '{}'", doc.title());
                    false
                }
            })
            .collect()
    }

    /// Deduplicate by identifier and project to publication records.
    pub fn finalize(&self) -> Vec<FilteredPublication> {
        self.unique_documents()
            .into_iter()
            .map(FilteredPublication::from_document)
            .collect()
    }

    /// Deduplicate by identifier and return untransformed documents with run metadata.
    pub fn finalize_detailed(&self) -> DetailedReport {
        self.finalize_detailed_at(Utc::now())
    }

    /// [`HarvestRun::finalize_detailed`] with an explicit timestamp.
    pub fn finalize_detailed_at(&self, timestamp: DateTime<Utc>) -> DetailedReport {
        let unique_publications: Vec<RawDocument> =
            self.unique_documents().into_iter().cloned().collect();

        DetailedReport {
            search_metadata: SearchMetadata {
                total_searches: self.searches.len(),
                total_results_before_dedup: self.documents.len(),
                total_unique_results: unique_publications.len(),
                timestamp: timestamp.to_rfc3339(),
                searches: self.searches.clone(),
            },
            unique_publications,
        }
    }
}

/// Outcome of a completed harvest.
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    /// Per-search statistics in run order
    pub searches: Vec<SearchRecord>,

    /// Documents accumulated before identifier deduplication
    pub total_before_dedup: usize,

    /// Publications written
    pub unique: usize,

    /// Searches that failed or kept nothing
    pub failed: usize,

    /// Publications absent from the previous run's output, if one existed
    pub new_since_last_run: Option<usize>,

    pub publications: Vec<FilteredPublication>,
}

/// Options controlling a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Pause between successive provider calls
    pub request_delay: Duration,

    pub write_detailed: bool,

    pub write_failed: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(crate::config::DEFAULT_REQUEST_DELAY_MS),
            write_detailed: true,
            write_failed: true,
        }
    }
}

impl From<&HarvestConfig> for PipelineOptions {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            request_delay: config.request_delay(),
            write_detailed: config.write_detailed,
            write_failed: config.write_failed,
        }
    }
}

/// Harvest pipeline coordinator.
///
/// Drives the provider sequentially and persists the finalized run through
/// the store.
pub struct HarvestPipeline<P, S>
where
    P: SearchProvider,
    S: PublicationStore,
{
    /// Source of raw search batches
    provider: P,

    /// Destination of the finalized artifacts
    store: S,

    options: PipelineOptions,
}

impl<P, S> HarvestPipeline<P, S>
where
    P: SearchProvider,
    S: PublicationStore,
{
    /// Create a pipeline over an already initialized store.
    pub fn new(provider: P, store: S, options: PipelineOptions) -> Self {
        Self {
            provider,
            store,
            options,
        }
    }

    /// Validate `config`, initialize the store and create a pipeline from them.
    ///
    /// # Errors
    /// Returns `HarvestError::ConfigError` if `config` is invalid, in which case
    /// the store is left untouched, and `HarvestError::StorageError` if the
    /// store cannot be initialized
    pub async fn initialize(provider: P, mut store: S, config: &HarvestConfig) -> HarvestResult<Self> {
        config.validate()?;
        store.initialize().await?;
        Ok(Self::new(provider, store, PipelineOptions::from(config)))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run every search and persist the results.
    pub async fn run(&mut self, queries: &[SearchQuery]) -> HarvestResult<HarvestSummary> {
        self.run_with_progress(queries, |_| {}).await
    }

    /// Run every search, calling `on_search` after each one, and persist the results.
    ///
    /// # Errors
    /// Returns `HarvestError::StorageError` if any artifact cannot be saved.
    /// Provider failures never abort the run.
    pub async fn run_with_progress<F>(
        &mut self,
        queries: &[SearchQuery],
        mut on_search: F,
    ) -> HarvestResult<HarvestSummary>
    where
        F: FnMut(&SearchRecord),
    {
        let run = self.collect(queries, &mut on_search).await;
        self.persist(&run).await
    }

    /// Execute the searches and accumulate their filtered batches.
    pub async fn collect<F>(&self, queries: &[SearchQuery], on_search: &mut F) -> HarvestRun
    where
        F: FnMut(&SearchRecord),
    {
        let mut run = HarvestRun::new();
        info!(
            "Running {} searches against {}",
            queries.len(),
            self.provider.name()
        );

        for (idx, query) in queries.iter().enumerate() {
            if idx > 0 && !self.options.request_delay.is_zero() {
                tokio::time::sleep(self.options.request_delay).await;
            }

            let outcome = self.provider.search(query).await;
            if let Err(e) = &outcome {
                warn!("Search '{}' failed: {}", query.key, e);
            }

            let record = run.process_batch(query, outcome);
            info!(
                "[{}/{}] {} '{}': {} reported, {} retrieved, {} kept",
                idx + 1,
                queries.len(),
                record.mode,
                record.key,
                record.total_count,
                record.retrieved,
                record.kept
            );
            on_search(record);
        }

        run
    }

    /// Finalize a collected run and write its artifacts.
    pub async fn persist(&mut self, run: &HarvestRun) -> HarvestResult<HarvestSummary> {
        let publications = run.finalize();
        let failed = run.failed_searches();

        let new_since_last_run = match self.store.load_publications().await {
            Ok(previous) => previous.map(|prev| count_new(&prev, &publications)),
            Err(e) => {
                warn!("Could not read previous publications: {}", e);
                None
            }
        };

        self.store.save_publications(&publications).await?;
        if self.options.write_detailed {
            self.store.save_detailed(&run.finalize_detailed()).await?;
        }
        if self.options.write_failed {
            self.store.save_failed_searches(&failed).await?;
        }

        info!(
            "Harvest complete: {} accumulated, {} unique, {} failed searches",
            run.documents().len(),
            publications.len(),
            failed.len()
        );

        Ok(HarvestSummary {
            searches: run.searches().to_vec(),
            total_before_dedup: run.documents().len(),
            unique: publications.len(),
            failed: failed.len(),
            new_since_last_run,
            publications,
        })
    }
}

/// Comparison key for a publication across runs: DOI when present, else title.
fn publication_key(publication: &FilteredPublication) -> Option<String> {
    publication
        .doi
        .as_str()
        .filter(|doi| !doi.is_empty())
        .or_else(|| publication.title.as_str())
        .map(str::to_lowercase)
}

fn count_new(previous: &[FilteredPublication], current: &[FilteredPublication]) -> usize {
    let known: HashSet<String> = previous.iter().filter_map(publication_key).collect();
    current
        .iter()
        .filter(|p| publication_key(p).map_or(true, |key| !known.contains(&key)))
        .count()
}
