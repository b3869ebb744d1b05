//! Paper Harvest - reduces raw publication search results to a clean record set.
//!
//! A harvest queries a publication-search API with a fixed list of keyword
//! terms and a changing list of titles, then reduces the raw hits to a
//! deduplicated, cleaned, ranked set of publication records.
//!
//! # Architecture
//!
//! - **text**: highlight and markup stripping, title keys
//! - **models**: raw documents, batches, relevance breakdowns, output records
//! - **query**: search definitions and free-text relevance scoring
//! - **filter**: type filtering, same-title resolution, per-batch ranking
//! - **ingestion**: run accumulation, identifier dedup, the harvest pipeline
//! - **provider**: source of raw search batches
//! - **storage**: persistence of the run's artifacts
//! - **config**: keyword terms, titles and run options
//!
//! # Workflow
//!
//! 1. Build the search list: keyword terms first, then titles
//! 2. For each search, fetch a raw batch from the provider
//! 3. Keep allowed publication types, collapse same-title duplicates
//! 4. Keyword searches keep every survivor; title searches keep the best match
//! 5. Append survivors to the run, pausing between searches
//! 6. Deduplicate by identifier (first seen wins) and project to records
//! 7. Save records, the detailed report, and the failed searches
//!
//! # Example
//!
//! ```ignore
//! use paper_harvest::{
//!     config::HarvestConfig,
//!     ingestion::HarvestPipeline,
//!     provider::json::JsonReplayProvider,
//!     storage::json::JsonFileStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarvestConfig::default();
//!     let provider = JsonReplayProvider::new("responses");
//!     let store = JsonFileStore::new(&config.output_dir);
//!     let mut pipeline = HarvestPipeline::initialize(provider, store, &config).await?;
//!
//!     let summary = pipeline.run(&config.build_queries()?).await?;
//!     for publication in &summary.publications {
//!         println!("{}", publication.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod filter;
pub mod ingestion;
pub mod models;
pub mod provider;
pub mod query;
pub mod storage;
pub mod text;

// Re-export commonly used types at the crate root
pub use config::HarvestConfig;
pub use filter::filter_batch;
pub use ingestion::{HarvestPipeline, HarvestRun, HarvestSummary};
pub use models::{FilteredPublication, PubClass, RawDocument, SearchBatchResult, SearchMode};
pub use provider::SearchProvider;
pub use query::{score_relevance, SearchQuery};
pub use storage::PublicationStore;
pub use text::clean;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
