//! Harvest binary entry point.
//!
//! Runs every configured keyword and title search, reduces the results, and
//! writes the publication records to the output directory.
//!
//! # Examples
//!
//! Replay captured responses with the built-in keyword terms:
//! ```bash
//! harvest --replay-dir responses/
//! ```
//!
//! Use a config file and an extra titles list:
//! ```bash
//! harvest --config harvest.json --replay-dir responses/ --titles-file titles.txt
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use paper_harvest::{
    config::HarvestConfig,
    ingestion::{HarvestPipeline, HarvestSummary},
    models::SearchRecord,
    provider::json::JsonReplayProvider,
    storage::json::JsonFileStore,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for the run summary
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Per-search table
    Table,
    /// Machine-readable JSON
    Json,
}

/// Harvest CLI for collecting and reducing publication search results
#[derive(Parser, Debug)]
#[command(
    name = "harvest",
    version,
    about = "Collect, deduplicate and rank publication search results",
    long_about = "Runs the configured keyword terms and titles against a search provider, \
                  reduces each batch to the best publications, and writes the deduplicated \
                  records to the output directory.

EXAMPLES:
  Replay captured responses:
    harvest --replay-dir responses/

  Config file plus a titles list:
    harvest --config harvest.json --replay-dir responses/ --titles-file titles.txt

  No pause between searches, JSON summary:
    harvest --replay-dir responses/ --delay-ms 0 --format json"
)]
struct Args {
    /// JSON config file (built-in defaults when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory of captured search responses, one JSON file per search
    #[arg(long, value_name = "DIR")]
    replay_dir: PathBuf,

    /// Newline-separated titles file (overrides the config's titles_file)
    #[arg(long, value_name = "FILE")]
    titles_file: Option<PathBuf>,

    /// Output directory (overrides the config)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Pause between searches in milliseconds (overrides the config)
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Skip the detailed audit report
    #[arg(long)]
    no_detailed: bool,

    /// Summary output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load the config file, then apply command-line overrides
fn load_config(args: &Args) -> Result<HarvestConfig> {
    let mut config = match &args.config {
        Some(path) => HarvestConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            debug!("No config file given, using defaults");
            HarvestConfig::default()
        }
    };

    if let Some(titles_file) = &args.titles_file {
        config.titles_file = Some(titles_file.clone());
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }
    if let Some(delay_ms) = args.delay_ms {
        config.request_delay_ms = delay_ms;
    }
    if args.no_detailed {
        config.write_detailed = false;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Create a progress bar for tracking searches
fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} searches | {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("##-"),
    );
    pb
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Format per-search statistics as a table
fn format_searches_table(searches: &[SearchRecord]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Search").add_attribute(Attribute::Bold),
        Cell::new("Category").add_attribute(Attribute::Bold),
        Cell::new("Mode").add_attribute(Attribute::Bold),
        Cell::new("Reported").add_attribute(Attribute::Bold),
        Cell::new("Retrieved").add_attribute(Attribute::Bold),
        Cell::new("Kept").add_attribute(Attribute::Bold),
        Cell::new("Status").add_attribute(Attribute::Bold),
    ]);

    for (idx, record) in searches.iter().enumerate() {
        let (status, color) = match (&record.error, record.kept) {
            (Some(_), _) => ("ERROR", Color::Red),
            (None, 0) => ("EMPTY", Color::Yellow),
            (None, _) => ("OK", Color::Green),
        };

        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(truncate(&record.key, 50)),
            Cell::new(&record.category),
            Cell::new(&record.mode),
            Cell::new(record.total_count),
            Cell::new(record.retrieved),
            Cell::new(record.kept),
            Cell::new(status).fg(color),
        ]);
    }

    table.to_string()
}

/// Format the run summary as JSON
fn format_summary_json(summary: &HarvestSummary) -> Result<String> {
    let value = serde_json::json!({
        "total_searches": summary.searches.len(),
        "total_results_before_dedup": summary.total_before_dedup,
        "total_unique_results": summary.unique,
        "failed_searches": summary.failed,
        "new_since_last_run": summary.new_since_last_run,
        "searches": summary.searches,
    });
    serde_json::to_string_pretty(&value).context("Failed to serialize summary to JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("Starting publication harvest");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    if !args.replay_dir.is_dir() {
        anyhow::bail!("Replay directory not found: {}", args.replay_dir.display());
    }

    let config = load_config(&args)?;
    let queries = config
        .build_queries()
        .context("Failed to build the search list")?;

    if queries.is_empty() {
        warn!("No keyword terms or titles configured, nothing to do");
        return Ok(());
    }
    info!(
        "{} searches ({} keyword terms), output to {}",
        queries.len(),
        config.keyword_terms.len(),
        config.output_dir.display()
    );

    let provider = JsonReplayProvider::new(&args.replay_dir);
    let store = JsonFileStore::new(&config.output_dir);
    let mut pipeline = HarvestPipeline::initialize(provider, store, &config)
        .await
        .context("Failed to initialize output storage")?;

    let progress = create_progress_bar(queries.len());
    let summary = pipeline
        .run_with_progress(&queries, |record| {
            progress.set_message(truncate(&record.key, 40));
            progress.inc(1);
        })
        .await
        .context("Harvest failed")?;
    progress.finish_with_message(format!("{} unique publications", summary.unique));

    match args.format {
        OutputFormat::Table => {
            println!("{}", format_searches_table(&summary.searches));

            let elapsed = start_time.elapsed();
            println!("\n╔════════════════════════════════════════╗");
            println!("║      Harvest Completed                 ║");
            println!("╠════════════════════════════════════════╣");
            println!("║ Searches:             {:>16} ║", summary.searches.len());
            println!("║ Before dedup:         {:>16} ║", summary.total_before_dedup);
            println!("║ Unique publications:  {:>16} ║", summary.unique);
            if let Some(new) = summary.new_since_last_run {
                println!("║ New since last run:   {:>16} ║", new);
            }
            println!("║ Failed searches:      {:>16} ║", summary.failed);
            println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
            println!("╚════════════════════════════════════════╝");
        }
        OutputFormat::Json => {
            println!("{}", format_summary_json(&summary)?);
        }
    }

    if summary.failed > 0 {
        warn!(
            "{} searches failed or returned nothing - see {}",
            summary.failed,
            pipeline.store().output_dir().display()
        );
    }

    info!("Harvest completed successfully");

    Ok(())
}
