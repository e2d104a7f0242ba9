//! Litharvest: scholarly literature aggregator.
//! Entry point for the `litharvest` binary.
//!
//! ```bash
//! litharvest search "sea ice" --from 2023-01-01 --lang en --source OpenAlex --source arXiv
//! litharvest export --format csv --output records.csv
//! litharvest stats
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use litharvest_common::PoliteClient;
use litharvest_ingestion::{
    export_records, Aggregator, ExportFormat, JsonFileRepository, RecordStore, SearchProgress,
    SearchRequest, SourceRegistry, Stage,
};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "litharvest", version, about = "Aggregate bibliographic records from public scholarly APIs")]
struct Cli {
    /// Override `storage.data_dir` from the configuration file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the selected sources and store the merged results.
    Search {
        /// Free-text keywords.
        #[arg(required = true)]
        keywords: Vec<String>,

        /// Earliest publication date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Latest publication date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Accepted language prefix; repeat or comma-separate for several.
        #[arg(long = "lang", value_delimiter = ',')]
        languages: Vec<String>,

        /// Source adapter name; repeat or comma-separate for several.
        #[arg(long = "source", value_delimiter = ',')]
        sources: Vec<String>,

        /// Web page to fetch alongside the sources.
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Per-source result cap.
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Write every stored record in an interchange format.
    Export {
        /// json, csv or ndjson.
        #[arg(long, default_value = "json")]
        format: ExportFormat,

        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Counts of stored records by source, language and year.
    Stats,

    /// Recent searches, newest first.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Remove every stored record. Search history is kept.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries exported data.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("litharvest=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::Config::load().context("loading configuration")?;
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.storage.data_dir.clone());
    let store = Arc::new(JsonFileRepository::open(&data_dir).await?);
    info!(data_dir = %store.dir().display(), "Litharvest {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Search { keywords, from, to, languages, sources, urls, max_results } => {
            let request = SearchRequest {
                keywords: keywords.join(" "),
                date_from: from,
                date_to: to,
                languages,
                sources: if sources.is_empty() { config.search.sources.clone() } else { sources },
                custom_urls: urls,
                max_results,
            };
            run_search(&config, store, request).await?;
        }
        Commands::Export { format, output } => {
            let records = store.load_all_records().await?;
            let body = export_records(&records, format)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, body)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(count = records.len(), path = %path.display(), %format, "Export written");
                }
                None => println!("{body}"),
            }
        }
        Commands::Stats => {
            let stats = store.statistics().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::History { limit } => {
            for entry in store.search_history().await?.into_iter().take(limit) {
                println!(
                    "{}  {:>4} records  \"{}\"{}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.total,
                    entry.query.keywords,
                    if entry.errors.is_empty() {
                        String::new()
                    } else {
                        format!("  ({} source errors)", entry.errors.len())
                    }
                );
            }
        }
        Commands::Clear => {
            store.clear_all().await?;
            info!("Stored records cleared");
        }
    }

    Ok(())
}

async fn run_search(
    config: &config::Config,
    store: Arc<JsonFileRepository>,
    request: SearchRequest,
) -> anyhow::Result<()> {
    let client = PoliteClient::new(&config.http_settings())?;
    let registry = SourceRegistry::with_defaults(client, &config.source_options());

    let (tx, rx) = broadcast::channel(256);
    let printer = tokio::spawn(print_progress(rx));

    let aggregator = Aggregator::new(registry, store, config.pipeline()).with_progress(tx);
    let outcome = aggregator.search(request).await;
    // Closes the channel so the printer drains and exits.
    drop(aggregator);
    let _ = printer.await;

    let result = outcome?;
    for record in &result.records {
        println!("{}  [{}] {}  {}", record.date, record.source, record.title, record.url);
    }
    for error in &result.errors {
        eprintln!("source error: {error}");
    }
    Ok(())
}

async fn print_progress(mut rx: broadcast::Receiver<SearchProgress>) {
    loop {
        match rx.recv().await {
            Ok(ev) if ev.stage == Stage::Failed => eprintln!("✗ {}", ev.message),
            Ok(ev) => eprintln!("{}", ev.message),
            Err(broadcast::error::RecvError::Lagged(n)) => eprintln!("({n} progress messages skipped)"),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
