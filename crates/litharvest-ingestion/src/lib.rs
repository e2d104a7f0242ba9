//! litharvest-ingestion: Bibliographic aggregation pipeline.
//! - Source adapters (OpenAlex, CrossRef, DOAJ, Europe PMC, BASE, arXiv,
//!   PubMed, CORE, Semantic Scholar, arbitrary web pages)
//! - Normalisation into a single canonical record shape
//! - Overlapping word-window chunking
//! - Deduplication by URL
//! - Record storage, search history and statistics
//! - JSON / CSV / NDJSON export

pub mod chunker;
pub mod dedup;
pub mod export;
pub mod file_repository;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod sources;
pub mod text;

pub use export::{export_records, ExportFormat};
pub use file_repository::JsonFileRepository;
pub use models::{CanonicalRecord, SearchRequest, SearchResult, SourceKind, SourceResponse};
pub use pipeline::{Aggregator, PacingConfig, PipelineConfig, SearchProgress, Stage};
pub use repository::{MemoryRepository, RecordFilters, RecordStore, Statistics};
pub use sources::registry::SourceOptions;
pub use sources::{LiteratureSource, SourceRegistry};
