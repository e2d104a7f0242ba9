//! End-to-end aggregation pipeline.
//!
//! Orchestrates one search request:
//!   1. Validate the request and fill in the default per-source cap
//!   2. Invoke each selected source adapter in order, pausing between them
//!   3. Drop records whose language is not accepted (custom URLs exempt)
//!   4. Fetch custom URLs when the request carries any
//!   5. Deduplicate the union by `url`, first occurrence wins
//!   6. Persist the unique set and append it to search history
//!   7. Emit progress events via broadcast channel
//!
//! Adapters run one at a time so the inter-source delay can be enforced.
//! Adapter failures are collected, never fatal; a storage failure is.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use litharvest_common::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::dedup::dedup_by_url;
use crate::models::{CanonicalRecord, SearchRequest, SearchResult, SourceKind, DEFAULT_MAX_RESULTS};
use crate::repository::RecordStore;
use crate::sources::{LiteratureSource, SourceRegistry};

// ── Config ────────────────────────────────────────────────────────────────────

/// Politeness delays toward unauthenticated public APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    /// Between consecutive adapter invocations.
    pub inter_source_delay: Duration,
    /// Between PubMed's esearch and esummary calls.
    pub pubmed_request_delay: Duration,
    /// Between consecutive custom URLs.
    pub custom_url_request_delay: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            inter_source_delay: Duration::from_millis(1000),
            pubmed_request_delay: Duration::from_millis(500),
            custom_url_request_delay: Duration::from_millis(1500),
        }
    }
}

impl PacingConfig {
    /// No delays at all; for tests and offline fakes.
    pub fn none() -> Self {
        Self {
            inter_source_delay: Duration::ZERO,
            pubmed_request_delay: Duration::ZERO,
            custom_url_request_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub pacing: PacingConfig,
    /// Per-source cap applied when a request does not name one.
    pub default_max_results: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            default_max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

// ── Progress events ───────────────────────────────────────────────────────────

/// Engine state a progress event was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Fetching,
    Filtering,
    Merging,
    Deduplicating,
    Persisted,
    Failed,
}

/// Progress event emitted during a search (cloneable for broadcast).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProgress {
    pub stage: Stage,
    /// Human-readable status line.
    pub message: String,
    pub records_found: usize,
}

// ── Aggregator ────────────────────────────────────────────────────────────────

pub struct Aggregator {
    registry: SourceRegistry,
    store: Arc<dyn RecordStore>,
    config: PipelineConfig,
    progress_tx: Option<broadcast::Sender<SearchProgress>>,
}

impl Aggregator {
    pub fn new(registry: SourceRegistry, store: Arc<dyn RecordStore>, config: PipelineConfig) -> Self {
        Self { registry, store, config, progress_tx: None }
    }

    pub fn with_progress(mut self, tx: broadcast::Sender<SearchProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    fn emit(&self, stage: Stage, message: impl Into<String>, records_found: usize) {
        let message = message.into();
        debug!(?stage, records_found, "{message}");
        if let Some(tx) = &self.progress_tx {
            // No subscribers is fine.
            let _ = tx.send(SearchProgress { stage, message, records_found });
        }
    }

    async fn pace(&self, invocations: &mut usize) {
        if *invocations > 0 && !self.config.pacing.inter_source_delay.is_zero() {
            tokio::time::sleep(self.config.pacing.inter_source_delay).await;
        }
        *invocations += 1;
    }

    /// Run one search request to completion.
    ///
    /// Returns `Err` only for an invalid request or a storage failure; in
    /// both cases a terminal [`Stage::Failed`] event is emitted first.
    #[instrument(skip(self, request), fields(keywords = %request.keywords))]
    pub async fn search(&self, mut request: SearchRequest) -> Result<SearchResult> {
        if let Err(e) = request.validate() {
            self.emit(Stage::Failed, format!("Search failed: {e}"), 0);
            return Err(e);
        }
        if request.max_results.is_none() {
            request.max_results = Some(self.config.default_max_results);
        }

        let sources = self.registry.select(&request.sources);
        info!(
            sources = ?sources.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            custom_urls = request.custom_urls.len(),
            "Starting search"
        );

        let mut collected: Vec<CanonicalRecord> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut invocations = 0usize;

        // ── 1. Search adapters, in order ─────────────────────────────────────
        for source in &sources {
            self.pace(&mut invocations).await;
            let kind = source.kind();
            self.emit(Stage::Fetching, format!("Searching {kind}..."), collected.len());

            let response = source.search(&request).await;
            if !response.success {
                let msg = format!("{kind}: {}", response.error.unwrap_or_else(|| "unknown error".into()));
                self.emit(Stage::Fetching, msg.clone(), collected.len());
                errors.push(msg);
                continue;
            }

            let received = response.records.len();
            let accepted: Vec<CanonicalRecord> = response
                .records
                .into_iter()
                .filter(|r| request.accepts_language(&r.language))
                .collect();
            let found = accepted.len();
            info!(source = %kind, received, accepted = found, "Records retrieved");
            collected.extend(accepted);
            self.emit(Stage::Filtering, format!("Found {found} documents from {kind}"), collected.len());
        }

        // ── 2. Custom URLs ───────────────────────────────────────────────────
        if !request.custom_urls.is_empty() {
            match self.registry.get(SourceKind::CustomUrl) {
                Some(fetcher) => {
                    self.pace(&mut invocations).await;
                    self.fetch_custom_urls(fetcher.as_ref(), &request, &mut collected, &mut errors)
                        .await;
                }
                None => warn!("custom URLs requested but no URL fetch adapter is registered"),
            }
        }

        // ── 3. Merge and deduplicate ─────────────────────────────────────────
        self.emit(
            Stage::Merging,
            format!("Merging {} documents from {} sources", collected.len(), invocations),
            collected.len(),
        );
        let before = collected.len();
        let unique = dedup_by_url(collected);
        self.emit(
            Stage::Deduplicating,
            format!("Removed {} duplicate documents", before - unique.len()),
            unique.len(),
        );

        let result = SearchResult {
            total: unique.len(),
            records: unique,
            query: request,
            timestamp: Utc::now(),
            errors,
        };

        // ── 4. Persist ───────────────────────────────────────────────────────
        if !result.records.is_empty() {
            if let Err(e) = self.persist(&result).await {
                warn!(error = %e, "Failed to persist search results");
                self.emit(Stage::Failed, format!("Failed to save results: {e}"), result.total);
                return Err(e);
            }
        }

        info!(total = result.total, errors = result.errors.len(), "Search complete");
        self.emit(
            Stage::Persisted,
            format!("Complete! Found {} unique documents.", result.total),
            result.total,
        );
        Ok(result)
    }

    async fn fetch_custom_urls(
        &self,
        fetcher: &dyn LiteratureSource,
        request: &SearchRequest,
        collected: &mut Vec<CanonicalRecord>,
        errors: &mut Vec<String>,
    ) {
        self.emit(Stage::Fetching, "Fetching custom URLs...", collected.len());
        let response = fetcher.search(request).await;
        if response.success {
            let n = response.records.len();
            // Web pages carry no reliable language tag; they bypass the filter.
            collected.extend(response.records);
            self.emit(Stage::Filtering, format!("Found {n} documents from custom URLs"), collected.len());
        } else {
            let msg = format!(
                "{}: {}",
                SourceKind::CustomUrl,
                response.error.unwrap_or_else(|| "unknown error".into())
            );
            warn!("{msg}");
            errors.push(msg);
        }
    }

    async fn persist(&self, result: &SearchResult) -> Result<()> {
        let added = self.store.save_records(&result.records).await?;
        self.store.append_search_history(result).await?;
        debug!(added, "Search results persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use litharvest_common::LitharvestError;
    use std::time::Instant;
    use uuid::Uuid;

    struct FixedSource {
        kind: SourceKind,
        records: Vec<CanonicalRecord>,
    }

    #[async_trait]
    impl LiteratureSource for FixedSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }
        async fn fetch(&self, _request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
            Ok(self.records.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl LiteratureSource for BrokenSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Doaj
        }
        async fn fetch(&self, _request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
            Err(LitharvestError::Status { provider: "DOAJ".into(), status: 503 })
        }
    }

    fn record(url: &str, lang: &str, source: SourceKind) -> CanonicalRecord {
        CanonicalRecord {
            id: Uuid::new_v4(),
            title: url.to_string(),
            authors: vec![],
            date: NaiveDate::from_ymd_opt(2024, 5, 5).unwrap(),
            doi: None,
            url: url.to_string(),
            language: lang.to_string(),
            source,
            abstract_text: String::new(),
            full_text_chunks: vec![],
            files: None,
            created_at: Utc::now(),
        }
    }

    fn aggregator(sources: Vec<Arc<dyn LiteratureSource>>) -> Aggregator {
        let mut registry = SourceRegistry::new();
        for s in sources {
            registry.register(s);
        }
        let config = PipelineConfig { pacing: PacingConfig::none(), ..Default::default() };
        Aggregator::new(registry, Arc::new(MemoryRepository::new()), config)
    }

    fn request(sources: &[&str]) -> SearchRequest {
        SearchRequest {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            ..SearchRequest::new("climate")
        }
    }

    #[tokio::test]
    async fn failures_are_isolated_and_named() {
        let agg = aggregator(vec![
            Arc::new(BrokenSource),
            Arc::new(FixedSource {
                kind: SourceKind::OpenAlex,
                records: vec![record("u1", "en", SourceKind::OpenAlex)],
            }),
        ]);
        let result = agg.search(request(&["DOAJ", "OpenAlex"])).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.errors, vec!["DOAJ: DOAJ API error: 503".to_string()]);
    }

    #[tokio::test]
    async fn language_filter_applies_per_source() {
        let agg = aggregator(vec![Arc::new(FixedSource {
            kind: SourceKind::OpenAlex,
            records: vec![
                record("u1", "ru", SourceKind::OpenAlex),
                record("u2", "en-GB", SourceKind::OpenAlex),
                record("u3", "fr", SourceKind::OpenAlex),
            ],
        })]);
        let mut req = request(&["OpenAlex"]);
        req.languages = vec!["ru".into(), "EN".into()];
        let urls: Vec<_> = agg.search(req).await.unwrap().records.into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn all_sources_failing_is_an_empty_success() {
        let agg = aggregator(vec![Arc::new(BrokenSource)]);
        let result = agg.search(request(&["DOAJ"])).await.unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(agg.store().search_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn progress_ends_with_completion_message() {
        let (tx, mut rx) = broadcast::channel(64);
        let agg = aggregator(vec![Arc::new(FixedSource {
            kind: SourceKind::CrossRef,
            records: vec![record("u1", "en", SourceKind::CrossRef)],
        })])
        .with_progress(tx);

        agg.search(request(&["CrossRef"])).await.unwrap();

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        assert_eq!(events[0].message, "Searching CrossRef...");
        assert!(events.iter().any(|e| e.message == "Found 1 documents from CrossRef"));
        let last = events.last().unwrap();
        assert_eq!(last.stage, Stage::Persisted);
        assert_eq!(last.message, "Complete! Found 1 unique documents.");
    }

    #[tokio::test]
    async fn invalid_request_emits_failure() {
        let (tx, mut rx) = broadcast::channel(8);
        let agg = aggregator(vec![]).with_progress(tx);
        let err = agg.search(SearchRequest::new("  ")).await.unwrap_err();
        assert!(matches!(err, LitharvestError::InvalidRequest(_)));
        assert_eq!(rx.try_recv().unwrap().stage, Stage::Failed);
    }

    /// Records the instant each fetch starts.
    struct StampedSource {
        kind: SourceKind,
        calls: Arc<std::sync::Mutex<Vec<Instant>>>,
    }

    #[async_trait]
    impl LiteratureSource for StampedSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }
        async fn fetch(&self, _request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
            self.calls.lock().unwrap().push(Instant::now());
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn sources_are_spaced_by_the_inter_source_delay() {
        let delay = Duration::from_millis(300);
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = SourceRegistry::new();
        for kind in [SourceKind::OpenAlex, SourceKind::CrossRef, SourceKind::Arxiv] {
            registry.register(Arc::new(StampedSource { kind, calls: calls.clone() }));
        }
        let pacing = PacingConfig { inter_source_delay: delay, ..PacingConfig::none() };
        let agg = Aggregator::new(
            registry,
            Arc::new(MemoryRepository::new()),
            PipelineConfig { pacing, ..Default::default() },
        );

        let start = Instant::now();
        agg.search(request(&["OpenAlex", "CrossRef", "arXiv"])).await.unwrap();
        let finished = start.elapsed();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls[0] - start < delay, "first source waited {:?}", calls[0] - start);
        assert!(calls[1] - calls[0] >= delay);
        assert!(calls[2] - calls[1] >= delay);
        // Two gaps, nothing after the last source.
        assert!(finished < delay * 3, "search took {finished:?}");
    }
}
