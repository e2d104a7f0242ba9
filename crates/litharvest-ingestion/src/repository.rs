//! Storage port for the aggregation pipeline.
//!
//! The engine only talks to [`RecordStore`]; `MemoryRepository` backs tests
//! and embedding callers, `JsonFileRepository` (see `file_repository`) backs
//! the binary. Both share the merge, history and statistics rules below.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use litharvest_common::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dedup::{DedupResult, UrlDeduplicator};
use crate::models::{CanonicalRecord, SearchResult, SourceKind};

/// Most recent search results kept in history.
pub const HISTORY_CAPACITY: usize = 50;

/// Aggregate counts over the stored record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_language: BTreeMap<String, usize>,
    pub by_year: BTreeMap<String, usize>,
}

impl Statistics {
    pub fn from_records(records: &[CanonicalRecord]) -> Self {
        let mut stats = Statistics { total: records.len(), ..Default::default() };
        for r in records {
            *stats.by_source.entry(r.source.to_string()).or_default() += 1;
            *stats.by_language.entry(r.language.clone()).or_default() += 1;
            *stats.by_year.entry(format!("{:04}", r.date.year())).or_default() += 1;
        }
        stats
    }
}

/// Optional narrowing for [`RecordStore::search_records`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilters {
    pub source: Option<SourceKind>,
    /// Exact language code.
    pub language: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl RecordFilters {
    fn matches(&self, record: &CanonicalRecord) -> bool {
        self.source.map_or(true, |s| record.source == s)
            && self.language.as_deref().map_or(true, |l| record.language == l)
            && self.date_from.map_or(true, |from| record.date >= from)
            && self.date_to.map_or(true, |to| record.date <= to)
    }
}

/// Case-insensitive substring match over title, abstract and authors.
fn matches_query(record: &CanonicalRecord, lower_query: &str) -> bool {
    lower_query.is_empty()
        || record.title.to_lowercase().contains(lower_query)
        || record.abstract_text.to_lowercase().contains(lower_query)
        || record.authors.iter().any(|a| a.to_lowercase().contains(lower_query))
}

/// Union keyed by `url`: existing records win, new ones are appended in
/// order. Returns how many were added.
pub fn merge_records(existing: &mut Vec<CanonicalRecord>, incoming: &[CanonicalRecord]) -> usize {
    let mut dedup = UrlDeduplicator::with_known(existing.iter().map(|r| r.url.as_str()));
    let before = existing.len();
    for record in incoming {
        if dedup.check(record) == DedupResult::New {
            existing.push(record.clone());
        }
    }
    existing.len() - before
}

/// Newest first, oldest evicted past [`HISTORY_CAPACITY`].
pub fn push_history(history: &mut Vec<SearchResult>, result: SearchResult) {
    history.insert(0, result);
    history.truncate(HISTORY_CAPACITY);
}

/// Persistence collaborator of the aggregation engine.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Idempotent merge by `url`. Returns the number of records added.
    async fn save_records(&self, records: &[CanonicalRecord]) -> Result<usize>;

    async fn load_all_records(&self) -> Result<Vec<CanonicalRecord>>;

    /// Removes every stored record. Search history is kept.
    async fn clear_all(&self) -> Result<()>;

    async fn get_record(&self, id: Uuid) -> Result<Option<CanonicalRecord>>;

    /// Returns whether a record was removed.
    async fn delete_record(&self, id: Uuid) -> Result<bool>;

    async fn append_search_history(&self, result: &SearchResult) -> Result<()>;

    /// Newest first.
    async fn search_history(&self) -> Result<Vec<SearchResult>>;

    async fn search_records(&self, query: &str, filters: &RecordFilters) -> Result<Vec<CanonicalRecord>> {
        let lower = query.trim().to_lowercase();
        Ok(self
            .load_all_records()
            .await?
            .into_iter()
            .filter(|r| matches_query(r, &lower) && filters.matches(r))
            .collect())
    }

    async fn statistics(&self) -> Result<Statistics> {
        Ok(Statistics::from_records(&self.load_all_records().await?))
    }
}

#[derive(Default)]
struct MemoryState {
    records: Vec<CanonicalRecord>,
    history: Vec<SearchResult>,
}

/// In-process store.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRepository {
    async fn save_records(&self, records: &[CanonicalRecord]) -> Result<usize> {
        let mut state = self.state.write().await;
        Ok(merge_records(&mut state.records, records))
    }

    async fn load_all_records(&self) -> Result<Vec<CanonicalRecord>> {
        Ok(self.state.read().await.records.clone())
    }

    async fn clear_all(&self) -> Result<()> {
        self.state.write().await.records.clear();
        Ok(())
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<CanonicalRecord>> {
        Ok(self.state.read().await.records.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_record(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.records.len();
        state.records.retain(|r| r.id != id);
        Ok(state.records.len() != before)
    }

    async fn append_search_history(&self, result: &SearchResult) -> Result<()> {
        push_history(&mut self.state.write().await.history, result.clone());
        Ok(())
    }

    async fn search_history(&self) -> Result<Vec<SearchResult>> {
        Ok(self.state.read().await.history.clone())
    }
}
