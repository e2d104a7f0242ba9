//! Literature source adapters.
//!
//! Each adapter maps one upstream provider's payload into [`CanonicalRecord`]s
//! and satisfies [`LiteratureSource`]. Adapters are selected at runtime by
//! name through the [`registry::SourceRegistry`].

pub mod arxiv;
pub mod base;
pub mod core_ac;
pub mod crossref;
pub mod doaj;
pub mod europepmc;
pub mod openalex;
pub mod pubmed;
pub mod registry;
pub mod semantic_scholar;
pub mod url_fetch;

use async_trait::async_trait;
use chrono::Utc;
use litharvest_common::Result;
use serde_json::Value;
use tracing::{debug, warn};

use crate::chunker::{chunk_record_text, ChunkerConfig};
use crate::models::{AttachmentFile, CanonicalRecord, SearchRequest, SourceKind, SourceResponse};
use crate::text::{clean_abstract, clean_text, date_or_today, generate_id, resolve_language};

pub use registry::SourceRegistry;

/// Common interface for all literature source adapters.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Query the upstream provider and normalise its payload.
    ///
    /// Records outside the request's date range are already dropped.
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>>;

    /// Run [`fetch`](Self::fetch) and capture any failure in the response.
    async fn search(&self, request: &SearchRequest) -> SourceResponse {
        let source = self.kind();
        match self.fetch(request).await {
            Ok(records) => {
                debug!(%source, count = records.len(), "source returned records");
                SourceResponse::ok(source, records)
            }
            Err(e) => {
                warn!(%source, error = %e, "source search failed");
                SourceResponse::failed(source, e.to_string())
            }
        }
    }
}

/// Raw, provider-extracted fields of one record before normalisation.
#[derive(Debug, Default, Clone)]
pub struct RecordDraft {
    pub title: String,
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub date: Option<String>,
    pub doi: Option<String>,
    pub url: String,
    /// Provider-declared language, if any.
    pub language: Option<String>,
    pub files: Vec<AttachmentFile>,
}

impl RecordDraft {
    /// Normalise into a [`CanonicalRecord`].
    ///
    /// Returns `None` when the record has no locator or its date falls
    /// outside the request's range.
    pub fn finalize(
        self,
        source: SourceKind,
        request: &SearchRequest,
        chunker: &ChunkerConfig,
    ) -> Option<CanonicalRecord> {
        let url = self.url.trim().to_string();
        if url.is_empty() {
            debug!(%source, title = %self.title, "dropping record without url");
            return None;
        }

        let date = date_or_today(self.date.as_deref());
        if !request.accepts_date(date) {
            debug!(%source, %date, %url, "record outside date range");
            return None;
        }

        let mut title = clean_text(&self.title);
        if title.is_empty() {
            title = "Untitled".to_string();
        }
        let full_abstract = clean_text(&self.abstract_text);
        let language = resolve_language(self.language.as_deref(), &title);
        let full_text_chunks = chunk_record_text(chunker, &title, &full_abstract);

        let authors = self
            .authors
            .iter()
            .map(|a| clean_text(a))
            .filter(|a| !a.is_empty())
            .collect();
        let doi = self.doi.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());

        Some(CanonicalRecord {
            id: generate_id(),
            title,
            authors,
            date,
            doi,
            url,
            language,
            source,
            abstract_text: clean_abstract(&full_abstract),
            full_text_chunks,
            files: if self.files.is_empty() { None } else { Some(self.files) },
            created_at: Utc::now(),
        })
    }
}

/// Non-empty string field.
pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    value[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Providers disagree on whether a field is a list or a scalar; accept both.
pub(crate) fn list_or_scalar(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// First element of a list-or-scalar field.
pub(crate) fn first_of(value: &Value) -> Option<String> {
    list_or_scalar(value).into_iter().next()
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
