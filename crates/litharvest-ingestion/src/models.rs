//! Data models for the aggregation pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use litharvest_common::{LitharvestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Per-source result cap used when a request does not name one.
pub const DEFAULT_MAX_RESULTS: usize = 20;

/// Origin adapter of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    OpenAlex,
    CrossRef,
    #[serde(rename = "DOAJ")]
    Doaj,
    #[serde(rename = "EuropePMC")]
    EuropePmc,
    #[serde(rename = "BASE")]
    Base,
    #[serde(rename = "arXiv")]
    Arxiv,
    PubMed,
    #[serde(rename = "CORE")]
    Core,
    SemanticScholar,
    #[serde(rename = "CustomURL")]
    CustomUrl,
}

impl SourceKind {
    pub const ALL: [SourceKind; 10] = [
        SourceKind::OpenAlex,
        SourceKind::CrossRef,
        SourceKind::Doaj,
        SourceKind::EuropePmc,
        SourceKind::Base,
        SourceKind::Arxiv,
        SourceKind::PubMed,
        SourceKind::Core,
        SourceKind::SemanticScholar,
        SourceKind::CustomUrl,
    ];

    /// Sources searched when a request leaves `sources` empty, in priority order.
    pub const DEFAULT_SET: [SourceKind; 5] = [
        SourceKind::OpenAlex,
        SourceKind::CrossRef,
        SourceKind::Doaj,
        SourceKind::EuropePmc,
        SourceKind::Base,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::OpenAlex        => "OpenAlex",
            SourceKind::CrossRef        => "CrossRef",
            SourceKind::Doaj            => "DOAJ",
            SourceKind::EuropePmc       => "EuropePMC",
            SourceKind::Base            => "BASE",
            SourceKind::Arxiv           => "arXiv",
            SourceKind::PubMed          => "PubMed",
            SourceKind::Core            => "CORE",
            SourceKind::SemanticScholar => "SemanticScholar",
            SourceKind::CustomUrl       => "CustomURL",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = LitharvestError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        SourceKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| LitharvestError::InvalidRequest(format!("unknown source: {wanted}")))
    }
}

/// Kind of an attachment linked from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    #[serde(rename = "PDF")]
    Pdf,
    #[serde(rename = "HTML")]
    Html,
    #[serde(rename = "TEXT")]
    Text,
    Abstract,
    Preprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentFile {
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub url: String,
}

impl AttachmentFile {
    pub fn pdf(url: impl Into<String>) -> Self {
        Self { kind: FileKind::Pdf, url: url.into() }
    }
}

/// The single normalised shape every provider's output is converted into.
///
/// Records are immutable once produced; identity is carried by `url` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: Uuid,
    pub title: String,
    pub authors: Vec<String>,
    /// Always present; serialised as `YYYY-MM-DD`.
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    pub url: String,
    pub language: String,
    pub source: SourceKind,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub full_text_chunks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<AttachmentFile>>,
    pub created_at: DateTime<Utc>,
}

/// Parameters of one aggregation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub keywords: String,
    /// Inclusive lower bound.
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound.
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    /// Accepted language prefixes; empty accepts every language.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Adapter names to invoke; empty selects the default set.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub custom_urls: Vec<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl SearchRequest {
    pub fn new(keywords: impl Into<String>) -> Self {
        Self { keywords: keywords.into(), ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.keywords.trim().is_empty() {
            return Err(LitharvestError::InvalidRequest("keywords must not be empty".into()));
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(LitharvestError::InvalidRequest(format!(
                    "date_from {from} is after date_to {to}"
                )));
            }
        }
        Ok(())
    }

    /// Requested per-source cap, clamped to a provider's documented ceiling.
    pub fn capped_max_results(&self, ceiling: usize) -> usize {
        self.max_results.unwrap_or(DEFAULT_MAX_RESULTS).clamp(1, ceiling)
    }

    /// Inclusive `[date_from, date_to]` check; absent bounds are open.
    pub fn accepts_date(&self, date: NaiveDate) -> bool {
        self.date_from.map_or(true, |from| date >= from) && self.date_to.map_or(true, |to| date <= to)
    }

    /// Case-insensitive prefix match against the accepted languages.
    pub fn accepts_language(&self, language: &str) -> bool {
        if self.languages.is_empty() {
            return true;
        }
        let language = language.to_lowercase();
        self.languages
            .iter()
            .any(|accepted| language.starts_with(&accepted.trim().to_lowercase()))
    }
}

/// Outcome of one adapter invocation. Adapters never fail past this value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResponse {
    pub success: bool,
    pub records: Vec<CanonicalRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub source: SourceKind,
}

impl SourceResponse {
    pub fn ok(source: SourceKind, records: Vec<CanonicalRecord>) -> Self {
        Self { success: true, records, error: None, source }
    }

    pub fn failed(source: SourceKind, error: impl Into<String>) -> Self {
        Self { success: false, records: Vec::new(), error: Some(error.into()), source }
    }
}

/// Deduplicated union of records produced by one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub records: Vec<CanonicalRecord>,
    pub total: usize,
    pub query: SearchRequest,
    pub timestamp: DateTime<Utc>,
    /// `"<source>: <message>"` for every adapter that failed.
    #[serde(default)]
    pub errors: Vec<String>,
}
