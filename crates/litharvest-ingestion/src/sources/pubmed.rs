//! PubMed E-utilities client.
//!
//! Two sequential round trips:
//!   esearch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi
//!   esummary: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi
//! separated by a fixed pacing delay, as NCBI asks of unauthenticated callers.

use std::time::Duration;

use async_trait::async_trait;
use litharvest_common::{PoliteClient, Result};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{str_field, trim_base_url, LiteratureSource, RecordDraft};
use crate::chunker::ChunkerConfig;
use crate::models::{AttachmentFile, CanonicalRecord, FileKind, SearchRequest, SourceKind};

const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const MAX_RETMAX: usize = 100;
const TOOL_NAME: &str = "litharvest";
const DEFAULT_EMAIL: &str = "research@example.com";

pub struct PubMedClient {
    client: PoliteClient,
    base_url: String,
    email: String,
    request_delay: Duration,
    chunker: ChunkerConfig,
}

impl PubMedClient {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            base_url: EUTILS_BASE_URL.to_string(),
            email: DEFAULT_EMAIL.to_string(),
            request_delay: Duration::from_millis(500),
            chunker: ChunkerConfig::default(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base_url(url);
        self
    }

    /// Delay between the esearch and esummary calls.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Contact address sent with every E-utilities call.
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("db", "pubmed".to_string()),
            ("retmode", "json".to_string()),
            ("tool", TOOL_NAME.to_string()),
            ("email", self.email.clone()),
        ]
    }

    /// Search PubMed and return a list of PMIDs.
    async fn esearch(&self, query: &str, max: usize) -> Result<Vec<String>> {
        let mut params = self.base_params();
        params.push(("term", query.to_string()));
        params.push(("retmax", max.to_string()));

        let url = format!("{}/esearch.fcgi", self.base_url);
        let resp = self.client.get_json(SourceKind::PubMed.as_str(), &url, &params).await?;

        Ok(resp["esearchresult"]["idlist"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str().map(String::from))
            .collect())
    }

    async fn esummary(&self, pmids: &[String]) -> Result<Value> {
        let mut params = self.base_params();
        params.push(("id", pmids.join(",")));

        let url = format!("{}/esummary.fcgi", self.base_url);
        self.client.get_json(SourceKind::PubMed.as_str(), &url, &params).await
    }
}

fn parse_summary(pmid: &str, article: &Value) -> Option<RecordDraft> {
    if article.is_null() || !article["error"].is_null() {
        return None;
    }
    let title = str_field(article, "title")?;
    // esummary carries no abstract; fall back to the journal/source line.
    let abstract_text = str_field(article, "abstracttext")
        .or_else(|| str_field(article, "source"))
        .or_else(|| str_field(article, "snippet"))?;

    let page = format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/");
    Some(RecordDraft {
        title,
        abstract_text,
        authors: article["authors"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|a| str_field(a, "name"))
            .collect(),
        date: str_field(article, "pubdate")
            .or_else(|| str_field(article, "epubdate"))
            .or_else(|| str_field(article, "sortpubdate")),
        doi: Some(format!("PMID:{pmid}")),
        url: page.clone(),
        language: article["lang"].get(0).and_then(Value::as_str).map(String::from),
        files: vec![AttachmentFile { kind: FileKind::Abstract, url: page }],
    })
}

#[async_trait]
impl LiteratureSource for PubMedClient {
    fn kind(&self) -> SourceKind {
        SourceKind::PubMed
    }

    #[instrument(skip(self, request), fields(keywords = %request.keywords))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
        let pmids = self
            .esearch(&request.keywords, request.capped_max_results(MAX_RETMAX))
            .await?;
        debug!(count = pmids.len(), "PubMed esearch returned PMIDs");
        if pmids.is_empty() {
            return Ok(Vec::new());
        }

        tokio::time::sleep(self.request_delay).await;
        let summary = self.esummary(&pmids).await?;
        let result = &summary["result"];

        // Upstream payload order follows the esearch ranking.
        Ok(pmids
            .iter()
            .filter_map(|pmid| parse_summary(pmid, &result[pmid.as_str()]))
            .filter_map(|draft| draft.finalize(self.kind(), request, &self.chunker))
            .collect())
    }
}
