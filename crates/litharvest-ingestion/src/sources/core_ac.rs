//! CORE v3 search API client.
//!
//! Endpoint: https://api.core.ac.uk/v3/search/works
//! CORE wants an API key for reliable access. Without one it answers 401,
//! 403 or 429, which is treated as an empty result rather than a failure.

use async_trait::async_trait;
use litharvest_common::{LitharvestError, PoliteClient, Result};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{str_field, trim_base_url, LiteratureSource, RecordDraft};
use crate::chunker::ChunkerConfig;
use crate::models::{AttachmentFile, CanonicalRecord, SearchRequest, SourceKind};

const CORE_BASE_URL: &str = "https://api.core.ac.uk/v3";
const MAX_LIMIT: usize = 100;

pub struct CoreClient {
    client: PoliteClient,
    base_url: String,
    chunker: ChunkerConfig,
}

impl CoreClient {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            base_url: CORE_BASE_URL.to_string(),
            chunker: ChunkerConfig::default(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base_url(url);
        self
    }
}

fn parse_work(item: &Value) -> RecordDraft {
    let url = str_field(item, "sourceUrl")
        .or_else(|| str_field(item, "repositoryUrl"))
        .or_else(|| {
            // ids are numeric in v3
            let id = item["id"].as_i64().map(|n| n.to_string()).or_else(|| str_field(item, "id"))?;
            Some(format!("https://core.ac.uk/works/{id}"))
        })
        .unwrap_or_default();

    RecordDraft {
        title: str_field(item, "title").unwrap_or_default(),
        abstract_text: str_field(item, "abstract").unwrap_or_default(),
        authors: item["authors"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|a| match a {
                Value::String(name) => Some(name.clone()),
                other => str_field(other, "name"),
            })
            .collect(),
        date: str_field(item, "datePublished").or_else(|| {
            item["yearPublished"].as_i64().map(|y| y.to_string())
        }),
        doi: str_field(item, "doi"),
        url,
        language: str_field(&item["language"], "code"),
        files: str_field(item, "downloadUrl")
            .map(AttachmentFile::pdf)
            .into_iter()
            .collect(),
    }
}

#[async_trait]
impl LiteratureSource for CoreClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Core
    }

    #[instrument(skip(self, request), fields(keywords = %request.keywords))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
        let params = [
            ("q", request.keywords.clone()),
            ("limit", request.capped_max_results(MAX_LIMIT).to_string()),
        ];
        let url = format!("{}/search/works", self.base_url);

        let resp = match self.client.get_json(self.kind().as_str(), &url, &params).await {
            Err(LitharvestError::Status { status: status @ (401 | 403 | 429), .. }) => {
                warn!(status, "CORE refused unauthenticated access; returning no records");
                return Ok(Vec::new());
            }
            other => other?,
        };

        let results = resp["results"].as_array().cloned().unwrap_or_default();
        debug!(count = results.len(), "CORE search returned results");

        Ok(results
            .iter()
            .map(parse_work)
            .filter_map(|draft| draft.finalize(self.kind(), request, &self.chunker))
            .collect())
    }
}
