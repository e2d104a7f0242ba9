//! CrossRef REST API client.
//!
//! Endpoint: https://api.crossref.org/works
//! CrossRef abstracts arrive as JATS XML fragments; tags are stripped during
//! normalisation.

use async_trait::async_trait;
use litharvest_common::{PoliteClient, Result};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{first_of, str_field, trim_base_url, LiteratureSource, RecordDraft};
use crate::chunker::ChunkerConfig;
use crate::models::{CanonicalRecord, SearchRequest, SourceKind};

const CROSSREF_BASE_URL: &str = "https://api.crossref.org";
const MAX_ROWS: usize = 1000;

pub struct CrossRefClient {
    client: PoliteClient,
    base_url: String,
    chunker: ChunkerConfig,
}

impl CrossRefClient {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            base_url: CROSSREF_BASE_URL.to_string(),
            chunker: ChunkerConfig::default(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base_url(url);
        self
    }
}

/// `[[2024, 3, 5]]`, `[[2024, 3]]` or `[[2024]]` to `YYYY-MM-DD`.
fn date_from_parts(parts: &Value) -> Option<String> {
    let first = parts["date-parts"].get(0)?.as_array()?;
    let year = first.first()?.as_i64()?;
    let month = first.get(1).and_then(Value::as_i64).unwrap_or(1);
    let day = first.get(2).and_then(Value::as_i64).unwrap_or(1);
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

fn parse_item(item: &Value) -> RecordDraft {
    let doi = str_field(item, "DOI");
    let url = str_field(item, "URL")
        .or_else(|| doi.as_ref().map(|d| format!("https://doi.org/{d}")))
        .unwrap_or_default();

    let date = ["published", "published-print", "published-online", "issued"]
        .iter()
        .find_map(|key| date_from_parts(&item[*key]));

    RecordDraft {
        title: first_of(&item["title"]).unwrap_or_default(),
        abstract_text: str_field(item, "abstract").unwrap_or_default(),
        authors: item["author"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|a| {
                format!(
                    "{} {}",
                    a["given"].as_str().unwrap_or(""),
                    a["family"].as_str().unwrap_or("")
                )
                .trim()
                .to_string()
            })
            .filter(|name| !name.is_empty())
            .collect(),
        date,
        doi,
        url,
        language: str_field(item, "language"),
        files: Vec::new(),
    }
}

#[async_trait]
impl LiteratureSource for CrossRefClient {
    fn kind(&self) -> SourceKind {
        SourceKind::CrossRef
    }

    #[instrument(skip(self, request), fields(keywords = %request.keywords))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
        let mut params = vec![
            ("query", request.keywords.clone()),
            ("rows", request.capped_max_results(MAX_ROWS).to_string()),
        ];
        let mut filters = Vec::new();
        if let Some(from) = request.date_from {
            filters.push(format!("from-pub-date:{from}"));
        }
        if let Some(to) = request.date_to {
            filters.push(format!("until-pub-date:{to}"));
        }
        if !filters.is_empty() {
            params.push(("filter", filters.join(",")));
        }

        let url = format!("{}/works", self.base_url);
        let resp = self.client.get_json(self.kind().as_str(), &url, &params).await?;

        let items = resp["message"]["items"].as_array().cloned().unwrap_or_default();
        debug!(count = items.len(), "CrossRef search returned items");

        Ok(items
            .iter()
            .map(parse_item)
            .filter_map(|draft| draft.finalize(self.kind(), request, &self.chunker))
            .collect())
    }
}
