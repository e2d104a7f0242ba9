//! OpenAlex works API client.
//!
//! Endpoint: https://api.openalex.org/works

use async_trait::async_trait;
use litharvest_common::{PoliteClient, Result};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{str_field, trim_base_url, LiteratureSource, RecordDraft};
use crate::chunker::ChunkerConfig;
use crate::models::{CanonicalRecord, SearchRequest, SourceKind};

const OPENALEX_BASE_URL: &str = "https://api.openalex.org";
const MAX_PER_PAGE: usize = 200;

pub struct OpenAlexClient {
    client: PoliteClient,
    base_url: String,
    chunker: ChunkerConfig,
}

impl OpenAlexClient {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            base_url: OPENALEX_BASE_URL.to_string(),
            chunker: ChunkerConfig::default(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base_url(url);
        self
    }
}

/// OpenAlex ships abstracts as `{word: [positions]}`; put the words back in order.
fn rebuild_abstract(index: &Value) -> String {
    let Some(map) = index.as_object() else {
        return String::new();
    };
    let mut positioned: Vec<(u64, &str)> = map
        .iter()
        .flat_map(|(word, positions)| {
            positions
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|p| p.as_u64())
                .map(move |p| (p, word.as_str()))
        })
        .collect();
    positioned.sort_by_key(|(p, _)| *p);
    positioned.into_iter().map(|(_, w)| w).collect::<Vec<_>>().join(" ")
}

fn parse_work(item: &Value) -> RecordDraft {
    let doi_url = str_field(item, "doi");
    let abstract_text = str_field(item, "abstract")
        .unwrap_or_else(|| rebuild_abstract(&item["abstract_inverted_index"]));

    RecordDraft {
        title: str_field(item, "title")
            .or_else(|| str_field(item, "display_name"))
            .unwrap_or_default(),
        abstract_text,
        authors: item["authorships"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|a| a["author"]["display_name"].as_str())
            .map(String::from)
            .collect(),
        date: str_field(item, "publication_date"),
        doi: doi_url
            .as_deref()
            .map(|d| d.trim_start_matches("https://doi.org/").to_string()),
        url: doi_url.or_else(|| str_field(item, "id")).unwrap_or_default(),
        language: str_field(item, "language"),
        files: Vec::new(),
    }
}

#[async_trait]
impl LiteratureSource for OpenAlexClient {
    fn kind(&self) -> SourceKind {
        SourceKind::OpenAlex
    }

    #[instrument(skip(self, request), fields(keywords = %request.keywords))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
        let mut params = vec![
            ("search", request.keywords.clone()),
            ("per-page", request.capped_max_results(MAX_PER_PAGE).to_string()),
            ("sort", "publication_date:desc".to_string()),
        ];
        let mut filters = Vec::new();
        if let Some(from) = request.date_from {
            filters.push(format!("from_publication_date:{from}"));
        }
        if let Some(to) = request.date_to {
            filters.push(format!("to_publication_date:{to}"));
        }
        if !filters.is_empty() {
            params.push(("filter", filters.join(",")));
        }

        let url = format!("{}/works", self.base_url);
        let resp = self.client.get_json(self.kind().as_str(), &url, &params).await?;

        let results = resp["results"].as_array().cloned().unwrap_or_default();
        debug!(count = results.len(), "OpenAlex search returned results");

        Ok(results
            .iter()
            .map(parse_work)
            .filter_map(|draft| draft.finalize(self.kind(), request, &self.chunker))
            .collect())
    }
}
