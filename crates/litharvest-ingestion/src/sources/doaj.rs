//! DOAJ (Directory of Open Access Journals) article search client.
//!
//! Endpoint: https://doaj.org/api/v3/search/articles/{query}
//! The query is a path segment, and the API has no date-range parameter.

use async_trait::async_trait;
use litharvest_common::{LitharvestError, PoliteClient, Result};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{str_field, trim_base_url, LiteratureSource, RecordDraft};
use crate::chunker::ChunkerConfig;
use crate::models::{AttachmentFile, CanonicalRecord, SearchRequest, SourceKind};

const DOAJ_BASE_URL: &str = "https://doaj.org/api/v3";
const MAX_PAGE_SIZE: usize = 100;

pub struct DoajClient {
    client: PoliteClient,
    base_url: String,
    chunker: ChunkerConfig,
}

impl DoajClient {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            base_url: DOAJ_BASE_URL.to_string(),
            chunker: ChunkerConfig::default(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base_url(url);
        self
    }

    fn search_url(&self, keywords: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| LitharvestError::InvalidRequest(format!("cannot-be-a-base URL {}", self.base_url)))?
            .extend(["search", "articles", keywords]);
        Ok(url)
    }
}

fn parse_article(item: &Value) -> RecordDraft {
    let bib = &item["bibjson"];
    let fulltext_links: Vec<String> = bib["link"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|l| l["type"].as_str() == Some("fulltext"))
        .filter_map(|l| str_field(l, "url"))
        .collect();

    let url = fulltext_links
        .first()
        .cloned()
        .or_else(|| str_field(&item["admin"], "url"))
        .or_else(|| str_field(item, "id").map(|id| format!("https://doaj.org/article/{id}")))
        .unwrap_or_default();

    RecordDraft {
        title: str_field(bib, "title").unwrap_or_default(),
        abstract_text: str_field(bib, "abstract").unwrap_or_default(),
        authors: bib["author"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|a| str_field(a, "name"))
            .collect(),
        date: str_field(bib, "published_date").or_else(|| {
            str_field(bib, "year").map(|year| match str_field(bib, "month") {
                Some(month) => format!("{year}-{month:0>2}"),
                None => year,
            })
        }),
        doi: bib["identifier"]
            .as_array()
            .into_iter()
            .flatten()
            .find(|i| i["type"].as_str().is_some_and(|t| t.eq_ignore_ascii_case("doi")))
            .and_then(|i| str_field(i, "id")),
        url,
        language: bib["journal"]["language"]
            .get(0)
            .or_else(|| bib["language"].get(0))
            .and_then(Value::as_str)
            .map(String::from),
        files: fulltext_links.into_iter().map(AttachmentFile::pdf).collect(),
    }
}

#[async_trait]
impl LiteratureSource for DoajClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Doaj
    }

    #[instrument(skip(self, request), fields(keywords = %request.keywords))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
        let url = self.search_url(&request.keywords)?;
        let params = [
            ("pageSize", request.capped_max_results(MAX_PAGE_SIZE).to_string()),
            ("sort", "created_date:desc".to_string()),
        ];
        let resp = self.client.get_json(self.kind().as_str(), url.as_str(), &params).await?;

        let results = resp["results"].as_array().cloned().unwrap_or_default();
        debug!(count = results.len(), "DOAJ search returned results");

        Ok(results
            .iter()
            .map(parse_article)
            .filter_map(|draft| draft.finalize(self.kind(), request, &self.chunker))
            .collect())
    }
}
