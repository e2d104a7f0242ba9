//! Europe PMC REST API client.
//!
//! Endpoint: https://www.ebi.ac.uk/europepmc/webservices/rest/search
//! Results without an abstract are skipped: an empty abstract leaves nothing
//! to chunk beyond the title.

use async_trait::async_trait;
use litharvest_common::{PoliteClient, Result};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{str_field, trim_base_url, LiteratureSource, RecordDraft};
use crate::chunker::ChunkerConfig;
use crate::models::{AttachmentFile, CanonicalRecord, SearchRequest, SourceKind};

const EPMC_BASE_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";
const MAX_PAGE_SIZE: usize = 100;

pub struct EuropePmcClient {
    client: PoliteClient,
    base_url: String,
    chunker: ChunkerConfig,
}

impl EuropePmcClient {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            base_url: EPMC_BASE_URL.to_string(),
            chunker: ChunkerConfig::default(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base_url(url);
        self
    }
}

fn parse_result(r: &Value) -> Option<RecordDraft> {
    let title = str_field(r, "title")?;
    let abstract_text = str_field(r, "abstractText")?;
    let doi = str_field(r, "doi");

    let url = match &doi {
        Some(doi) => format!("https://doi.org/{doi}"),
        None => format!(
            "https://europepmc.org/article/{}/{}",
            str_field(r, "source").unwrap_or_else(|| "MED".to_string()),
            str_field(r, "id")?
        ),
    };

    let files = r["fullTextUrlList"]["fullTextUrl"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|u| u["documentStyle"].as_str() == Some("pdf"))
        .filter_map(|u| str_field(u, "url"))
        .map(AttachmentFile::pdf)
        .collect();

    Some(RecordDraft {
        title,
        abstract_text,
        authors: r["authorString"]
            .as_str()
            .map(|s| s.trim_end_matches('.').split(", ").map(String::from).collect())
            .unwrap_or_default(),
        date: str_field(r, "firstPublicationDate").or_else(|| str_field(r, "pubYear")),
        doi,
        url,
        language: None,
        files,
    })
}

#[async_trait]
impl LiteratureSource for EuropePmcClient {
    fn kind(&self) -> SourceKind {
        SourceKind::EuropePmc
    }

    #[instrument(skip(self, request), fields(keywords = %request.keywords))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
        let params = [
            ("query", request.keywords.clone()),
            ("format", "json".to_string()),
            ("resultType", "core".to_string()),
            ("pageSize", request.capped_max_results(MAX_PAGE_SIZE).to_string()),
            ("sort", "CITED desc".to_string()),
        ];

        let url = format!("{}/search", self.base_url);
        let resp = self.client.get_json(self.kind().as_str(), &url, &params).await?;

        let results = resp["resultList"]["result"].as_array().cloned().unwrap_or_default();
        debug!(count = results.len(), "Europe PMC search returned results");

        Ok(results
            .iter()
            .filter_map(parse_result)
            .filter_map(|draft| draft.finalize(self.kind(), request, &self.chunker))
            .collect())
    }
}
