//! BASE (Bielefeld Academic Search Engine) HTTP search interface client.
//!
//! BASE returns Dublin Core fields that may be either lists or scalars.

use async_trait::async_trait;
use litharvest_common::{PoliteClient, Result};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{first_of, list_or_scalar, trim_base_url, LiteratureSource, RecordDraft};
use crate::chunker::ChunkerConfig;
use crate::models::{CanonicalRecord, SearchRequest, SourceKind};

const BASE_SEARCH_URL: &str = "https://api.base-search.net/cgi-bin/BaseHttpSearchInterface.fcgi";
const MAX_HITS: usize = 50;

pub struct BaseClient {
    client: PoliteClient,
    base_url: String,
    chunker: ChunkerConfig,
}

impl BaseClient {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            base_url: BASE_SEARCH_URL.to_string(),
            chunker: ChunkerConfig::default(),
        }
    }

    /// Full URL of the search interface (not just a host).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base_url(url);
        self
    }
}

fn parse_doc(doc: &Value) -> Option<RecordDraft> {
    let title = first_of(&doc["dctitle"])?;
    Some(RecordDraft {
        title,
        abstract_text: first_of(&doc["dcabstract"])
            .or_else(|| first_of(&doc["dcdescription"]))
            .unwrap_or_default(),
        authors: list_or_scalar(&doc["dccreator"]),
        date: first_of(&doc["dcdate"]).or_else(|| first_of(&doc["dcyear"])),
        doi: first_of(&doc["dcdoi"]),
        url: first_of(&doc["dclink"])
            .or_else(|| first_of(&doc["dcidentifier"]))
            .unwrap_or_default(),
        language: first_of(&doc["dclang"]),
        files: Vec::new(),
    })
}

#[async_trait]
impl LiteratureSource for BaseClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Base
    }

    #[instrument(skip(self, request), fields(keywords = %request.keywords))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
        let params = [
            ("func", "PerformSearch".to_string()),
            ("query", request.keywords.clone()),
            ("hits", request.capped_max_results(MAX_HITS).to_string()),
            ("format", "json".to_string()),
        ];
        let resp = self
            .client
            .get_json(self.kind().as_str(), &self.base_url, &params)
            .await?;

        let docs = resp["response"]["docs"].as_array().cloned().unwrap_or_default();
        debug!(count = docs.len(), "BASE search returned docs");

        Ok(docs
            .iter()
            .filter_map(parse_doc)
            .filter_map(|draft| draft.finalize(self.kind(), request, &self.chunker))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use litharvest_common::HttpSettings;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn accepts_list_and_scalar_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("func", "PerformSearch"))
            .and(query_param("hits", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"docs": [
                    {
                        "dctitle": ["Listed title"],
                        "dcdescription": ["Described"],
                        "dccreator": ["One", "Two"],
                        "dcdate": ["2024-01-20"],
                        "dclink": ["https://repo.example/1"],
                        "dclang": ["ger"]
                    },
                    {
                        "dctitle": "Scalar title",
                        "dcabstract": "Abstracted",
                        "dccreator": "Solo",
                        "dcyear": "2023",
                        "dcidentifier": "https://repo.example/2",
                        "dcdoi": "10.9/base"
                    },
                    {"dcabstract": "untitled docs are skipped", "dclink": "https://repo.example/3"}
                ]}
            })))
            .mount(&server)
            .await;

        let client = BaseClient::new(PoliteClient::new(&HttpSettings::default()).unwrap())
            .with_base_url(&server.uri());
        let mut req = SearchRequest::new("anything");
        req.max_results = Some(80);
        let records = client.fetch(&req).await.unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].authors, vec!["One", "Two"]);
        assert_eq!(records[0].abstract_text, "Described");
        assert_eq!(records[0].language, "ger");

        assert_eq!(records[1].title, "Scalar title");
        assert_eq!(records[1].authors, vec!["Solo"]);
        assert_eq!(records[1].url, "https://repo.example/2");
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(records[1].doi.as_deref(), Some("10.9/base"));
    }
}
