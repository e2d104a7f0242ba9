//! Semantic Scholar Graph API client.
//!
//! Endpoint: https://api.semanticscholar.org/graph/v1/paper/search
//! The native filter only understands year ranges; exact bounds are applied
//! locally.

use async_trait::async_trait;
use chrono::Datelike;
use litharvest_common::{PoliteClient, Result};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{str_field, trim_base_url, LiteratureSource, RecordDraft};
use crate::chunker::ChunkerConfig;
use crate::models::{AttachmentFile, CanonicalRecord, SearchRequest, SourceKind};

const S2_BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const MAX_LIMIT: usize = 100;
const FIELDS: &str = "paperId,title,abstract,authors,year,publicationDate,url,openAccessPdf";

pub struct SemanticScholarClient {
    client: PoliteClient,
    base_url: String,
    chunker: ChunkerConfig,
}

impl SemanticScholarClient {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            base_url: S2_BASE_URL.to_string(),
            chunker: ChunkerConfig::default(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base_url(url);
        self
    }
}

/// `year=` parameter: `from-to`, `from-` or `-to`.
fn year_range(request: &SearchRequest) -> Option<String> {
    let year = |d: Option<chrono::NaiveDate>| d.map(|d| d.year().to_string()).unwrap_or_default();
    match (request.date_from, request.date_to) {
        (None, None) => None,
        (from, to) => Some(format!("{}-{}", year(from), year(to))),
    }
}

fn parse_paper(item: &Value) -> RecordDraft {
    let url = str_field(item, "url")
        .or_else(|| str_field(item, "paperId").map(|id| format!("https://www.semanticscholar.org/paper/{id}")))
        .unwrap_or_default();

    RecordDraft {
        title: str_field(item, "title").unwrap_or_default(),
        abstract_text: str_field(item, "abstract").unwrap_or_default(),
        authors: item["authors"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|a| str_field(a, "name"))
            .collect(),
        date: str_field(item, "publicationDate")
            .or_else(|| item["year"].as_i64().map(|y| format!("{y}-01-01"))),
        doi: str_field(&item["externalIds"], "DOI"),
        url,
        language: None,
        files: str_field(&item["openAccessPdf"], "url")
            .map(AttachmentFile::pdf)
            .into_iter()
            .collect(),
    }
}

#[async_trait]
impl LiteratureSource for SemanticScholarClient {
    fn kind(&self) -> SourceKind {
        SourceKind::SemanticScholar
    }

    #[instrument(skip(self, request), fields(keywords = %request.keywords))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
        let mut params = vec![
            ("query", request.keywords.clone()),
            ("limit", request.capped_max_results(MAX_LIMIT).to_string()),
            ("fields", FIELDS.to_string()),
        ];
        if let Some(years) = year_range(request) {
            params.push(("year", years));
        }

        let url = format!("{}/paper/search", self.base_url);
        let resp = self.client.get_json(self.kind().as_str(), &url, &params).await?;

        let papers = resp["data"].as_array().cloned().unwrap_or_default();
        debug!(count = papers.len(), "Semantic Scholar search returned papers");

        Ok(papers
            .iter()
            .map(parse_paper)
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
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn year_range_is_open_ended() {
        let mut req = SearchRequest::new("x");
        assert_eq!(year_range(&req), None);
        req.date_from = NaiveDate::from_ymd_opt(2021, 6, 1);
        assert_eq!(year_range(&req), Some("2021-".into()));
        req.date_to = NaiveDate::from_ymd_opt(2022, 1, 1);
        assert_eq!(year_range(&req), Some("2021-2022".into()));
        req.date_from = None;
        assert_eq!(year_range(&req), Some("-2022".into()));
    }

    #[test]
    fn future_lower_bound_stays_open_above() {
        let mut req = SearchRequest::new("x");
        req.date_from = NaiveDate::from_ymd_opt(2030, 1, 1);
        assert_eq!(year_range(&req), Some("2030-".into()));
    }

    #[tokio::test]
    async fn falls_back_to_year_and_paper_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .and(query_param("year", "2022-2022"))
            .and(query_param("fields", FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 2,
                "data": [
                    {
                        "paperId": "abc",
                        "title": "Year only",
                        "year": 2022,
                        "authors": [{"name": "R. Year"}],
                        "openAccessPdf": {"url": "https://oa.example/abc.pdf"}
                    },
                    {
                        "paperId": "def",
                        "title": "Published after the upper bound",
                        "publicationDate": "2022-12-31",
                        "url": "https://www.semanticscholar.org/paper/def"
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = SemanticScholarClient::new(PoliteClient::new(&HttpSettings::default()).unwrap())
            .with_base_url(&server.uri());
        let mut req = SearchRequest::new("anything");
        req.date_from = NaiveDate::from_ymd_opt(2022, 1, 1);
        req.date_to = NaiveDate::from_ymd_opt(2022, 6, 30);

        let records = client.fetch(&req).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://www.semanticscholar.org/paper/abc");
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
        assert_eq!(records[0].files.as_ref().unwrap()[0].url, "https://oa.example/abc.pdf");
    }
}
