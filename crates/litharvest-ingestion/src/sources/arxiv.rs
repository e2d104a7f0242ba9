//! arXiv export API client.
//!
//! Endpoint: https://export.arxiv.org/api/query
//! Responses are Atom feeds; each `<entry>` becomes one record with a PDF
//! attachment derived from its `/abs/` id.

use async_trait::async_trait;
use litharvest_common::{PoliteClient, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument};

use super::{trim_base_url, LiteratureSource, RecordDraft};
use crate::chunker::ChunkerConfig;
use crate::models::{AttachmentFile, CanonicalRecord, SearchRequest, SourceKind};

const ARXIV_QUERY_URL: &str = "https://export.arxiv.org/api/query";
const MAX_RESULTS: usize = 100;

pub struct ArxivClient {
    client: PoliteClient,
    base_url: String,
    chunker: ChunkerConfig,
}

impl ArxivClient {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            base_url: ARXIV_QUERY_URL.to_string(),
            chunker: ChunkerConfig::default(),
        }
    }

    /// Full URL of the query endpoint.
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = trim_base_url(url);
        self
    }
}

#[derive(Default)]
struct AtomEntry {
    id: String,
    title: String,
    summary: String,
    published: String,
    doi: String,
    authors: Vec<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    None,
    Id,
    Title,
    Summary,
    Published,
    Doi,
    AuthorName,
}

impl AtomEntry {
    fn slot(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Id        => Some(&mut self.id),
            Field::Title     => Some(&mut self.title),
            Field::Summary   => Some(&mut self.summary),
            Field::Published => Some(&mut self.published),
            Field::Doi       => Some(&mut self.doi),
            Field::AuthorName | Field::None => None,
        }
    }

    fn into_draft(self) -> Option<RecordDraft> {
        let id = self.id.trim().to_string();
        if id.is_empty() || self.title.trim().is_empty() {
            return None;
        }
        let pdf = format!("{}.pdf", id.replace("/abs/", "/pdf/"));
        Some(RecordDraft {
            title: self.title,
            abstract_text: self.summary,
            authors: self.authors,
            date: Some(self.published).filter(|p| !p.is_empty()),
            doi: Some(self.doi).filter(|d| !d.is_empty()),
            url: id,
            language: None,
            files: vec![AttachmentFile::pdf(pdf)],
        })
    }
}

/// Parse an arXiv Atom feed into record drafts, in feed order.
fn parse_atom(xml: &str) -> Result<Vec<RecordDraft>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut drafts = Vec::new();
    let mut current: Option<AtomEntry> = None;
    let mut field = Field::None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = e.name();
                field = match (name.as_ref(), current.is_some()) {
                    (b"entry", _) => {
                        current = Some(AtomEntry::default());
                        Field::None
                    }
                    (b"id", true)        => Field::Id,
                    (b"title", true)     => Field::Title,
                    (b"summary", true)   => Field::Summary,
                    (b"published", true) => Field::Published,
                    (b"arxiv:doi", true) => Field::Doi,
                    (b"name", true)      => Field::AuthorName,
                    _ => Field::None,
                };
            }
            Event::Text(ref e) => {
                if let Some(entry) = current.as_mut() {
                    let text = e.unescape()?;
                    if field == Field::AuthorName {
                        entry.authors.push(text.trim().to_string());
                    } else if let Some(target) = entry.slot(field) {
                        if !target.is_empty() {
                            target.push(' ');
                        }
                        target.push_str(&text);
                    }
                }
            }
            Event::End(ref e) => {
                if e.name().as_ref() == b"entry" {
                    if let Some(draft) = current.take().and_then(AtomEntry::into_draft) {
                        drafts.push(draft);
                    }
                }
                field = Field::None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(drafts)
}

#[async_trait]
impl LiteratureSource for ArxivClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Arxiv
    }

    #[instrument(skip(self, request), fields(keywords = %request.keywords))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
        let params = [
            ("search_query", format!("all:{}", request.keywords)),
            ("start", "0".to_string()),
            ("max_results", request.capped_max_results(MAX_RESULTS).to_string()),
            ("sortBy", "submittedDate".to_string()),
            ("sortOrder", "descending".to_string()),
        ];
        let xml = self
            .client
            .get_text(self.kind().as_str(), &self.base_url, &params)
            .await?;

        let drafts = parse_atom(&xml)?;
        debug!(count = drafts.len(), bytes = xml.len(), "arXiv feed parsed");

        Ok(drafts
            .into_iter()
            .filter_map(|draft| draft.finalize(self.kind(), request, &self.chunker))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use litharvest_common::{HttpSettings, LitharvestError};
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <id>http://arxiv.org/api/feedid</id>
  <title type="html">ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/2403.01234v1</id>
    <published>2024-03-02T17:00:00Z</published>
    <title>Graph Neural Networks
      for Weather</title>
    <summary>We forecast &amp; evaluate.</summary>
    <author><name>Ana Ruiz</name></author>
    <author><name>Bo Chen</name></author>
    <arxiv:doi>10.48550/arXiv.2403.01234</arxiv:doi>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2001.00001v2</id>
    <published>2020-01-01T00:00:00Z</published>
    <title>Older paper</title>
    <summary>Old.</summary>
  </entry>
  <entry>
    <published>2024-01-01T00:00:00Z</published>
    <title>Entry without id</title>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_and_ignores_feed_metadata() {
        let drafts = parse_atom(FEED).unwrap();
        assert_eq!(drafts.len(), 2);
        let first = &drafts[0];
        assert_eq!(first.url, "http://arxiv.org/abs/2403.01234v1");
        assert_eq!(first.authors, vec!["Ana Ruiz", "Bo Chen"]);
        assert_eq!(first.abstract_text, "We forecast & evaluate.");
        assert_eq!(first.files[0].url, "http://arxiv.org/pdf/2403.01234v1.pdf");
        assert_eq!(first.doi.as_deref(), Some("10.48550/arXiv.2403.01234"));
    }

    #[test]
    fn malformed_feed_is_an_error() {
        let err = parse_atom("<feed><entry><id>x</entry></feed>").unwrap_err();
        assert!(matches!(err, LitharvestError::Xml(_)));
    }

    #[tokio::test]
    async fn fetch_applies_date_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search_query", "all:weather"))
            .and(query_param("sortBy", "submittedDate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let client = ArxivClient::new(PoliteClient::new(&HttpSettings::default()).unwrap())
            .with_base_url(&server.uri());
        let mut req = SearchRequest::new("weather");
        req.date_from = NaiveDate::from_ymd_opt(2024, 1, 1);

        let records = client.fetch(&req).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Graph Neural Networks for Weather");
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(records[0].source, SourceKind::Arxiv);
    }
}
