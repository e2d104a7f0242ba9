//! Fetch adapter for literal, user-supplied URLs.
//!
//! Unlike the search adapters there is no query: every URL in
//! `SearchRequest::custom_urls` is fetched, stripped to its visible text and
//! kept only if it mentions one of the request keywords. A URL that cannot
//! be fetched at all still yields a placeholder record so the failure shows
//! up in results.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use litharvest_common::{LitharvestError, PoliteClient, Result};
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::LiteratureSource;
use crate::chunker::ChunkerConfig;
use crate::models::{CanonicalRecord, SearchRequest, SourceKind};
use crate::text::{clean_abstract, collapse_whitespace, contains_any_keyword, generate_id, keyword_tokens, today};

/// Pages with this many characters of text or fewer are not worth keeping.
pub const MIN_CONTENT_CHARS: usize = 50;

/// Language tag for unstructured web content.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Public retrieval relays tried, in order, when a direct fetch fails.
pub const DEFAULT_FALLBACK_TEMPLATES: [&str; 2] = [
    "https://api.allorigins.win/raw?url={url}",
    "https://corsproxy.io/?{url}",
];

/// Elements whose text is boilerplate rather than content.
const SKIPPED_ELEMENTS: [&str; 7] = ["script", "style", "nav", "header", "footer", "noscript", "template"];

fn title_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("title").expect("valid title selector"))
}

fn body_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("body").expect("valid body selector"))
}

/// Visible text and `<title>` of a fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub title: Option<String>,
    pub text: String,
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if !SKIPPED_ELEMENTS.contains(&el.name()) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Strip boilerplate elements and markup; entities are decoded by the parser.
pub fn extract_page(html: &str) -> PageContent {
    let document = Html::parse_document(html);

    let title = document
        .select(title_selector())
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut raw = String::new();
    match document.select(body_selector()).next() {
        Some(body) => collect_text(body, &mut raw),
        None => collect_text(document.root_element(), &mut raw),
    }

    PageContent { title, text: collapse_whitespace(&raw) }
}

/// A custom URL as the caller wrote it, plus its parsed form.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTarget {
    /// Trimmed input with a scheme; becomes the record's `url`.
    pub literal: String,
    pub parsed: Url,
}

impl FetchTarget {
    fn host(&self) -> &str {
        self.parsed.host_str().unwrap_or_default()
    }
}

/// Prefix `https://` when the caller omitted a scheme.
pub fn normalize_target(raw: &str) -> Result<FetchTarget> {
    let raw = raw.trim();
    let literal = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let parsed = Url::parse(&literal)?;
    if parsed.host_str().is_none() {
        return Err(LitharvestError::InvalidUrl(url::ParseError::EmptyHost));
    }
    Ok(FetchTarget { literal, parsed })
}

pub struct UrlFetchSource {
    client: PoliteClient,
    fallback_templates: Vec<String>,
    request_delay: Duration,
    chunker: ChunkerConfig,
}

impl UrlFetchSource {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            fallback_templates: DEFAULT_FALLBACK_TEMPLATES.iter().map(|t| t.to_string()).collect(),
            request_delay: Duration::from_millis(1500),
            chunker: ChunkerConfig::default(),
        }
    }

    /// Alternate retrieval paths tried after the direct fetch fails. Each
    /// template contains `{url}`, replaced by the percent-encoded target.
    pub fn with_fallbacks(mut self, templates: Vec<String>) -> Self {
        self.fallback_templates = templates;
        self
    }

    /// Delay between consecutive URLs.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    fn fallback_urls(&self, target: &FetchTarget) -> Vec<String> {
        let encoded: String = url::form_urlencoded::byte_serialize(target.literal.as_bytes()).collect();
        self.fallback_templates
            .iter()
            .map(|t| t.replace("{url}", &encoded))
            .collect()
    }

    /// Direct fetch first, then each fallback in order.
    async fn fetch_page(&self, target: &FetchTarget) -> Option<PageContent> {
        let provider = SourceKind::CustomUrl.as_str();
        let attempts = std::iter::once(target.literal.clone()).chain(self.fallback_urls(target));

        for attempt in attempts {
            match self.client.get_text(provider, &attempt, &[]).await {
                Ok(html) => return Some(extract_page(&html)),
                Err(e) => debug!(url = %attempt, error = %e, "page retrieval attempt failed"),
            }
        }
        None
    }

    fn page_record(&self, target: &FetchTarget, page: PageContent) -> CanonicalRecord {
        CanonicalRecord {
            id: generate_id(),
            title: page.title.unwrap_or_else(|| target.host().to_string()),
            authors: Vec::new(),
            date: today(),
            doi: None,
            url: target.literal.clone(),
            language: UNKNOWN_LANGUAGE.to_string(),
            source: SourceKind::CustomUrl,
            abstract_text: clean_abstract(&page.text),
            full_text_chunks: self.chunker.chunk(&page.text),
            files: None,
            created_at: Utc::now(),
        }
    }
}

/// Stand-in for a URL that could not be retrieved by any path.
pub fn placeholder_record(target: &FetchTarget) -> CanonicalRecord {
    CanonicalRecord {
        id: generate_id(),
        title: format!("Content from {}", target.host()),
        authors: Vec::new(),
        date: today(),
        doi: None,
        url: target.literal.clone(),
        language: UNKNOWN_LANGUAGE.to_string(),
        source: SourceKind::CustomUrl,
        abstract_text: format!(
            "Unable to fetch content from this page. Please access directly: {}",
            target.literal
        ),
        full_text_chunks: Vec::new(),
        files: None,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl LiteratureSource for UrlFetchSource {
    fn kind(&self) -> SourceKind {
        SourceKind::CustomUrl
    }

    #[instrument(skip(self, request), fields(urls = request.custom_urls.len()))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<CanonicalRecord>> {
        let tokens = keyword_tokens(&request.keywords);
        let mut records = Vec::new();
        let mut first = true;

        for raw in &request.custom_urls {
            if raw.trim().is_empty() {
                continue;
            }
            let target = match normalize_target(raw) {
                Ok(target) => target,
                Err(e) => {
                    warn!(url = %raw, error = %e, "skipping unparseable custom URL");
                    continue;
                }
            };

            if !first {
                tokio::time::sleep(self.request_delay).await;
            }
            first = false;

            match self.fetch_page(&target).await {
                Some(page) if page.text.chars().count() <= MIN_CONTENT_CHARS => {
                    debug!(url = %target.literal, "page has too little text; dropped");
                }
                Some(page) if !contains_any_keyword(&page.text, &tokens) => {
                    debug!(url = %target.literal, "page mentions no keyword; dropped");
                }
                Some(page) => records.push(self.page_record(&target, page)),
                None => {
                    warn!(url = %target.literal, "could not fetch custom URL; emitting placeholder");
                    records.push(placeholder_record(&target));
                }
            }
        }

        info!(count = records.len(), "custom URLs processed");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litharvest_common::HttpSettings;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const PAGE: &str = r#"<html><head><title> Coral  Reef Report </title>
        <style>.x { color: red }</style></head>
        <body>
          <header>Site banner</header>
          <nav>Home | About</nav>
          <script>var tracking = "climate";</script>
          <main><h1>Reef bleaching</h1>
            <p>Ocean warming &amp; acidification drive mass bleaching events across the reef system.</p>
          </main>
          <footer>Copyright</footer>
        </body></html>"#;

    fn source() -> UrlFetchSource {
        UrlFetchSource::new(PoliteClient::new(&HttpSettings::default()).unwrap())
            .with_fallbacks(Vec::new())
            .with_request_delay(Duration::ZERO)
    }

    fn request(keywords: &str, urls: Vec<String>) -> SearchRequest {
        SearchRequest { custom_urls: urls, ..SearchRequest::new(keywords) }
    }

    #[test]
    fn extraction_drops_boilerplate_elements() {
        let page = extract_page(PAGE);
        assert_eq!(page.title.as_deref(), Some("Coral Reef Report"));
        assert!(page.text.starts_with("Reef bleaching Ocean warming & acidification"));
        for boilerplate in ["Site banner", "Home", "tracking", "Copyright", "color"] {
            assert!(!page.text.contains(boilerplate), "{boilerplate} leaked");
        }
    }

    #[test]
    fn targets_get_a_default_scheme() {
        assert_eq!(normalize_target("example.org/a").unwrap().literal, "https://example.org/a");
        assert_eq!(normalize_target(" http://x.test/ ").unwrap().literal, "http://x.test/");
        assert!(matches!(normalize_target("   "), Err(LitharvestError::InvalidUrl(_))));
        assert!(normalize_target("http://exa mple.org").is_err());
    }

    #[test]
    fn record_url_is_the_literal_target() {
        let target = normalize_target(" example.org ").unwrap();
        assert_eq!(target.parsed.as_str(), "https://example.org/");

        let placeholder = placeholder_record(&target);
        assert_eq!(placeholder.url, "https://example.org");
        assert_eq!(placeholder.title, "Content from example.org");
        assert!(placeholder.abstract_text.ends_with("Please access directly: https://example.org"));
    }

    #[tokio::test]
    async fn keeps_pages_that_mention_a_keyword() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reef"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let url = format!("{}/reef", server.uri());
        let records = source().fetch(&request("ocean policy", vec![url.clone()])).await.unwrap();
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.url, url);
        assert_eq!(rec.title, "Coral Reef Report");
        assert_eq!(rec.language, UNKNOWN_LANGUAGE);
        assert_eq!(rec.source, SourceKind::CustomUrl);
        assert!(!rec.full_text_chunks.is_empty());
    }

    #[tokio::test]
    async fn drops_pages_without_any_keyword() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let records = source()
            .fetch(&request("quantum chromodynamics", vec![server.uri()]))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn unreachable_page_yields_one_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let records = source().fetch(&request("reef", vec![url.clone()])).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].title.starts_with("Content from "));
        assert!(records[0].abstract_text.contains(&url));
        assert!(records[0].full_text_chunks.is_empty());
    }

    #[tokio::test]
    async fn fallback_path_is_tried_after_direct_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocked"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let blocked = format!("{}/blocked", server.uri());
        Mock::given(method("GET"))
            .and(path("/raw"))
            .and(query_param("url", blocked.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let src = source().with_fallbacks(vec![format!("{}/raw?url={{url}}", server.uri())]);
        let records = src.fetch(&request("reef", vec![blocked.clone()])).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Coral Reef Report");
        assert_eq!(records[0].url, blocked);
    }

    #[tokio::test]
    async fn urls_after_the_first_wait_for_the_request_delay() {
        let delay = Duration::from_millis(300);
        let server = MockServer::start().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        Mock::given(method("GET"))
            .respond_with(move |_: &Request| {
                log.lock().unwrap().push(Instant::now());
                ResponseTemplate::new(200).set_body_string(PAGE)
            })
            .mount(&server)
            .await;

        let urls = vec![format!("{}/one", server.uri()), format!("{}/two", server.uri())];
        let start = Instant::now();
        let records = source()
            .with_request_delay(delay)
            .fetch(&request("reef", urls))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0] - start < delay, "first URL waited {:?}", seen[0] - start);
        assert!(seen[1] - seen[0] >= delay);
        assert!(start.elapsed() < delay * 2);
    }
}
