use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{LitharvestError, Result};

/// Default identification sent to the public scholarly APIs.
pub const DEFAULT_USER_AGENT: &str =
    concat!("Litharvest/", env!("CARGO_PKG_VERSION"), " (mailto:research@example.com)");

/// Knobs for the outbound HTTP client.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client shared by all source adapters.
///
/// Only `http`/`https` URLs are accepted, and every response is checked for a
/// 2xx status before the body is handed back to the caller.
#[derive(Debug, Clone)]
pub struct PoliteClient {
    client: Client,
}

impl PoliteClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = ClientBuilder::new()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Validates that a URL can be requested by this client.
    pub fn is_allowed(url: &str) -> bool {
        Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false)
    }

    /// Starts a GET request after validating the target URL.
    pub fn get(&self, url: &str) -> Result<RequestBuilder> {
        if !Self::is_allowed(url) {
            return Err(LitharvestError::InvalidRequest(format!(
                "refusing to fetch non-HTTP URL {url}"
            )));
        }
        Ok(self.client.get(url))
    }

    /// Sends a request and maps any non-2xx status to [`LitharvestError::Status`].
    pub async fn send_checked(&self, provider: &str, request: RequestBuilder) -> Result<Response> {
        let resp = request.send().await?;
        let status = resp.status();
        debug!(provider, status = status.as_u16(), url = %resp.url(), "upstream response");
        if !status.is_success() {
            return Err(LitharvestError::Status {
                provider: provider.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }

    /// GET a URL and decode the body as JSON.
    pub async fn get_json(
        &self,
        provider: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value> {
        let req = self.get(url)?.query(query).header("Accept", "application/json");
        let resp = self.send_checked(provider, req).await?;
        let body = resp.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| LitharvestError::Parse(format!("{provider} returned malformed JSON: {e}")))
    }

    /// GET a URL and return the body as text.
    pub async fn get_text(&self, provider: &str, url: &str, query: &[(&str, String)]) -> Result<String> {
        let req = self.get(url)?.query(query);
        let resp = self.send_checked(provider, req).await?;
        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> PoliteClient {
        PoliteClient::new(&HttpSettings::default()).unwrap()
    }

    #[test]
    fn only_http_schemes_are_allowed() {
        assert!(PoliteClient::is_allowed("https://api.openalex.org/works"));
        assert!(PoliteClient::is_allowed("http://localhost:8080/x"));
        assert!(!PoliteClient::is_allowed("ftp://example.com/file"));
        assert!(!PoliteClient::is_allowed("not a url"));
        assert!(client().get("file:///etc/passwd").is_err());
    }

    #[tokio::test]
    async fn get_json_decodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("search", "rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let body = client()
            .get_json("Test", &format!("{}/works", server.uri()), &[("search", "rust".into())])
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client()
            .get_text("OpenAlex", &server.uri(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LitharvestError::Status { status: 503, .. }));
        assert_eq!(err.to_string(), "OpenAlex API error: 503");
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let err = client().get_json("DOAJ", &server.uri(), &[]).await.unwrap_err();
        assert!(matches!(err, LitharvestError::Parse(_)));
    }
}
