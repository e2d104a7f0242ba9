use thiserror::Error;

#[derive(Debug, Error)]
pub enum LitharvestError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error: {status}")]
    Status { provider: String, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, LitharvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_names_provider() {
        let err = LitharvestError::Status { provider: "OpenAlex".into(), status: 503 };
        assert_eq!(err.to_string(), "OpenAlex API error: 503");
    }

    #[test]
    fn url_parse_errors_convert() {
        let err: LitharvestError = url::Url::parse("https://").unwrap_err().into();
        assert!(matches!(err, LitharvestError::InvalidUrl(_)));
    }
}
