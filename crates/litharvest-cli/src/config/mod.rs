//! Configuration loading for Litharvest.
//! Reads litharvest.toml from the current directory or the path in the
//! LITHARVEST_CONFIG env var. Every field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use litharvest_common::HttpSettings;
use litharvest_ingestion::sources::url_fetch::DEFAULT_FALLBACK_TEMPLATES;
use litharvest_ingestion::{PacingConfig, PipelineConfig, SourceOptions};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_PATH: &str = "litharvest.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub pacing: PacingSection,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Sent to providers that ask for a contact address (NCBI).
    #[serde(default = "default_contact_email")]
    pub contact_email: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_user_agent()           -> String { litharvest_common::http::DEFAULT_USER_AGENT.to_string() }
fn default_contact_email()        -> String { "research@example.com".to_string() }
fn default_timeout_secs()         -> u64    { 30 }
fn default_connect_timeout_secs() -> u64    { 10 }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            contact_email: default_contact_email(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// All delays in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingSection {
    #[serde(default = "default_inter_source_ms")]
    pub inter_source_ms: u64,
    #[serde(default = "default_pubmed_ms")]
    pub pubmed_request_ms: u64,
    #[serde(default = "default_custom_url_ms")]
    pub custom_url_request_ms: u64,
}

fn default_inter_source_ms() -> u64 { 1000 }
fn default_pubmed_ms()       -> u64 { 500 }
fn default_custom_url_ms()   -> u64 { 1500 }

impl Default for PacingSection {
    fn default() -> Self {
        Self {
            inter_source_ms: default_inter_source_ms(),
            pubmed_request_ms: default_pubmed_ms(),
            custom_url_request_ms: default_custom_url_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Used when `search` is run without `--source`; empty means the built-in set.
    #[serde(default)]
    pub sources: Vec<String>,
}

fn default_max_results() -> usize { litharvest_ingestion::models::DEFAULT_MAX_RESULTS }

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results: default_max_results(), sources: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf { PathBuf::from("./litharvest-data") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Retrieval URLs tried when a custom URL cannot be fetched directly;
    /// `{url}` is replaced with the percent-encoded target. An explicit empty
    /// list disables fallbacks.
    #[serde(default = "default_fallback_templates")]
    pub fallback_templates: Vec<String>,
}

fn default_fallback_templates() -> Vec<String> {
    DEFAULT_FALLBACK_TEMPLATES.iter().map(|t| t.to_string()).collect()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { fallback_templates: default_fallback_templates() }
    }
}


impl Config {
    /// Load configuration from litharvest.toml.
    /// Checks LITHARVEST_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("LITHARVEST_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))
            }
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.search.max_results == 0 {
            anyhow::bail!("search.max_results must be at least 1");
        }
        if let Some(t) = self.fetch.fallback_templates.iter().find(|t| !t.contains("{url}")) {
            anyhow::bail!("fetch.fallback_templates entry has no {{url}} placeholder: {t}");
        }
        Ok(())
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            user_agent: self.http.user_agent.clone(),
            timeout: Duration::from_secs(self.http.timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
        }
    }

    pub fn pacing(&self) -> PacingConfig {
        PacingConfig {
            inter_source_delay: Duration::from_millis(self.pacing.inter_source_ms),
            pubmed_request_delay: Duration::from_millis(self.pacing.pubmed_request_ms),
            custom_url_request_delay: Duration::from_millis(self.pacing.custom_url_request_ms),
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig { pacing: self.pacing(), default_max_results: self.search.max_results }
    }

    pub fn source_options(&self) -> SourceOptions {
        let pacing = self.pacing();
        SourceOptions {
            contact_email: self.http.contact_email.clone(),
            pubmed_request_delay: pacing.pubmed_request_delay,
            custom_url_request_delay: pacing.custom_url_request_delay,
            fallback_templates: self.fetch.fallback_templates.clone(),
        }
    }
}
