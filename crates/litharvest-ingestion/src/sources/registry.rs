//! Runtime lookup of source adapters by name.

use std::sync::Arc;
use std::time::Duration;

use litharvest_common::PoliteClient;
use tracing::{debug, warn};

use super::arxiv::ArxivClient;
use super::base::BaseClient;
use super::core_ac::CoreClient;
use super::crossref::CrossRefClient;
use super::doaj::DoajClient;
use super::europepmc::EuropePmcClient;
use super::openalex::OpenAlexClient;
use super::pubmed::PubMedClient;
use super::semantic_scholar::SemanticScholarClient;
use super::url_fetch::{UrlFetchSource, DEFAULT_FALLBACK_TEMPLATES};
use super::LiteratureSource;
use crate::models::SourceKind;

/// Adapter knobs that come from configuration rather than the request.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Contact address for providers that ask for one (NCBI).
    pub contact_email: String,
    pub pubmed_request_delay: Duration,
    pub custom_url_request_delay: Duration,
    /// `{url}` templates tried when a custom URL cannot be fetched directly.
    pub fallback_templates: Vec<String>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            contact_email: "research@example.com".to_string(),
            pubmed_request_delay: Duration::from_millis(500),
            custom_url_request_delay: Duration::from_millis(1500),
            fallback_templates: DEFAULT_FALLBACK_TEMPLATES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Registered adapters, at most one per [`SourceKind`].
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn LiteratureSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in adapter, sharing one HTTP client.
    pub fn with_defaults(client: PoliteClient, options: &SourceOptions) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OpenAlexClient::new(client.clone())));
        registry.register(Arc::new(CrossRefClient::new(client.clone())));
        registry.register(Arc::new(DoajClient::new(client.clone())));
        registry.register(Arc::new(EuropePmcClient::new(client.clone())));
        registry.register(Arc::new(BaseClient::new(client.clone())));
        registry.register(Arc::new(ArxivClient::new(client.clone())));
        registry.register(Arc::new(
            PubMedClient::new(client.clone())
                .with_email(&options.contact_email)
                .with_request_delay(options.pubmed_request_delay),
        ));
        registry.register(Arc::new(CoreClient::new(client.clone())));
        registry.register(Arc::new(SemanticScholarClient::new(client.clone())));
        registry.register(Arc::new(
            UrlFetchSource::new(client)
                .with_fallbacks(options.fallback_templates.clone())
                .with_request_delay(options.custom_url_request_delay),
        ));
        registry
    }

    /// Add an adapter, replacing any already registered for the same kind.
    pub fn register(&mut self, source: Arc<dyn LiteratureSource>) {
        let kind = source.kind();
        match self.sources.iter_mut().find(|s| s.kind() == kind) {
            Some(slot) => *slot = source,
            None => self.sources.push(source),
        }
    }

    pub fn get(&self, kind: SourceKind) -> Option<Arc<dyn LiteratureSource>> {
        self.sources.iter().find(|s| s.kind() == kind).cloned()
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// Resolve requested names to search adapters, in request order.
    ///
    /// An empty list selects the default set. Unknown or unregistered names
    /// are skipped with a warning, repeats are ignored, and the custom-URL
    /// adapter is never selected here: it runs whenever a request carries
    /// custom URLs.
    pub fn select(&self, names: &[String]) -> Vec<Arc<dyn LiteratureSource>> {
        let kinds: Vec<SourceKind> = if names.is_empty() {
            SourceKind::DEFAULT_SET.to_vec()
        } else {
            names
                .iter()
                .filter_map(|name| match name.parse::<SourceKind>() {
                    Ok(kind) => Some(kind),
                    Err(e) => {
                        warn!(error = %e, "skipping unknown source");
                        None
                    }
                })
                .collect()
        };

        let mut selected: Vec<Arc<dyn LiteratureSource>> = Vec::new();
        for kind in kinds {
            if kind == SourceKind::CustomUrl || selected.iter().any(|s| s.kind() == kind) {
                continue;
            }
            match self.get(kind) {
                Some(source) => selected.push(source),
                None => debug!(source = %kind, "source not registered"),
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litharvest_common::HttpSettings;

    fn registry() -> SourceRegistry {
        SourceRegistry::with_defaults(
            PoliteClient::new(&HttpSettings::default()).unwrap(),
            &SourceOptions::default(),
        )
    }

    #[test]
    fn default_options_carry_fallback_paths() {
        let options = SourceOptions::default();
        assert!(!options.fallback_templates.is_empty());
        assert!(options.fallback_templates.iter().all(|t| t.contains("{url}")));
    }

    #[test]
    fn registers_every_builtin_once() {
        assert_eq!(registry().kinds(), SourceKind::ALL.to_vec());
    }

    #[test]
    fn empty_selection_uses_default_set_in_priority_order() {
        let kinds: Vec<_> = registry().select(&[]).iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, SourceKind::DEFAULT_SET.to_vec());
    }

    #[test]
    fn selection_keeps_request_order_and_skips_unknowns() {
        let names: Vec<String> = ["arxiv", "Scopus", "OpenAlex", "ARXIV", "CustomURL"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let kinds: Vec<_> = registry().select(&names).iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![SourceKind::Arxiv, SourceKind::OpenAlex]);
    }
}
