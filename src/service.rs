//! Transport-agnostic service operations.
//!
//! `search`, `fetch` and `list_available_engines` as plain async methods with
//! serde request and response types, ready to be mounted on any RPC layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::engine::Adapter;
use crate::engines::Document;
use crate::fetcher::PageFetcher;
use crate::preset::{Preference, Preset, PresetRegistry, DEFAULT_PRESET};
use crate::query::{PageRequest, SearchOptions};
use crate::search::Searcher;
use crate::{Page, Record, Result};

fn default_preset_name() -> String {
    DEFAULT_PRESET.to_string()
}

fn preference_from_str<'de, D>(deserializer: D) -> std::result::Result<Preference, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// Arguments of a search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Query text.
    pub target: String,
    /// Preset name, matched case-insensitively.
    #[serde(default = "default_preset_name")]
    pub preset: String,
    /// Preference, matched case-insensitively.
    #[serde(default, deserialize_with = "preference_from_str")]
    pub preference: Preference,
    /// Optional `params`, `headers`, `cookies` and `site` overrides.
    #[serde(default)]
    pub extra_params: serde_json::Value,
}

impl SearchConfig {
    /// Creates a config for `target` with the default preset and preference.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            preset: default_preset_name(),
            preference: Preference::default(),
            extra_params: serde_json::Value::Null,
        }
    }

    /// Sets the preset name.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Sets the preference.
    pub fn with_preference(mut self, preference: Preference) -> Self {
        self.preference = preference;
        self
    }

    /// Sets the raw overrides object.
    pub fn with_extra_params(mut self, extra_params: serde_json::Value) -> Self {
        self.extra_params = extra_params;
        self
    }
}

/// Result of a search or fetch call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Page title, or the query for searches.
    pub title: String,
    /// Extracted records.
    pub records: Vec<Record>,
}

impl From<Page> for SearchResponse {
    fn from(page: Page) -> Self {
        Self {
            title: page.title,
            records: page.records,
        }
    }
}

/// The search service.
pub struct SearchService {
    searcher: Searcher,
    registry: PresetRegistry,
    document: Adapter,
}

impl SearchService {
    /// Creates a service with the default presets over `fetcher`.
    pub fn new(searcher: Searcher, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            searcher,
            registry: PresetRegistry::with_defaults(fetcher.clone()),
            document: Adapter::new(Arc::new(Document::new()), fetcher),
        }
    }

    /// Replaces the preset registry.
    pub fn with_registry(mut self, registry: PresetRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the searcher.
    pub fn searcher(&self) -> &Searcher {
        &self.searcher
    }

    /// Returns the preset registry.
    pub fn registry(&self) -> &PresetRegistry {
        &self.registry
    }

    /// Runs an aggregated search through a registered preset.
    pub async fn search(&self, config: SearchConfig) -> Result<SearchResponse> {
        let preset = self.registry.get(&config.preset)?;
        let options = SearchOptions::from_json(&config.extra_params)?;
        self.search_with(preset.as_ref(), config.preference, &config.target, options)
            .await
    }

    /// Runs an aggregated search through `preset`, registered or not.
    pub async fn search_with(
        &self,
        preset: &dyn Preset,
        preference: Preference,
        target: &str,
        options: SearchOptions,
    ) -> Result<SearchResponse> {
        let plan = preset.resolve(preference);
        info!(
            "Searching {:?} with preset {} ({})",
            target,
            preset.name(),
            preference
        );
        let request = plan.request(target, options);
        let page = self.searcher.aggregate(&request, &plan.engines).await?;
        Ok(page.into())
    }

    /// Fetches one page and returns its title and main text.
    pub async fn fetch(&self, url: &str) -> Result<SearchResponse> {
        let page = self
            .searcher
            .search(&self.document, &PageRequest::new(url))
            .await?;
        Ok(page.into())
    }

    /// Returns preset names mapped to descriptions.
    pub fn list_available_engines(&self) -> BTreeMap<String, String> {
        self.registry.descriptions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::engine::tests::ScriptedFetcher;
    use crate::limiter::RateLimitStrategy;
    use crate::scheme::CONTENT_FIELD;
    use crate::SearchError;
    use serde_json::json;

    fn service(fetcher: Arc<ScriptedFetcher>) -> SearchService {
        SearchService::new(Searcher::new(Arc::new(HashEmbedder::default())), fetcher)
    }

    #[test]
    fn test_search_config_defaults() {
        let config: SearchConfig = serde_json::from_value(json!({ "target": "rust" })).unwrap();
        assert_eq!(config, SearchConfig::new("rust"));
        assert_eq!(config.preset, "default");
        assert_eq!(config.preference, Preference::Balance);
        assert!(config.extra_params.is_null());
    }

    #[test]
    fn test_search_config_preference_ignores_case() {
        let config: SearchConfig = serde_json::from_value(json!({
            "target": "rust",
            "preset": "Default",
            "preference": "More_Results",
        }))
        .unwrap();
        assert_eq!(config.preference, Preference::MoreResults);

        let err = serde_json::from_value::<SearchConfig>(json!({
            "target": "rust",
            "preference": "fastest",
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_search_response_from_page() {
        let page = Page::new("t", vec![Record::new().with("url", "https://a.com")]);
        let response = SearchResponse::from(page);
        assert_eq!(response.title, "t");
        assert_eq!(response.records.len(), 1);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["records"][0]["url"], "https://a.com");
    }

    #[test]
    fn test_list_available_engines() {
        let service = service(Arc::new(ScriptedFetcher::new(vec![])));
        let engines = service.list_available_engines();
        assert_eq!(engines.len(), 1);
        assert_eq!(
            engines.get("default").map(String::as_str),
            Some("Suitable for most of the cases.")
        );
    }

    #[tokio::test]
    async fn test_search_unknown_preset() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let err = service(fetcher.clone())
            .search(SearchConfig::new("rust").with_preset("fastest"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::UnknownPreset(_)));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_search_malformed_extra_params() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let err = service(fetcher.clone())
            .search(SearchConfig::new("rust").with_extra_params(json!({ "unknown": 1 })))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_search_runs_every_preset_engine() {
        // The scripted page layout matches none of the real engines.
        let fetcher = Arc::new(ScriptedFetcher::new(vec![3; 8]));
        let response = service(fetcher.clone())
            .search(
                SearchConfig::new("rust")
                    .with_extra_params(json!({ "headers": { "X-Trace": "1" } })),
            )
            .await
            .unwrap();

        assert_eq!(response.title, "rust");
        assert!(response.records.is_empty());
        assert_eq!(fetcher.calls(), 4);
        for i in 0..4 {
            assert_eq!(
                fetcher.request(i).headers.get("X-Trace").map(String::as_str),
                Some("1")
            );
        }
    }

    #[tokio::test]
    async fn test_fetch_charges_one_document_budget() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![1, 1]));
        let service = service(fetcher);
        service.fetch("https://one.example.org/a").await.unwrap();
        service.fetch("https://two.example.net/b").await.unwrap();

        let limiter = service.searcher().limiter();
        let tier = RateLimitStrategy::standard().tiers()[0];
        assert_eq!(limiter.hits("direct:document", tier), 2);
        assert_eq!(limiter.hits("direct:one.example.org", tier), 0);
        assert_eq!(limiter.hits("direct:two.example.net", tier), 0);
    }

    #[tokio::test]
    async fn test_fetch_returns_document_content() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![2]));
        let response = service(fetcher.clone())
            .fetch("https://example.com/article")
            .await
            .unwrap();

        assert_eq!(response.title, "page 0");
        assert_eq!(response.records.len(), 1);
        assert!(response.records[0].get(CONTENT_FIELD).is_some());
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(fetcher.request(0).url, "https://example.com/article");
        assert!(fetcher.request(0).params.is_empty());
    }
}
