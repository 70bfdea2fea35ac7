//! Service configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::embed::{Embedder, HashEmbedder, HttpEmbedder};
use crate::fetcher_http::{HttpFetcher, DEFAULT_USER_AGENT};
use crate::proxy::{FileProxyProvider, ProxyPool};
use crate::retry::RetryPolicy;
use crate::search::Searcher;
use crate::service::SearchService;
use crate::Result;

/// Default embedding model for OpenAI-compatible endpoints.
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Settings for building a [`SearchService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Rotate egress through the proxy list.
    pub enable_proxy: bool,
    /// Proxy list file, one handle per line.
    pub proxy_file: PathBuf,
    /// Per-page fetch timeout.
    pub fetch_timeout_secs: u64,
    /// User agent sent to providers.
    pub user_agent: String,
    /// OpenAI-compatible embeddings base URL; local hashing when unset.
    pub embed_url: Option<String>,
    /// Embedding model name.
    pub embed_model: String,
    /// Bearer token for the embeddings API.
    pub embed_api_key: Option<String>,
    /// Attempts per adapter call.
    pub retry_attempts: u32,
    /// First backoff delay.
    pub retry_base_delay_ms: u64,
    /// Backoff cap.
    pub retry_max_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enable_proxy: false,
            proxy_file: PathBuf::from("proxies.txt"),
            fetch_timeout_secs: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            embed_url: None,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            embed_api_key: None,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 10_000,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl ServiceConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(flag) = lookup("ENABLE_PROXY") {
            config.enable_proxy = parse_flag(&flag);
        }
        if let Some(path) = lookup("PROXY_FILE") {
            config.proxy_file = PathBuf::from(path);
        }
        if let Some(secs) = lookup("FETCH_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.fetch_timeout_secs = secs;
        }
        if let Some(url) = lookup("EMBED_URL").filter(|s| !s.is_empty()) {
            config.embed_url = Some(url);
        }
        if let Some(model) = lookup("EMBED_MODEL").filter(|s| !s.is_empty()) {
            config.embed_model = model;
        }
        if let Some(key) = lookup("EMBED_API_KEY").filter(|s| !s.is_empty()) {
            config.embed_api_key = Some(key);
        }

        config
    }

    /// Returns the fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Returns the retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.retry_attempts)
            .with_base_delay_ms(self.retry_base_delay_ms)
            .with_max_delay_ms(self.retry_max_delay_ms)
    }

    /// Builds the embedder: HTTP when `embed_url` is set, hashing otherwise.
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        match &self.embed_url {
            Some(url) => Ok(Arc::new(HttpEmbedder::new(
                url,
                &self.embed_model,
                self.embed_api_key.clone(),
            )?)),
            None => Ok(Arc::new(HashEmbedder::default())),
        }
    }

    /// Builds the proxy pool; disabled unless `enable_proxy` is set.
    pub fn proxy_pool(&self) -> Arc<ProxyPool> {
        if self.enable_proxy {
            Arc::new(ProxyPool::with_provider(FileProxyProvider::new(
                self.proxy_file.clone(),
            )))
        } else {
            Arc::new(ProxyPool::new())
        }
    }

    /// Builds the service.
    ///
    /// With proxies enabled this starts the pool's background refresh, so
    /// it must run inside a tokio runtime.
    pub fn build(&self) -> Result<SearchService> {
        let fetcher = Arc::new(HttpFetcher::with_options(
            &self.user_agent,
            self.fetch_timeout(),
        )?);

        let pool = self.proxy_pool();
        if pool.is_enabled() {
            info!("Proxy rotation enabled from {}", self.proxy_file.display());
            pool.clone().spawn_refresh();
        }

        let searcher = Searcher::new(self.embedder()?)
            .with_proxy_pool(pool)
            .with_retry(self.retry_policy());
        Ok(SearchService::new(searcher, fetcher))
    }
}
