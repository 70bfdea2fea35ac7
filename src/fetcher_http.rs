//! HTTP-based page fetcher using reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use tracing::debug;

use crate::fetcher::{FetchRequest, PageFetcher, Response};
use crate::{Result, SearchError};

/// Default browser-like user agent.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default page-load timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A page fetcher that uses plain HTTP requests via reqwest.
///
/// Requests without a proxy share one client. Proxied requests build a
/// client for the leased proxy, since reqwest binds proxies per client.
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a new `HttpFetcher` with default settings.
    pub fn new() -> Result<Self> {
        Self::with_options(DEFAULT_USER_AGENT, DEFAULT_TIMEOUT)
    }

    /// Creates an `HttpFetcher` with a custom user agent and timeout.
    pub fn with_options(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = build_client(user_agent, timeout, None)?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
            timeout,
        })
    }

    /// Returns the page-load timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn client_for(&self, request: &FetchRequest) -> Result<Client> {
        match &request.proxy {
            Some(proxy) => build_client(&self.user_agent, self.timeout, Some(proxy.as_str())),
            None => Ok(self.client.clone()),
        }
    }
}

fn build_client(user_agent: &str, timeout: Duration, proxy: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(user_agent).timeout(timeout);

    if let Some(proxy_url) = proxy {
        debug!("Using proxy: {}", proxy_url);
        let proxy = Proxy::all(proxy_url)
            .map_err(|e| SearchError::Other(format!("Failed to create proxy: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| SearchError::Other(format!("Failed to create HTTP client: {}", e)))
}

fn cookie_header(request: &FetchRequest) -> Option<String> {
    if request.cookies.is_empty() {
        return None;
    }
    Some(
        request
            .cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response> {
        let client = self.client_for(request)?;

        let mut builder = client.get(&request.url).query(&request.params);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = cookie_header(request) {
            builder = builder.header(reqwest::header::COOKIE, cookies);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout
            } else {
                SearchError::Http(e)
            }
        })?;
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let html = response.text().await?;

        debug!("Fetched {} ({}, {} bytes)", url, status, html.len());
        Ok(Response { url, status, html })
    }
}
