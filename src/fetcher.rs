//! Page fetcher abstraction for retrieving HTML content.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::proxy::ProxyHandle;
use crate::{Result, SearchError};

/// Query parameters, headers or cookies. Later inserts replace earlier ones.
pub type Params = BTreeMap<String, String>;

/// One outbound page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Target URL without query string.
    pub url: String,
    /// Query parameters appended to the URL.
    pub params: Params,
    /// Extra request headers.
    pub headers: Params,
    /// Cookies sent with the request.
    pub cookies: Params,
    /// Egress proxy; `None` uses the default route.
    pub proxy: Option<ProxyHandle>,
}

impl FetchRequest {
    /// Creates a bare GET request.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Returns the URL with encoded query parameters, for logging.
    pub fn full_url(&self) -> String {
        if self.params.is_empty() {
            return self.url.clone();
        }
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.url, query)
    }
}

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub html: String,
}

impl Response {
    /// Creates a response.
    pub fn new(url: impl Into<String>, status: u16, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            html: html.into(),
        }
    }

    /// Fails with [`SearchError::Transport`] on status 400 and above.
    pub fn error_for_status(self) -> Result<Self> {
        if self.status >= 400 {
            return Err(SearchError::Transport {
                url: self.url,
                status: self.status,
            });
        }
        Ok(self)
    }
}

/// Trait for fetching the full HTML content of a URL.
///
/// Implementations may use plain HTTP requests or a headless browser. They
/// must give up after their page-load timeout and report it as an error.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one page.
    async fn fetch(&self, request: &FetchRequest) -> Result<Response>;
}
