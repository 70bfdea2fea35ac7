//! Search request representation.

use serde::{Deserialize, Serialize};

use crate::fetcher::Params;
use crate::proxy::ProxyHandle;
use crate::{Result, SearchError};

/// Caller overrides applied to every engine request of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchOptions {
    /// Extra query parameters.
    pub params: Params,
    /// Extra headers; replace engine headers with the same name.
    pub headers: Params,
    /// Extra cookies; replace engine cookies with the same name.
    pub cookies: Params,
    /// Restrict results to one site (`site:` operator).
    pub site: Option<String>,
}

impl SearchOptions {
    /// Parses options from a JSON object.
    ///
    /// A non-object value or an unknown key is an [`SearchError::InvalidQuery`].
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|e| SearchError::InvalidQuery(format!("extra_params: {}", e)))
    }

    /// Sets the site restriction.
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Adds a query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// One adapter call: a target plus how many records to collect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Query text, or a URL for engines without a base URL.
    pub target: String,
    /// Record goal; zero or negative fetches the first page only.
    pub num: i64,
    /// Apply the engine's recency filter.
    pub latest: bool,
    /// Caller overrides.
    pub options: SearchOptions,
    /// Egress proxy, set by the searcher from the active lease.
    pub proxy: Option<ProxyHandle>,
}

impl PageRequest {
    /// Creates a first-page-only request for `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            num: 0,
            latest: false,
            options: SearchOptions::default(),
            proxy: None,
        }
    }

    /// Sets the record goal.
    pub fn with_num(mut self, num: i64) -> Self {
        self.num = num;
        self
    }

    /// Enables the recency filter.
    pub fn with_latest(mut self, latest: bool) -> Self {
        self.latest = latest;
        self
    }

    /// Sets the caller overrides.
    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the egress proxy.
    pub fn with_proxy(mut self, proxy: Option<ProxyHandle>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Returns the target with the `site:` token appended when requested.
    pub fn query_text(&self) -> String {
        match self.options.site.as_deref() {
            Some(site) if !site.is_empty() => format!("{} site:{}", self.target, site),
            _ => self.target.clone(),
        }
    }
}
