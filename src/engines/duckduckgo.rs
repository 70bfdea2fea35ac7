//! DuckDuckGo search engine implementation.

use crate::engine::{numeric_pager, params, Engine, EngineDescriptor, Pager};
use crate::fetcher::Params;
use crate::scheme::{Field, Scheme};

static DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    name: "duckduckgo",
    base_url: Some("https://html.duckduckgo.com/html"),
    description: Some("Privacy-focused search engine with general web results."),
};

/// DuckDuckGo search engine (HTML endpoint).
pub struct DuckDuckGo {
    scheme: Scheme,
}

impl DuckDuckGo {
    /// Creates a new DuckDuckGo engine.
    pub fn new() -> Self {
        Self {
            scheme: Scheme::new(".result")
                .field("url", Field::attr("a.result__a", "href").postprocess(extract_url))
                .field("title", Field::text_content("a.result__a"))
                .field("abstract", Field::text_content("a.result__snippet")),
        }
    }
}

impl Default for DuckDuckGo {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for DuckDuckGo {
    fn descriptor(&self) -> &EngineDescriptor {
        &DESCRIPTOR
    }

    fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    fn query(&self, target: &str) -> Params {
        params(&[("q", target)])
    }

    fn pager(&self) -> Pager {
        numeric_pager("s", 0, 10)
    }
}

/// Unwraps `//duckduckgo.com/l/?uddg=...` redirects and makes the URL absolute.
fn extract_url(href: &str) -> String {
    let url = if href.contains("duckduckgo.com/l/?uddg=") {
        extract_redirect_url(href).unwrap_or_else(|| href.to_string())
    } else {
        href.to_string()
    };
    if url.starts_with("http://") || url.starts_with("https://") {
        url
    } else {
        format!("https:{}", url)
    }
}

fn extract_redirect_url(href: &str) -> Option<String> {
    let (_, encoded) = href.split_once("uddg=")?;
    let encoded = encoded.split('&').next()?;
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}
