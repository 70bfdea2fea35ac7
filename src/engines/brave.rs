//! Brave Search engine implementation.

use crate::engine::{numeric_pager, params, Engine, EngineDescriptor, Pager};
use crate::fetcher::{Params, Response};
use crate::limiter::RateLimitStrategy;
use crate::scheme::{Field, Scheme};

static DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    name: "brave",
    base_url: Some("https://search.brave.com/search"),
    description: Some("Independent index with good English results; rate limited aggressively."),
};

/// Brave Search engine.
pub struct Brave {
    scheme: Scheme,
}

impl Brave {
    /// Creates a new Brave Search engine.
    pub fn new() -> Self {
        Self {
            scheme: Scheme::new("div.snippet")
                .field("url", Field::attr("a", "href"))
                .field("title", Field::text_content("div.title"))
                .field("abstract", Field::text_content("div.snippet-description"))
                .field("source", Field::text_content("div.sitename")),
        }
    }
}

impl Default for Brave {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Brave {
    fn descriptor(&self) -> &EngineDescriptor {
        &DESCRIPTOR
    }

    fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    fn query(&self, target: &str) -> Params {
        params(&[("q", target)])
    }

    fn latest(&self) -> Option<Params> {
        Some(params(&[("tf", "pd")]))
    }

    fn pager(&self) -> Pager {
        numeric_pager("offset", 0, 1)
    }

    fn is_blocked(&self, response: &Response) -> bool {
        response.url.contains("/search/captcha") || response.html.contains("pow-captcha")
    }

    fn rate_limit(&self) -> RateLimitStrategy {
        RateLimitStrategy::strict()
    }
}
