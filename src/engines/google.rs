//! Google search engine implementation.

use scraper::ElementRef;

use crate::engine::{numeric_pager, params, Engine, EngineDescriptor, Pager};
use crate::fetcher::{Params, Response};
use crate::limiter::RateLimitStrategy;
use crate::scheme::{Field, Scheme};

static DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    name: "google",
    base_url: Some("https://www.google.com/search"),
    description: Some("Popular search engine with high-quality results and reliable sources."),
};

/// Google search engine.
///
/// Quick to serve CAPTCHA pages to scrapers, hence the strict budget.
pub struct Google {
    scheme: Scheme,
}

impl Google {
    /// Creates a new Google engine.
    pub fn new() -> Self {
        Self {
            scheme: Scheme::new("div[data-rpos]")
                .preprocess(links_outward)
                .field("url", Field::attr("a", "href"))
                .field("title", Field::text_content("a"))
                .field("abstract", Field::text_content("[data-sncf=\"1\"]"))
                .field("source", Field::text_content("div.notranslate")),
        }
    }
}

impl Default for Google {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps containers whose first link leaves Google (internal links are widgets).
fn links_outward(container: &ElementRef<'_>) -> bool {
    container
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
        .is_some_and(|href| href.starts_with("http"))
}

impl Engine for Google {
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
        Some(params(&[("tbs", "qdr:d")]))
    }

    fn pager(&self) -> Pager {
        numeric_pager("start", 0, 10)
    }

    fn is_blocked(&self, response: &Response) -> bool {
        response.url.contains("/sorry/")
            || response.html.contains("/sorry/index")
            || response.html.contains("recaptcha")
    }

    fn rate_limit(&self) -> RateLimitStrategy {
        RateLimitStrategy::strict()
    }
}
