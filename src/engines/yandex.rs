//! Yandex search engine implementation.

use crate::engine::{numeric_pager, params, Engine, EngineDescriptor, Pager};
use crate::fetcher::{Params, Response};
use crate::limiter::RateLimitStrategy;
use crate::scheme::{Field, Scheme};

static DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    name: "yandex",
    base_url: Some("https://yandex.com/search"),
    description: Some("Russian search engine with strong Eastern European coverage."),
};

const ROBOT_CHECK: &str = "Are you not a robot?";

/// Yandex search engine.
///
/// Consecutive requests trigger the robot check quickly; keep paging shallow.
pub struct Yandex {
    scheme: Scheme,
}

impl Yandex {
    /// Creates a new Yandex engine.
    pub fn new() -> Self {
        Self {
            scheme: Scheme::new("li.serp-item")
                .field("url", Field::attr("a", "href"))
                .field("title", Field::text_content(".OrganicTitle-LinkText"))
                .field("abstract", Field::text_content("div.TextContainer"))
                .field("source", Field::text_content("div.OrganicHost-Title")),
        }
    }
}

impl Default for Yandex {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Yandex {
    fn descriptor(&self) -> &EngineDescriptor {
        &DESCRIPTOR
    }

    fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    fn query(&self, target: &str) -> Params {
        params(&[("text", target)])
    }

    fn latest(&self) -> Option<Params> {
        Some(params(&[("within", "77")]))
    }

    fn pager(&self) -> Pager {
        numeric_pager("p", 1, 1)
    }

    fn is_blocked(&self, response: &Response) -> bool {
        response.html.contains(ROBOT_CHECK)
    }

    fn rate_limit(&self) -> RateLimitStrategy {
        RateLimitStrategy::strict()
    }
}
