//! Sogou search engine implementation.

use crate::engine::{numeric_pager, params, Engine, EngineDescriptor, Pager};
use crate::fetcher::Params;
use crate::scheme::{Field, Scheme};

static DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    name: "sogou",
    base_url: Some("https://www.sogou.com/web"),
    description: Some("Chinese search engine with WeChat article coverage."),
};

/// Sogou search engine (搜狗).
pub struct Sogou {
    scheme: Scheme,
}

impl Sogou {
    /// Creates a new Sogou engine.
    pub fn new() -> Self {
        Self {
            scheme: Scheme::new(".vrwrap")
                .field("url", Field::attr("a", "href"))
                .field("title", Field::text_content("a"))
                .field("abstract", Field::text_content(".text-layout.space-txt"))
                .field("source", Field::text_content(".text-layout.citeurl")),
        }
    }
}

impl Default for Sogou {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Sogou {
    fn descriptor(&self) -> &EngineDescriptor {
        &DESCRIPTOR
    }

    fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    fn query(&self, target: &str) -> Params {
        params(&[("query", target)])
    }

    fn latest(&self) -> Option<Params> {
        Some(params(&[("s_from", "inttime_day")]))
    }

    fn pager(&self) -> Pager {
        numeric_pager("page", 1, 1)
    }
}
