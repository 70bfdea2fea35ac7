//! 360 Search engine implementation.

use crate::engine::{numeric_pager, params, Engine, EngineDescriptor, Pager};
use crate::fetcher::Params;
use crate::scheme::{Field, Scheme};

static DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    name: "so360",
    base_url: Some("https://www.so.com/s"),
    description: Some("Chinese search engine from Qihoo 360."),
};

/// 360 Search engine (360搜索).
pub struct So360 {
    scheme: Scheme,
}

impl So360 {
    /// Creates a new 360 Search engine.
    pub fn new() -> Self {
        Self {
            scheme: Scheme::new("li.res-list")
                .field("url", Field::attr(".res-title a", "data-mdurl"))
                .field("title", Field::text_content(".res-title a"))
                .field("abstract", Field::text_content("p.res-desc"))
                .field("source", Field::text_content("cite")),
        }
    }
}

impl Default for So360 {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for So360 {
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
        Some(params(&[("adv_t", "d")]))
    }

    fn pager(&self) -> Pager {
        numeric_pager("pn", 0, 1)
    }
}
