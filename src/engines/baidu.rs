//! Baidu search engine implementation.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::{numeric_pager, params, Engine, EngineDescriptor, Pager};
use crate::fetcher::{Params, Response};
use crate::scheme::{Extract, Field, Scheme};

static DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    name: "baidu",
    base_url: Some("https://www.baidu.com/s"),
    description: Some("Chinese search engine with median-quality results and unreliable sources."),
};

const CAPTCHA_PREFIX: &str = "https://wappass.baidu.com/static/captcha";

/// Baidu search engine (百度).
///
/// The real target URL sits in the container's `mu` attribute.
pub struct Baidu {
    scheme: Scheme,
}

impl Baidu {
    /// Creates a new Baidu engine.
    pub fn new() -> Self {
        Self {
            scheme: Scheme::new("div.result")
                .field("url", Field::new(Extract::Attr("mu".to_string())))
                .field("title", Field::text_content("a"))
                .field("abstract", Field::text_content("[data-module=\"abstract\"]"))
                .field("source", Field::text_content("span.cosc-source-text")),
        }
    }
}

impl Default for Baidu {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Baidu {
    fn descriptor(&self) -> &EngineDescriptor {
        &DESCRIPTOR
    }

    fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    fn query(&self, target: &str) -> Params {
        params(&[("wd", target)])
    }

    /// Results from the last 24 hours.
    fn latest(&self) -> Option<Params> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let start = now.saturating_sub(86_400);
        let gpc = format!("stf={},{}|stftype=1", start, now);
        Some(params(&[("gpc", &gpc)]))
    }

    fn pager(&self) -> Pager {
        numeric_pager("pn", 0, 10)
    }

    fn is_blocked(&self, response: &Response) -> bool {
        response.url.starts_with(CAPTCHA_PREFIX)
    }
}
