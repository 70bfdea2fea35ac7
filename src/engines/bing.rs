//! Bing search engine implementation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::engine::{numeric_pager, params, Engine, EngineDescriptor, Pager};
use crate::fetcher::Params;
use crate::scheme::{Field, Scheme};

static DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    name: "bing",
    base_url: Some("https://www.bing.com/search"),
    description: Some("Microsoft search engine with broad international coverage."),
};

/// Bing search engine.
///
/// Result links go through `bing.com/ck/a` with the target URL base64
/// encoded in the `u` parameter; [`decode_url`] unwraps it.
pub struct Bing {
    scheme: Scheme,
}

impl Bing {
    /// Creates a new Bing engine.
    pub fn new() -> Self {
        Self {
            scheme: Scheme::new("li.b_algo")
                .field("url", Field::attr("h2 a", "href").postprocess(decode_url))
                .field("title", Field::text_content("h2 a"))
                .field("abstract", Field::text_content("p.b_lineclamp2"))
                .field("source", Field::text_content("div.tptt")),
        }
    }
}

impl Default for Bing {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Bing {
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
        Some(params(&[("filters", "ex1:\"ez1\"")]))
    }

    fn pager(&self) -> Pager {
        numeric_pager("first", 1, 10)
    }
}

/// Decodes a Bing click-tracking link. Other links are returned as-is.
fn decode_url(href: &str) -> String {
    decode_tracking_url(href).unwrap_or_else(|| href.to_string())
}

fn decode_tracking_url(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("&u=a1")?;
    let encoded = rest.split("&ntb=1").next()?;
    let bytes = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()
}
