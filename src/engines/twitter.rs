//! Twitter search through a Nitter mirror.

use crate::engine::{params, Engine, EngineDescriptor};
use crate::fetcher::Params;
use crate::scheme::{Field, Scheme};

const NITTER_ORIGIN: &str = "https://nitter.net";

static DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    name: "twitter",
    base_url: Some("https://nitter.net/search"),
    description: Some("Recent posts from Twitter/X, served by a Nitter mirror."),
};

/// Twitter search via Nitter. Single page only.
pub struct Twitter {
    scheme: Scheme,
}

impl Twitter {
    /// Creates a new Twitter engine.
    pub fn new() -> Self {
        Self {
            scheme: Scheme::new(".timeline-item")
                .field("url", Field::attr("a.tweet-link", "href").postprocess(absolute_url))
                .field("abstract", Field::text_content(".tweet-content"))
                .field("author", Field::text_content("div.fullname-and-username"))
                .field("time", Field::attr("span.tweet-date a", "title")),
        }
    }
}

impl Default for Twitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Twitter {
    fn descriptor(&self) -> &EngineDescriptor {
        &DESCRIPTOR
    }

    fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    fn query(&self, target: &str) -> Params {
        params(&[("q", target)])
    }
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}{}", NITTER_ORIGIN, href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twitter_new() {
        let engine = Twitter::new();
        assert_eq!(engine.name(), "twitter");
        assert!(engine.latest().is_none());
        assert_eq!(engine.pager().count(), 0);
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(absolute_url("/rustlang/status/1#m"), "https://nitter.net/rustlang/status/1#m");
        assert_eq!(absolute_url("https://x.com/a"), "https://x.com/a");
    }

    #[test]
    fn test_parse_results() {
        let html = r#"
            <html><body><div class="timeline">
                <div class="timeline-item">
                    <a class="tweet-link" href="/rustlang/status/1#m"></a>
                    <div class="fullname-and-username">Rust Language @rustlang</div>
                    <span class="tweet-date"><a href="/rustlang/status/1#m" title="Oct 1, 2026 · 4:00 PM UTC">1h</a></span>
                    <div class="tweet-content">Rust 1.90 is out!</div>
                </div>
                <div class="timeline-item show-more"></div>
            </div></body></html>
        "#;
        let results = Twitter::new().scheme().parse(html).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url(), Some("https://nitter.net/rustlang/status/1#m"));
        assert_eq!(results[0].get("abstract"), Some("Rust 1.90 is out!"));
        assert_eq!(results[0].get("author"), Some("Rust Language @rustlang"));
        assert_eq!(results[0].get("time"), Some("Oct 1, 2026 · 4:00 PM UTC"));
    }
}
