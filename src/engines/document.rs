//! Generic page fetch: the target is the URL.

use crate::engine::{Engine, EngineDescriptor};
use crate::fetcher::Params;
use crate::scheme::Scheme;

static DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    name: "document",
    base_url: None,
    description: Some("Fetch a single page and extract its main text."),
};

/// Fetches the target URL and returns one `content` record.
pub struct Document {
    scheme: Scheme,
}

impl Document {
    /// Creates the document engine.
    pub fn new() -> Self {
        Self {
            scheme: Scheme::document(),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Document {
    fn descriptor(&self) -> &EngineDescriptor {
        &DESCRIPTOR
    }

    fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    fn query(&self, _target: &str) -> Params {
        Params::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::CONTENT_FIELD;

    #[test]
    fn test_document_new() {
        let engine = Document::new();
        assert_eq!(engine.name(), "document");
        assert!(engine.descriptor().base_url.is_none());
        assert!(engine.query("https://example.com").is_empty());
    }

    #[test]
    fn test_parse_extracts_main_content() {
        let html = r#"
            <html><head><title>Post</title></head><body>
                <nav>Home | About</nav>
                <article><h1>Hello</h1><p>World of Rust.</p></article>
            </body></html>
        "#;
        let records = Document::new().scheme().parse(html).unwrap();
        assert_eq!(records.len(), 1);
        let content = records[0].get(CONTENT_FIELD).unwrap();
        assert!(content.contains("Hello"));
        assert!(content.contains("World of Rust."));
        assert!(!content.contains("About"));
    }
}
