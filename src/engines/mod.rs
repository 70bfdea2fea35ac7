//! Search engine implementations.

use std::sync::Arc;

use crate::engine::Engine;

// International engines
mod bing;
mod brave;
mod duckduckgo;
mod google;
mod twitter;
mod yandex;

// Chinese engines
mod baidu;
mod so360;
mod sogou;

// Raw pages
mod document;

pub use bing::Bing;
pub use brave::Brave;
pub use duckduckgo::DuckDuckGo;
pub use google::Google;
pub use twitter::Twitter;
pub use yandex::Yandex;

pub use baidu::Baidu;
pub use so360::So360;
pub use sogou::Sogou;

pub use document::Document;

/// Returns every built-in engine.
pub fn all() -> Vec<Arc<dyn Engine>> {
    vec![
        Arc::new(DuckDuckGo::new()),
        Arc::new(Bing::new()),
        Arc::new(Brave::new()),
        Arc::new(Google::new()),
        Arc::new(Yandex::new()),
        Arc::new(Twitter::new()),
        Arc::new(Baidu::new()),
        Arc::new(So360::new()),
        Arc::new(Sogou::new()),
        Arc::new(Document::new()),
    ]
}

/// Looks up a built-in engine by name, ignoring case.
pub fn by_name(name: &str) -> Option<Arc<dyn Engine>> {
    all()
        .into_iter()
        .find(|engine| engine.name().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_engine_names_are_unique() {
        let names: HashSet<&str> = all().iter().map(|e| e.name()).collect();
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("Bing").map(|e| e.name()), Some("bing"));
        assert_eq!(by_name("so360").map(|e| e.name()), Some("so360"));
        assert!(by_name("altavista").is_none());
    }

    #[test]
    fn test_only_document_has_no_base_url() {
        let without: Vec<&str> = all()
            .iter()
            .filter(|e| e.descriptor().base_url.is_none())
            .map(|e| e.name())
            .collect();
        assert_eq!(without, vec!["document"]);
    }

    #[test]
    fn test_engine_schemes_compile() {
        for engine in all() {
            assert!(
                engine.scheme().parse("<html><body></body></html>").is_ok(),
                "{} has an invalid selector",
                engine.name()
            );
        }
    }
}
