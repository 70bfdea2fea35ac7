//! Declarative field extraction from result pages.
//!
//! A [`Scheme`] names a container selector and a set of [`Field`]s. The
//! interpreter selects every container, resolves each field against it and
//! emits one [`Record`] per container that yielded at least one value.

use scraper::{ElementRef, Html, Node, Selector};

use crate::{Page, Record, Result, SearchError};

/// Field name used for whole-document extraction.
pub const CONTENT_FIELD: &str = "content";

/// Pure string transform applied after extraction.
pub type Postprocess = fn(&str) -> String;

/// Container filter; returning `false` skips the container.
pub type Preprocess = fn(&ElementRef<'_>) -> bool;

/// How a value is pulled out of the resolved element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extract {
    /// Value of the named attribute.
    Attr(String),
    /// Text directly inside the element, before its first child element.
    Text,
    /// Text following the element, up to the next sibling element.
    Tail,
    /// All nested text.
    TextContent,
}

/// Extraction rule for one field.
#[derive(Debug, Clone)]
pub struct Field {
    selector: Option<String>,
    extract: Extract,
    postprocess: Option<Postprocess>,
}

impl Field {
    /// Creates a rule that operates on the container itself.
    pub fn new(extract: Extract) -> Self {
        Self {
            selector: None,
            extract,
            postprocess: None,
        }
    }

    /// Attribute of the first element matching `selector`.
    pub fn attr(selector: &str, attribute: &str) -> Self {
        Self::new(Extract::Attr(attribute.to_string())).select(selector)
    }

    /// Direct text of the first element matching `selector`.
    pub fn text(selector: &str) -> Self {
        Self::new(Extract::Text).select(selector)
    }

    /// Trailing text of the first element matching `selector`.
    pub fn tail(selector: &str) -> Self {
        Self::new(Extract::Tail).select(selector)
    }

    /// All nested text of the first element matching `selector`.
    pub fn text_content(selector: &str) -> Self {
        Self::new(Extract::TextContent).select(selector)
    }

    /// Resolves the rule against the first match of `selector` inside the container.
    pub fn select(mut self, selector: &str) -> Self {
        self.selector = Some(selector.to_string());
        self
    }

    /// Sets the post-processing transform.
    pub fn postprocess(mut self, f: Postprocess) -> Self {
        self.postprocess = Some(f);
        self
    }

    /// Returns the sub-selector, if any.
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// Returns the extraction mode.
    pub fn extract(&self) -> &Extract {
        &self.extract
    }
}

/// A container selector plus named field rules.
#[derive(Debug, Clone)]
pub struct Scheme {
    container: String,
    fields: Vec<(String, Field)>,
    preprocess: Option<Preprocess>,
}

impl Scheme {
    /// Creates a scheme without fields.
    pub fn new(container: &str) -> Self {
        Self {
            container: container.to_string(),
            fields: Vec::new(),
            preprocess: None,
        }
    }

    /// Scheme for raw pages: no fields, whole-document content.
    pub fn document() -> Self {
        Self::new("html")
    }

    /// Adds a named field rule.
    pub fn field(mut self, name: &str, field: Field) -> Self {
        self.fields.push((name.to_string(), field));
        self
    }

    /// Sets the container filter.
    pub fn preprocess(mut self, f: Preprocess) -> Self {
        self.preprocess = Some(f);
        self
    }

    /// Returns the container selector.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns the declared field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Extracts records from an HTML document.
    ///
    /// Without declared fields this yields exactly one record holding the
    /// page's main-content text under [`CONTENT_FIELD`].
    pub fn parse(&self, html: &str) -> Result<Vec<Record>> {
        self.records_of(&Html::parse_document(html))
    }

    /// Extracts the document title and records in one pass.
    pub fn parse_page(&self, html: &str) -> Result<Page> {
        let document = Html::parse_document(html);
        let records = self.records_of(&document)?;
        Ok(Page::new(title_of(&document), records))
    }

    fn records_of(&self, document: &Html) -> Result<Vec<Record>> {
        if self.fields.is_empty() {
            let record = Record::new().with(CONTENT_FIELD, main_content_of(document));
            return Ok(vec![record]);
        }

        let container = compile(&self.container)?;
        let fields = self
            .fields
            .iter()
            .map(|(name, field)| {
                let selector = field.selector.as_deref().map(compile).transpose()?;
                Ok((name.as_str(), field, selector))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut records = Vec::new();
        for element in document.select(&container) {
            if let Some(filter) = self.preprocess {
                if !filter(&element) {
                    continue;
                }
            }

            let mut record = Record::new();
            for (name, field, selector) in &fields {
                let target = match selector {
                    Some(selector) => element.select(selector).next(),
                    None => Some(element),
                };
                let Some(target) = target else {
                    continue;
                };
                if let Some(value) = extract_value(&target, &field.extract) {
                    let value = match field.postprocess {
                        Some(f) => f(&value),
                        None => value,
                    };
                    record.insert(*name, value);
                }
            }

            if !record.is_empty() {
                records.push(record);
            }
        }

        Ok(records)
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| SearchError::Parse(format!("Failed to parse selector '{}': {:?}", selector, e)))
}

fn extract_value(element: &ElementRef<'_>, extract: &Extract) -> Option<String> {
    let raw = match extract {
        Extract::Attr(name) => element.value().attr(name)?.to_string(),
        Extract::Text => leading_text(element.children().map(|n| n.value())),
        Extract::Tail => leading_text(element.next_siblings().map(|n| n.value())),
        Extract::TextContent => element.text().collect(),
    };
    let value = clean_text(&raw);
    (!value.is_empty()).then_some(value)
}

/// Concatenates text nodes until the first element node.
fn leading_text<'a>(nodes: impl Iterator<Item = &'a Node>) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Element(_) => break,
            Node::Text(text) => out.push_str(text),
            _ => {}
        }
    }
    out
}

/// Removes line breaks and trims.
pub fn clean_text(text: &str) -> String {
    text.replace(['\r', '\n'], "").trim().to_string()
}

/// Returns the document `<title>` text, or an empty string.
pub fn title(html: &str) -> String {
    let document = Html::parse_document(html);
    title_of(&document)
}

fn title_of(document: &Html) -> String {
    compile("title")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

const CONTENT_ROOTS: &[&str] = &["main", "article", "[role=main]", "body"];

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "form", "svg",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "br",
    "tr", "table", "pre", "blockquote", "dd", "dt",
];

/// Extracts readable main-content text from an HTML document.
pub fn main_content(html: &str) -> String {
    let document = Html::parse_document(html);
    main_content_of(&document)
}

fn main_content_of(document: &Html) -> String {
    let root = CONTENT_ROOTS.iter().find_map(|candidate| {
        compile(candidate)
            .ok()
            .and_then(|selector| document.select(&selector).next())
    });
    let Some(root) = root else {
        return String::new();
    };

    let mut buffer = String::new();
    collect_text(root, &mut buffer);

    buffer
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push(' ');
                out.push_str(text);
            }
            Node::Element(element) => {
                let name = element.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}
