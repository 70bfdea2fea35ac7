//! Search engine trait and the generic paginated adapter.
//!
//! An [`Engine`] is a static description of one provider: where to send the
//! query, how to page, how to spot an anti-bot wall and how to read results.
//! An [`Adapter`] binds an engine to a [`PageFetcher`] and runs the shared
//! fetch, parse and paginate loop.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::fetcher::{FetchRequest, PageFetcher, Params, Response};
use crate::limiter::RateLimitStrategy;
use crate::query::PageRequest;
use crate::result::Page;
use crate::scheme::Scheme;
use crate::{Result, SearchError};

/// Pagination cursor: yields the parameters of page 1, 2, 3 and so on.
pub type Pager = Box<dyn Iterator<Item = Params> + Send>;

/// Static identity of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineDescriptor {
    /// Unique engine name.
    pub name: &'static str,
    /// Search endpoint. `None` means the target itself is the URL.
    pub base_url: Option<&'static str>,
    /// Human readable description.
    pub description: Option<&'static str>,
}

/// Builds parameters from literal pairs.
pub fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Numeric cursor `key = start, start + step, ...`.
pub fn numeric_pager(key: &'static str, start: u64, step: u64) -> Pager {
    Box::new((0u64..).map(move |i| {
        let mut page = Params::new();
        page.insert(key.to_string(), (start + i * step).to_string());
        page
    }))
}

/// Trait for implementing search engines.
///
/// Only [`descriptor`](Engine::descriptor), [`scheme`](Engine::scheme) and
/// [`query`](Engine::query) are required.
pub trait Engine: Send + Sync {
    /// Returns the engine identity.
    fn descriptor(&self) -> &EngineDescriptor;

    /// Returns the result extraction scheme.
    fn scheme(&self) -> &Scheme;

    /// Returns the query parameters for `target`.
    fn query(&self, target: &str) -> Params;

    /// Returns the recency filter, if the engine has one.
    fn latest(&self) -> Option<Params> {
        None
    }

    /// Returns a fresh pagination cursor. The first value addresses page 1.
    fn pager(&self) -> Pager {
        Box::new(std::iter::empty())
    }

    /// Returns default request headers.
    fn headers(&self) -> Params {
        Params::new()
    }

    /// Returns default request cookies.
    fn cookies(&self) -> Params {
        Params::new()
    }

    /// Returns whether a response is an anti-bot challenge.
    fn is_blocked(&self, _response: &Response) -> bool {
        false
    }

    /// Returns the outbound budget for this engine.
    fn rate_limit(&self) -> RateLimitStrategy {
        RateLimitStrategy::standard()
    }

    /// Returns the engine name.
    fn name(&self) -> &'static str {
        self.descriptor().name
    }
}

/// An engine bound to a fetcher.
#[derive(Clone)]
pub struct Adapter {
    engine: Arc<dyn Engine>,
    fetcher: Arc<dyn PageFetcher>,
}

impl Adapter {
    /// Creates an adapter.
    pub fn new(engine: Arc<dyn Engine>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { engine, fetcher }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Returns the engine name.
    pub fn name(&self) -> &'static str {
        self.engine.name()
    }

    /// Returns the URL a request is sent to.
    pub fn url_for(&self, request: &PageRequest) -> String {
        match self.engine.descriptor().base_url {
            Some(base) => base.to_string(),
            None => request.target.clone(),
        }
    }

    /// Returns the rate-limit destination: the search host, or the engine
    /// name for engines without a base URL (document fetches).
    pub fn destination(&self) -> String {
        self.engine
            .descriptor()
            .base_url
            .and_then(|base| url::Url::parse(base).ok())
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.name().to_string())
    }

    /// Fetches pages until `request.num` records are collected.
    ///
    /// With `num <= 0` only the first page is fetched. Otherwise paging stops
    /// once the goal is met, the cursor runs out or a page comes back empty,
    /// and the records are truncated to `num`. The returned title is the
    /// title of the last fetched page.
    pub async fn search(&self, request: &PageRequest) -> Result<Page> {
        let engine = self.engine.as_ref();

        let mut fetch = FetchRequest::new(self.url_for(request));
        fetch.proxy = request.proxy.clone();

        fetch.headers = engine.headers();
        fetch.headers.extend(request.options.headers.clone());
        fetch.cookies = engine.cookies();
        fetch.cookies.extend(request.options.cookies.clone());

        fetch.params = request.options.params.clone();
        if request.latest {
            fetch.params.extend(engine.latest().unwrap_or_default());
        }
        fetch.params.extend(engine.query(&request.query_text()));

        let mut page = self.fetch_page(&fetch).await?;
        if request.num <= 0 || page.records.is_empty() {
            return Ok(page);
        }

        let goal = request.num as usize;
        let mut records = std::mem::take(&mut page.records);
        let mut title = page.title;

        let mut pager = engine.pager();
        pager.next();
        while records.len() < goal {
            let Some(cursor) = pager.next() else {
                break;
            };
            fetch.params.extend(cursor);
            let next = self.fetch_page(&fetch).await?;
            title = next.title;
            if next.records.is_empty() {
                break;
            }
            records.extend(next.records);
        }

        records.truncate(goal);
        debug!("{} collected {} records", self.name(), records.len());
        Ok(Page::new(title, records))
    }

    async fn fetch_page(&self, fetch: &FetchRequest) -> Result<Page> {
        let response = self.fetcher.fetch(fetch).await?.error_for_status()?;
        debug!("{} fetched {}", self.name(), fetch.full_url());

        let page = self.engine.scheme().parse_page(&response.html)?;
        if self.engine.is_blocked(&response) {
            error!("Verification required for {}", response.url);
            return Err(SearchError::Blocked(format!(
                "verification required for {}",
                response.url
            )));
        }
        Ok(page)
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter").field("engine", &self.name()).finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::query::SearchOptions;
    use crate::scheme::Field;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves pages with a scripted number of results and records every request.
    pub(crate) struct ScriptedFetcher {
        pub counts: Vec<usize>,
        pub status: u16,
        pub final_url: Option<String>,
        pub requests: Mutex<Vec<FetchRequest>>,
    }

    impl ScriptedFetcher {
        pub fn new(counts: Vec<usize>) -> Self {
            Self {
                counts,
                status: 200,
                final_url: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn request(&self, i: usize) -> FetchRequest {
            self.requests.lock().unwrap()[i].clone()
        }
    }

    pub(crate) fn results_html(page: usize, count: usize) -> String {
        let items: String = (0..count)
            .map(|i| {
                format!(
                    r#"<div class="r"><a href="https://example.com/{p}/{i}">Result {p}-{i}</a></div>"#,
                    p = page,
                    i = i
                )
            })
            .collect();
        format!("<html><head><title>page {}</title></head><body>{}</body></html>", page, items)
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<Response> {
            let page = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.clone());
                requests.len() - 1
            };
            let count = self.counts.get(page).copied().unwrap_or(0);
            let url = self.final_url.clone().unwrap_or_else(|| request.url.clone());
            Ok(Response::new(url, self.status, results_html(page, count)))
        }
    }

    pub(crate) struct TestEngine {
        descriptor: EngineDescriptor,
        scheme: Scheme,
    }

    impl TestEngine {
        pub fn new() -> Self {
            Self {
                descriptor: EngineDescriptor {
                    name: "test",
                    base_url: Some("https://search.example.com/s"),
                    description: Some("Test engine"),
                },
                scheme: Scheme::new("div.r")
                    .field("url", Field::attr("a", "href"))
                    .field("title", Field::text("a")),
            }
        }
    }

    impl Engine for TestEngine {
        fn descriptor(&self) -> &EngineDescriptor {
            &self.descriptor
        }

        fn scheme(&self) -> &Scheme {
            &self.scheme
        }

        fn query(&self, target: &str) -> Params {
            params(&[("q", target)])
        }

        fn latest(&self) -> Option<Params> {
            Some(params(&[("tf", "day")]))
        }

        fn pager(&self) -> Pager {
            numeric_pager("first", 1, 10)
        }

        fn headers(&self) -> Params {
            params(&[("Accept-Language", "en"), ("X-Engine", "test")])
        }

        fn is_blocked(&self, response: &Response) -> bool {
            response.url.contains("/captcha")
        }
    }

    fn adapter(fetcher: Arc<ScriptedFetcher>) -> Adapter {
        Adapter::new(Arc::new(TestEngine::new()), fetcher)
    }

    #[test]
    fn test_numeric_pager() {
        let pages: Vec<Params> = numeric_pager("pn", 0, 10).take(3).collect();
        assert_eq!(pages[0].get("pn").map(String::as_str), Some("0"));
        assert_eq!(pages[2].get("pn").map(String::as_str), Some("20"));
    }

    #[tokio::test]
    async fn test_goal_of_25_fetches_three_pages() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![10, 10, 10, 10]));
        let page = adapter(fetcher.clone())
            .search(&PageRequest::new("rust").with_num(25))
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), 3);
        assert_eq!(page.len(), 25);
        assert_eq!(page.title, "page 2");
        assert_eq!(fetcher.request(0).params.get("first"), None);
        assert_eq!(fetcher.request(1).params.get("first").map(String::as_str), Some("11"));
        assert_eq!(fetcher.request(2).params.get("first").map(String::as_str), Some("21"));
    }

    #[tokio::test]
    async fn test_goal_met_by_first_page() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![10, 10]));
        let page = adapter(fetcher.clone())
            .search(&PageRequest::new("rust").with_num(5))
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(page.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_page_stops_paging() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![10, 0, 10]));
        let page = adapter(fetcher.clone())
            .search(&PageRequest::new("rust").with_num(25))
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(page.len(), 10);
    }

    #[tokio::test]
    async fn test_empty_first_page_stops_paging() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![0, 10]));
        let page = adapter(fetcher.clone())
            .search(&PageRequest::new("rust").with_num(25))
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert!(page.is_empty());
        assert_eq!(page.title, "page 0");
    }

    #[tokio::test]
    async fn test_non_positive_goal_returns_first_page() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![10, 10]));
        let page = adapter(fetcher.clone())
            .search(&PageRequest::new("rust").with_num(-1))
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(page.len(), 10);
        assert_eq!(page.title, "page 0");
    }

    #[tokio::test]
    async fn test_params_merge_order() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![1]));
        let options = SearchOptions::default()
            .with_param("q", "overridden")
            .with_param("mkt", "en-US")
            .with_site("docs.rs");
        adapter(fetcher.clone())
            .search(&PageRequest::new("rust").with_latest(true).with_options(options))
            .await
            .unwrap();

        let request = fetcher.request(0);
        assert_eq!(request.url, "https://search.example.com/s");
        assert_eq!(request.params.get("q").map(String::as_str), Some("rust site:docs.rs"));
        assert_eq!(request.params.get("mkt").map(String::as_str), Some("en-US"));
        assert_eq!(request.params.get("tf").map(String::as_str), Some("day"));
    }

    #[tokio::test]
    async fn test_caller_headers_win() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![1]));
        let mut options = SearchOptions::default();
        options.headers.insert("Accept-Language".into(), "zh-CN".into());
        options.cookies.insert("sid".into(), "1".into());
        adapter(fetcher.clone())
            .search(&PageRequest::new("rust").with_options(options))
            .await
            .unwrap();

        let request = fetcher.request(0);
        assert_eq!(request.headers.get("Accept-Language").map(String::as_str), Some("zh-CN"));
        assert_eq!(request.headers.get("X-Engine").map(String::as_str), Some("test"));
        assert_eq!(request.cookies.get("sid").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let mut fetcher = ScriptedFetcher::new(vec![10]);
        fetcher.status = 503;
        let err = adapter(Arc::new(fetcher))
            .search(&PageRequest::new("rust"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Transport { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_blocked_response() {
        let mut fetcher = ScriptedFetcher::new(vec![0]);
        fetcher.final_url = Some("https://search.example.com/captcha?id=1".into());
        let err = adapter(Arc::new(fetcher))
            .search(&PageRequest::new("rust"))
            .await
            .unwrap_err();
        assert!(err.is_blocked());
    }

    #[tokio::test]
    async fn test_proxy_is_forwarded() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![1]));
        let proxy = crate::proxy::ProxyHandle::new("http://127.0.0.1:8080");
        adapter(fetcher.clone())
            .search(&PageRequest::new("rust").with_proxy(Some(proxy.clone())))
            .await
            .unwrap();
        assert_eq!(fetcher.request(0).proxy, Some(proxy));
    }

    #[test]
    fn test_destination() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let adapter = adapter(fetcher);
        assert_eq!(adapter.destination(), "search.example.com");
    }

    #[test]
    fn test_document_destination_is_engine_name() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let adapter = Adapter::new(Arc::new(crate::engines::Document::new()), fetcher);
        assert_eq!(adapter.destination(), "document");
    }
}
