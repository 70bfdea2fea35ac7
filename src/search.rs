//! Search orchestration.
//!
//! [`Searcher::search`] runs one adapter call under retry, proxy lease and
//! rate limiting. [`Searcher::aggregate`] fans a query out to weighted
//! adapters concurrently and ranks the merged records.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::aggregator::{ranking_text, Aggregator};
use crate::embed::{normalize, Embedder};
use crate::engine::Adapter;
use crate::limiter::{self, RateLimiter};
use crate::proxy::ProxyPool;
use crate::query::PageRequest;
use crate::retry::RetryPolicy;
use crate::{Page, Result, SearchError};

/// Over-fetch factor applied to each engine's share of the goal.
const OVERSAMPLE: f64 = 1.5;

/// An adapter with its share of an aggregated search.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The adapter to query.
    pub adapter: Arc<Adapter>,
    /// Relative weight; zero excludes the adapter.
    pub weight: u32,
}

impl EngineConfig {
    /// Creates a weighted adapter entry.
    pub fn new(adapter: Arc<Adapter>, weight: u32) -> Self {
        Self { adapter, weight }
    }
}

/// Records one engine should collect: `max(1, ceil(weight / total * num * 1.5))`.
pub fn quota(weight: u32, total: u32, num: usize) -> i64 {
    if total == 0 {
        return 1;
    }
    let share = f64::from(weight) / f64::from(total) * num as f64 * OVERSAMPLE;
    (share.ceil() as i64).max(1)
}

/// Meta searcher shared by all requests.
pub struct Searcher {
    limiter: Arc<RateLimiter>,
    proxy_pool: Arc<ProxyPool>,
    embedder: Arc<dyn Embedder>,
    retry: RetryPolicy,
    aggregator: Aggregator,
}

impl Searcher {
    /// Creates a searcher with a fresh limiter and a disabled proxy pool.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new()),
            proxy_pool: Arc::new(ProxyPool::new()),
            embedder,
            retry: RetryPolicy::default(),
            aggregator: Aggregator::new(),
        }
    }

    /// Sets the proxy pool.
    pub fn with_proxy_pool(mut self, proxy_pool: Arc<ProxyPool>) -> Self {
        self.proxy_pool = proxy_pool;
        self
    }

    /// Shares a rate limiter with other searchers.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the ranking aggregator.
    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Returns the rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Returns the proxy pool.
    pub fn proxy_pool(&self) -> &Arc<ProxyPool> {
        &self.proxy_pool
    }

    /// Runs one adapter call with retries.
    ///
    /// Every attempt leases a proxy, charges the rate limiter for the
    /// `(proxy, destination)` pair and then fetches. A rate-limit denial is
    /// returned without retrying.
    pub async fn search(&self, adapter: &Adapter, request: &PageRequest) -> Result<Page> {
        self.retry.run(|| self.attempt(adapter, request)).await
    }

    async fn attempt(&self, adapter: &Adapter, request: &PageRequest) -> Result<Page> {
        self.proxy_pool
            .with_lease(|proxy| async move {
                let key = limiter::key(proxy.as_ref(), &adapter.destination());
                self.limiter.allow(&key, &adapter.engine().rate_limit())?;
                let request = request.clone().with_proxy(proxy);
                adapter.search(&request).await
            })
            .await
    }

    /// Searches all weighted adapters concurrently and returns the top `request.num` records.
    ///
    /// A failing adapter contributes no records; the call fails with
    /// [`SearchError::AllEnginesFailed`] only when every adapter failed.
    pub async fn aggregate(&self, request: &PageRequest, engines: &[EngineConfig]) -> Result<Page> {
        let query = request.target.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery("Query cannot be empty".into()));
        }
        if request.num <= 0 {
            return Err(SearchError::InvalidQuery(format!(
                "Result count must be positive, got {}",
                request.num
            )));
        }
        let engines: Vec<&EngineConfig> = engines.iter().filter(|c| c.weight > 0).collect();
        if engines.is_empty() {
            return Err(SearchError::NoEngines);
        }

        let start = Instant::now();
        let num = request.num as usize;
        let total: u32 = engines.iter().map(|c| c.weight).sum();

        let futures: Vec<_> = engines
            .iter()
            .map(|config| {
                let request = request.clone().with_num(quota(config.weight, total, num));
                async move {
                    let name = config.adapter.name();
                    match self.search(&config.adapter, &request).await {
                        Ok(page) => {
                            debug!("Engine {} returned {} records", name, page.len());
                            Ok(page.records)
                        }
                        Err(e) => {
                            warn!("Engine {} failed: {}", name, e);
                            Err(format!("{}: {}", name, e))
                        }
                    }
                }
            })
            .collect();

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for outcome in join_all(futures).await {
            match outcome {
                Ok(page) => records.extend(page),
                Err(e) => failures.push(e),
            }
        }
        if failures.len() == engines.len() {
            return Err(SearchError::AllEnginesFailed(failures.join("; ")));
        }
        if records.is_empty() {
            return Ok(Page::empty(query));
        }

        let mut texts: Vec<String> = records.iter().map(ranking_text).collect();
        texts.push(query.to_string());
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(SearchError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        let mut embeddings: Vec<Vec<f32>> = vectors.iter().map(|v| normalize(v)).collect();
        let query_vector = embeddings.pop().unwrap_or_default();

        let merged = records.len();
        let ranked = self.aggregator.rank(records, &embeddings, &query_vector, num);
        info!(
            "Aggregated {} records from {} engines into {} in {}ms",
            merged,
            engines.len() - failures.len(),
            ranked.len(),
            start.elapsed().as_millis()
        );

        Ok(Page::new(query, ranked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::engine::tests::{ScriptedFetcher, TestEngine};
    use crate::fetcher::{FetchRequest, PageFetcher, Response};
    use crate::limiter::RateLimitStrategy;
    use crate::proxy::ProxyHandle;
    use crate::Record;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Serves one fixed page; later pages are empty.
    struct StaticFetcher(String);

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<Response> {
            let html = if request.params.contains_key("first") {
                "<html><body></body></html>".to_string()
            } else {
                self.0.clone()
            };
            Ok(Response::new(request.url.clone(), 200, html))
        }
    }

    fn static_adapter(titles: &[(&str, &str)]) -> Arc<Adapter> {
        let items: String = titles
            .iter()
            .map(|(url, title)| format!(r#"<div class="r"><a href="{}">{}</a></div>"#, url, title))
            .collect();
        let html = format!("<html><body>{}</body></html>", items);
        Arc::new(Adapter::new(
            Arc::new(TestEngine::new()),
            Arc::new(StaticFetcher(html)),
        ))
    }

    fn scripted_adapter(fetcher: Arc<ScriptedFetcher>) -> Arc<Adapter> {
        Arc::new(Adapter::new(Arc::new(TestEngine::new()), fetcher))
    }

    /// Looks texts up in a table; unknown texts map to the first axis.
    struct TableEmbedder(HashMap<String, Vec<f32>>);

    #[async_trait]
    impl Embedder for TableEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| self.0.get(t).cloned().unwrap_or_else(|| vec![1.0, 0.0, 0.0]))
                .collect())
        }
    }

    fn searcher() -> Searcher {
        Searcher::new(Arc::new(HashEmbedder::default()))
    }

    #[test]
    fn test_quota() {
        assert_eq!(quota(1, 2, 20), 15);
        assert_eq!(quota(3, 4, 10), 12);
        assert_eq!(quota(1, 4, 10), 4);
        assert_eq!(quota(1, 1000, 1), 1);
        assert_eq!(quota(0, 0, 10), 1);
    }

    #[tokio::test]
    async fn test_search_leases_and_reinforces_proxy() {
        let proxy = ProxyHandle::new("http://127.0.0.1:8080");
        let pool = Arc::new(ProxyPool::with_proxies(vec![proxy.clone()]));
        let searcher = searcher().with_proxy_pool(pool.clone());
        let fetcher = Arc::new(ScriptedFetcher::new(vec![3]));

        let page = searcher
            .search(&scripted_adapter(fetcher.clone()), &PageRequest::new("rust"))
            .await
            .unwrap();

        assert_eq!(page.len(), 3);
        assert_eq!(fetcher.request(0).proxy, Some(proxy.clone()));
        assert_eq!(pool.weight(&proxy).await, 2);
        let key = limiter::key(Some(&proxy), "search.example.com");
        let tier = RateLimitStrategy::standard().tiers()[0];
        assert_eq!(searcher.limiter().hits(&key, tier), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_retries_transport_errors() {
        let mut fetcher = ScriptedFetcher::new(vec![3, 3, 3]);
        fetcher.status = 502;
        let fetcher = Arc::new(fetcher);

        let err = searcher()
            .search(&scripted_adapter(fetcher.clone()), &PageRequest::new("rust"))
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::Transport { status: 502, .. }));
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_rate_limited_is_not_retried() {
        let searcher = searcher();
        let strategy = RateLimitStrategy::standard();
        for _ in 0..20 {
            searcher.limiter().allow("direct:search.example.com", &strategy).unwrap();
        }
        let fetcher = Arc::new(ScriptedFetcher::new(vec![3]));

        let err = searcher
            .search(&scripted_adapter(fetcher.clone()), &PageRequest::new("rust"))
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::RateExceeded { .. }));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_aggregate_validates_input() {
        let engines = vec![EngineConfig::new(static_adapter(&[]), 1)];
        let searcher = searcher();

        let err = searcher
            .aggregate(&PageRequest::new("  ").with_num(10), &engines)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));

        let err = searcher
            .aggregate(&PageRequest::new("rust").with_num(0), &engines)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));

        let err = searcher
            .aggregate(&PageRequest::new("rust").with_num(10), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NoEngines));
    }

    #[tokio::test]
    async fn test_aggregate_no_records() {
        let engines = vec![EngineConfig::new(static_adapter(&[]), 1)];
        let page = searcher()
            .aggregate(&PageRequest::new("rust").with_num(10), &engines)
            .await
            .unwrap();
        assert_eq!(page.title, "rust");
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_dedups_near_identical_records() {
        let mut table = HashMap::new();
        table.insert("Python basics".to_string(), vec![0.9, 0.43589, 0.0]);
        table.insert("Python basics!".to_string(), vec![0.9, 0.43589, 0.0]);
        table.insert("History of Python".to_string(), vec![0.6, 0.0, 0.8]);
        let searcher = Searcher::new(Arc::new(TableEmbedder(table)));

        let engines = vec![
            EngineConfig::new(
                static_adapter(&[
                    ("https://a.com/basics", "Python basics"),
                    ("https://a.com/history", "History of Python"),
                ]),
                1,
            ),
            EngineConfig::new(static_adapter(&[("https://b.com/basics", "Python basics!")]), 1),
        ];

        let page = searcher
            .aggregate(&PageRequest::new("python").with_num(2), &engines)
            .await
            .unwrap();

        let titles: Vec<&str> = page.records.iter().filter_map(|r| r.get("title")).collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&"History of Python"));
        assert_eq!(
            titles.iter().filter(|t| t.starts_with("Python basics")).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregate_isolates_failing_engine() {
        let mut failing = ScriptedFetcher::new(vec![]);
        failing.status = 500;
        let engines = vec![
            EngineConfig::new(static_adapter(&[("https://a.com", "Rust book")]), 1),
            EngineConfig::new(scripted_adapter(Arc::new(failing)), 1),
        ];

        let page = searcher()
            .aggregate(&PageRequest::new("rust").with_num(5), &engines)
            .await
            .unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page.records[0].url(), Some("https://a.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregate_all_engines_fail() {
        let mut first = ScriptedFetcher::new(vec![]);
        first.status = 500;
        let mut second = ScriptedFetcher::new(vec![]);
        second.status = 403;
        let engines = vec![
            EngineConfig::new(scripted_adapter(Arc::new(first)), 1),
            EngineConfig::new(scripted_adapter(Arc::new(second)), 1),
        ];

        let err = searcher()
            .aggregate(&PageRequest::new("rust").with_num(5), &engines)
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::AllEnginesFailed(_)));
    }

    #[tokio::test]
    async fn test_aggregate_skips_zero_weight() {
        let engines = vec![EngineConfig::new(static_adapter(&[("https://a.com", "Rust")]), 0)];
        let err = searcher()
            .aggregate(&PageRequest::new("rust").with_num(5), &engines)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NoEngines));
    }

    #[tokio::test]
    async fn test_aggregate_requests_weighted_quota() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![10, 10, 10, 10]));
        let engines = vec![
            EngineConfig::new(scripted_adapter(fetcher.clone()), 3),
            EngineConfig::new(static_adapter(&[("https://a.com", "Rust")]), 1),
        ];

        let page = searcher()
            .aggregate(&PageRequest::new("rust").with_num(10), &engines)
            .await
            .unwrap();

        // quota(3, 4, 10) = 12 needs two pages of ten.
        assert_eq!(fetcher.calls(), 2);
        assert!(page.len() <= 10);
    }

    #[tokio::test]
    async fn test_aggregate_embedding_count_mismatch() {
        struct ShortEmbedder;

        #[async_trait]
        impl Embedder for ShortEmbedder {
            async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(vec![vec![1.0]])
            }
        }

        let engines = vec![EngineConfig::new(static_adapter(&[("https://a.com", "Rust")]), 1)];
        let err = Searcher::new(Arc::new(ShortEmbedder))
            .aggregate(&PageRequest::new("rust").with_num(5), &engines)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_aggregate_never_embeds_empty_text() {
        struct NonEmptyEmbedder;

        #[async_trait]
        impl Embedder for NonEmptyEmbedder {
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                if texts.iter().any(|t| t.is_empty()) {
                    return Err(SearchError::Embedding("empty input".to_string()));
                }
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
        }

        let engines = vec![EngineConfig::new(
            static_adapter(&[("https://a.com/untitled", ""), ("https://a.com/rust", "Rust")]),
            1,
        )];
        let page = Searcher::new(Arc::new(NonEmptyEmbedder))
            .aggregate(&PageRequest::new("rust").with_num(5), &engines)
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert!(page
            .records
            .iter()
            .any(|r| r.url() == Some("https://a.com/untitled") && r.get("title").is_none()));
    }

    #[test]
    fn test_records_survive_ranking_unchanged() {
        let record = Record::new().with("title", "x").with("url", "https://x");
        let ranked = Aggregator::new().rank(vec![record.clone()], &[vec![1.0]], &[1.0], 1);
        assert_eq!(ranked, vec![record]);
    }
}
