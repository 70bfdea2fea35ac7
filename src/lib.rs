//! # multisearch
//!
//! Multi-source web search aggregation.
//!
//! A query fans out to several search providers concurrently. Each provider
//! is described by an [`Engine`]: how to build its request, how to page
//! through results and a declarative [`Scheme`] for extracting records from
//! its HTML. The merged records are embedded, near-duplicates are clustered
//! and the final list is picked for both relevance and diversity.
//!
//! Outbound traffic goes through:
//!
//! - a weighted proxy pool with success reinforcement
//! - a multi-tier sliding-window rate limiter per `(proxy, destination)`
//! - retry with capped exponential backoff
//!
//! ## Example
//!
//! ```rust,no_run
//! use multisearch::{Preference, SearchConfig, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = ServiceConfig::from_env().build()?;
//!
//!     let config = SearchConfig::new("rust programming").with_preference(Preference::Latest);
//!     let response = service.search(config).await?;
//!
//!     for record in &response.records {
//!         println!("{}", record.url().unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod result;

pub mod aggregator;
pub mod config;
pub mod embed;
pub mod engine;
pub mod engines;
pub mod fetcher;
pub mod fetcher_http;
pub mod limiter;
pub mod preset;
pub mod proxy;
pub mod query;
pub mod retry;
pub mod scheme;
pub mod search;
pub mod service;

pub use aggregator::Aggregator;
pub use config::ServiceConfig;
pub use embed::{Embedder, HashEmbedder, HttpEmbedder};
pub use engine::{Adapter, Engine, EngineDescriptor};
pub use error::{Result, SearchError};
pub use fetcher::{FetchRequest, PageFetcher, Response};
pub use fetcher_http::HttpFetcher;
pub use limiter::{RateLimitStrategy, RateLimiter};
pub use preset::{Plan, Preference, Preset, PresetRegistry, WeightedPreset};
pub use proxy::{ProxyHandle, ProxyPool};
pub use query::{PageRequest, SearchOptions};
pub use result::{Page, Record};
pub use retry::RetryPolicy;
pub use scheme::{Extract, Field, Scheme};
pub use search::{EngineConfig, Searcher};
pub use service::{SearchConfig, SearchResponse, SearchService};
