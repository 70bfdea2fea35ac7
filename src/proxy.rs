//! Weighted proxy pool for anti-crawler protection.
//!
//! Engines lease an egress identity for the duration of one call. A lease
//! that completes successfully reinforces its proxy, making it more likely
//! to be picked again. A lease that ends in an error leaves the pool as it
//! was.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::Result;

/// Opaque egress identity, typically a proxy URL such as `socks5://10.0.0.1:1080`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProxyHandle(String);

impl ProxyHandle {
    /// Creates a handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Returns the handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProxyHandle {
    fn from(handle: &str) -> Self {
        Self::new(handle)
    }
}

/// Trait for providing proxies dynamically.
#[async_trait]
pub trait ProxyProvider: Send + Sync {
    /// Fetches a list of available proxies.
    async fn fetch_proxies(&self) -> Result<Vec<ProxyHandle>>;

    /// Returns the refresh interval for proxy list.
    fn refresh_interval(&self) -> Duration {
        Duration::from_secs(300)
    }
}

/// A static proxy provider that returns a fixed list of proxies.
pub struct StaticProxyProvider {
    proxies: Vec<ProxyHandle>,
}

impl StaticProxyProvider {
    /// Creates a new static proxy provider.
    pub fn new(proxies: Vec<ProxyHandle>) -> Self {
        Self { proxies }
    }
}

#[async_trait]
impl ProxyProvider for StaticProxyProvider {
    async fn fetch_proxies(&self) -> Result<Vec<ProxyHandle>> {
        Ok(self.proxies.clone())
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_secs(86_400)
    }
}

/// Reads one proxy per line from a text file.
///
/// Blank lines and lines starting with `#` are ignored; duplicates are
/// collapsed.
pub struct FileProxyProvider {
    path: PathBuf,
}

impl FileProxyProvider {
    /// Creates a provider for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProxyProvider for FileProxyProvider {
    async fn fetch_proxies(&self) -> Result<Vec<ProxyHandle>> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_proxy_list(&contents))
    }
}

fn parse_proxy_list(contents: &str) -> Vec<ProxyHandle> {
    let mut proxies: Vec<ProxyHandle> = Vec::new();
    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let handle = ProxyHandle::new(line);
        if !proxies.contains(&handle) {
            proxies.push(handle);
        }
    }
    proxies
}

struct Members {
    /// Handles with their selection weight, in insertion order.
    entries: Vec<(ProxyHandle, u64)>,
    rng: Box<dyn RngCore + Send>,
}

impl Members {
    fn total_weight(&self) -> u64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    fn pick(&mut self) -> Option<ProxyHandle> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }
        let mut point = self.rng.gen_range(0..total);
        for (handle, weight) in &self.entries {
            if point < *weight {
                return Some(handle.clone());
            }
            point -= weight;
        }
        None
    }

    fn reinforce(&mut self, handle: &ProxyHandle) {
        match self.entries.iter_mut().find(|(h, _)| h == handle) {
            Some((_, weight)) => *weight += 1,
            None => self.entries.push((handle.clone(), 1)),
        }
    }
}

/// A proxy pool that rotates egress identities with success reinforcement.
///
/// Selection is weighted-random over the pool. Leases are advisory: two
/// concurrent calls may hold the same proxy.
pub struct ProxyPool {
    members: Mutex<Members>,
    provider: Option<Box<dyn ProxyProvider>>,
    enabled: bool,
}

impl ProxyPool {
    /// Creates a new empty, disabled proxy pool.
    pub fn new() -> Self {
        Self::build(Vec::new(), None, false)
    }

    /// Creates a proxy pool with static proxies, enabled when non-empty.
    pub fn with_proxies(proxies: Vec<ProxyHandle>) -> Self {
        let enabled = !proxies.is_empty();
        Self::build(proxies, None, enabled)
    }

    /// Creates an enabled proxy pool fed by a provider on [`refresh`](Self::refresh).
    pub fn with_provider<P: ProxyProvider + 'static>(provider: P) -> Self {
        Self::build(Vec::new(), Some(Box::new(provider)), true)
    }

    fn build(proxies: Vec<ProxyHandle>, provider: Option<Box<dyn ProxyProvider>>, enabled: bool) -> Self {
        let mut members = Members {
            entries: Vec::new(),
            rng: Box::new(StdRng::from_entropy()),
        };
        for proxy in proxies {
            members.reinforce(&proxy);
        }
        Self {
            members: Mutex::new(members),
            provider,
            enabled,
        }
    }

    /// Replaces the random source used for selection.
    pub fn with_rng<R: RngCore + Send + 'static>(self, rng: R) -> Self {
        let mut members = self.members.into_inner();
        members.rng = Box::new(rng);
        Self {
            members: Mutex::new(members),
            provider: self.provider,
            enabled: self.enabled,
        }
    }

    /// Enables or disables rotation. A disabled pool leases `None`.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns whether rotation is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Adds the provider's proxies to the pool.
    pub async fn refresh(&self) -> Result<()> {
        if let Some(ref provider) = self.provider {
            let new_proxies = provider.fetch_proxies().await?;
            info!("Refreshed proxy pool with {} proxies", new_proxies.len());
            let mut members = self.members.lock().await;
            for proxy in new_proxies {
                if !members.entries.iter().any(|(h, _)| h == &proxy) {
                    members.entries.push((proxy, 1));
                }
            }
        }
        Ok(())
    }

    /// Refreshes from the provider now and then every provider interval.
    ///
    /// Returns `None` when the pool has no provider. Refresh failures are
    /// logged and retried on the next tick.
    pub fn spawn_refresh(self: Arc<Self>) -> Option<JoinHandle<()>> {
        let interval = self.provider.as_ref()?.refresh_interval();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.refresh().await {
                    warn!("Proxy refresh failed: {}", e);
                }
            }
        }))
    }

    /// Returns the number of distinct proxies.
    pub async fn len(&self) -> usize {
        self.members.lock().await.entries.len()
    }

    /// Returns whether the pool is empty.
    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.entries.is_empty()
    }

    /// Returns the selection weight of a proxy, 0 when absent.
    pub async fn weight(&self, handle: &ProxyHandle) -> u64 {
        self.members
            .lock()
            .await
            .entries
            .iter()
            .find(|(h, _)| h == handle)
            .map_or(0, |(_, w)| *w)
    }

    /// Returns the sum of all weights.
    pub async fn total_weight(&self) -> u64 {
        self.members.lock().await.total_weight()
    }

    /// Adds a proxy, or raises its weight by one if already present.
    pub async fn add(&self, handle: ProxyHandle) {
        self.members.lock().await.reinforce(&handle);
    }

    /// Removes a proxy entirely.
    pub async fn remove(&self, handle: &ProxyHandle) {
        self.members.lock().await.entries.retain(|(h, _)| h != handle);
    }

    /// Picks the next proxy, or `None` when disabled or empty.
    pub async fn get_proxy(&self) -> Option<ProxyHandle> {
        if !self.enabled {
            return None;
        }
        self.members.lock().await.pick()
    }

    /// Runs `f` with a leased proxy.
    ///
    /// On success the proxy is reinforced. On failure the pool is left
    /// unchanged and the error is returned; anti-bot blocks are logged.
    pub async fn with_lease<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Option<ProxyHandle>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let proxy = self.get_proxy().await;
        let outcome = f(proxy.clone()).await;

        match (&outcome, proxy) {
            (Ok(_), Some(proxy)) => {
                debug!("Reinforcing proxy {}", proxy);
                self.members.lock().await.reinforce(&proxy);
            }
            (Err(e), Some(proxy)) if e.is_blocked() => {
                error!("Proxy {} failed: {}", proxy, e);
            }
            _ => {}
        }

        outcome
    }
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::new()
    }
}
