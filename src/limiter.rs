//! Multi-tier sliding-window rate limiting for outbound requests.
//!
//! Budgets are tracked per key, where a key names an egress identity and a
//! destination (see [`key`]). A strategy is an ordered list of tiers; every
//! tier keeps its own sliding window per key.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::warn;

use crate::proxy::ProxyHandle;
use crate::{Result, SearchError};

/// One budget: at most `max_requests` within `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tier {
    /// Window length in seconds.
    pub window_secs: u64,
    /// Requests allowed per window.
    pub max_requests: usize,
}

impl Tier {
    /// Creates a tier.
    pub const fn new(window_secs: u64, max_requests: usize) -> Self {
        Self {
            window_secs,
            max_requests,
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Ordered tiers, evaluated first to last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStrategy {
    tiers: Vec<Tier>,
}

impl RateLimitStrategy {
    /// Creates a strategy from `(window_secs, max_requests)` pairs.
    pub fn new(tiers: &[(u64, usize)]) -> Self {
        Self {
            tiers: tiers.iter().map(|&(w, m)| Tier::new(w, m)).collect(),
        }
    }

    /// 20 per 15s, 600 per 150s.
    pub fn standard() -> Self {
        Self::new(&[(15, 20), (150, 600)])
    }

    /// 2 per second on top of [`standard`](Self::standard), for fragile providers.
    pub fn strict() -> Self {
        Self::new(&[(1, 2), (15, 20), (150, 600)])
    }

    /// Returns the tiers in evaluation order.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }
}

impl Default for RateLimitStrategy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builds a limiter key from the leased proxy and the destination.
pub fn key(proxy: Option<&ProxyHandle>, destination: &str) -> String {
    match proxy {
        Some(proxy) => format!("{}:{}", proxy, destination),
        None => format!("direct:{}", destination),
    }
}

/// Sliding-window rate limiter shared by concurrent engine calls.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<(String, Tier), VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Creates an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, Tier), VecDeque<Instant>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Charges one request against `key`.
    ///
    /// Tiers are checked in order and each passing tier records the hit. The
    /// first tier at capacity stops evaluation, so later tiers are not
    /// charged, and the call fails with [`SearchError::RateExceeded`].
    pub fn allow(&self, key: &str, strategy: &RateLimitStrategy) -> Result<()> {
        let now = Instant::now();
        let mut windows = self.lock();
        prune(&mut windows, now);

        for tier in strategy.tiers() {
            let window = windows.entry((key.to_string(), *tier)).or_default();
            evict(window, now, tier.window());

            if window.len() >= tier.max_requests {
                warn!("Rate limit exceeded for key {}", key);
                return Err(SearchError::RateExceeded {
                    key: key.to_string(),
                });
            }
            window.push_back(now);
        }

        Ok(())
    }

    /// Returns the number of live hits for `key` in `tier`.
    pub fn hits(&self, key: &str, tier: Tier) -> usize {
        let now = Instant::now();
        let mut windows = self.lock();
        let entry = (key.to_string(), tier);
        let count = match windows.get_mut(&entry) {
            Some(window) => {
                evict(window, now, tier.window());
                window.len()
            }
            None => return 0,
        };
        if count == 0 {
            windows.remove(&entry);
        }
        count
    }

    /// Returns the number of windows still holding hits.
    pub fn tracked(&self) -> usize {
        let mut windows = self.lock();
        prune(&mut windows, Instant::now());
        windows.len()
    }
}

/// Drops every window whose hits have all expired.
fn prune(windows: &mut HashMap<(String, Tier), VecDeque<Instant>>, now: Instant) {
    windows.retain(|(_, tier), window| {
        evict(window, now, tier.window());
        !window.is_empty()
    });
}

fn evict(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
    while let Some(&first) = window.front() {
        if now.duration_since(first) >= length {
            window.pop_front();
        } else {
            break;
        }
    }
}
