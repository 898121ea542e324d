//! Core proxy pool implementation.

use crate::error::InvalidProxy;
use crate::proxy::{EndpointKey, Proxy, ProxyState};
use crate::utils;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lower bound for the wait loop so a zero interval still yields.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A candidate string dropped at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedProxy {
    /// The offending input.
    pub candidate: String,
    /// Why it was dropped.
    pub reason: InvalidProxy,
}

/// Point-in-time view of a pool, as reported in job status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub total_proxies: usize,
    pub available_proxies: usize,
    pub in_use_proxies: usize,
    pub usage_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: ProxyState,
    usage_count: u64,
}

/// Mutable part of the pool. `slots[i]` tracks `ProxyPool::proxies[i]`.
#[derive(Debug)]
struct PoolState {
    slots: Vec<Slot>,
}

impl PoolState {
    fn count(&self, state: ProxyState) -> usize {
        self.slots.iter().filter(|slot| slot.state == state).count()
    }
}

/// A fixed set of proxies handed out exclusively to concurrent workers.
///
/// A proxy checked out through [`try_acquire`](Self::try_acquire) is not
/// returned to anyone else until it is [`release`](Self::release)d. Among the
/// free proxies the least used one wins, ties going to the earliest candidate.
#[derive(Debug)]
pub struct ProxyPool {
    /// Validated proxies in candidate order; never changes after construction.
    proxies: Vec<Proxy>,
    index: HashMap<String, usize>,
    rejected: Vec<RejectedProxy>,
    state: Mutex<PoolState>,
}

impl ProxyPool {
    /// Create a pool from candidate proxy strings.
    ///
    /// Invalid candidates are dropped with a warning and kept in
    /// [`rejected`](Self::rejected). An empty result is a valid pool that
    /// never hands anything out.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut proxies = Vec::new();
        let mut index = HashMap::new();
        let mut endpoints: HashSet<EndpointKey> = HashSet::new();
        let mut rejected = Vec::new();

        for candidate in candidates {
            let candidate = candidate.as_ref();
            match Proxy::parse(candidate) {
                Ok(proxy) => {
                    // Different spellings of one relay must share a slot.
                    if !endpoints.insert(proxy.endpoint_key()) {
                        warn!("Ignoring duplicate proxy {:?} ({})", candidate, proxy);
                        continue;
                    }
                    index.insert(proxy.url.clone(), proxies.len());
                    proxies.push(proxy);
                }
                Err(reason) => {
                    warn!("Rejected proxy {:?}: {}", candidate, reason);
                    rejected.push(RejectedProxy {
                        candidate: candidate.to_string(),
                        reason,
                    });
                }
            }
        }

        info!(
            "Proxy pool initialized with {} proxies ({} rejected)",
            proxies.len(),
            rejected.len()
        );
        if proxies.is_empty() {
            warn!("No valid proxies in pool");
        }

        let slots = vec![
            Slot {
                state: ProxyState::Available,
                usage_count: 0,
            };
            proxies.len()
        ];

        Self {
            proxies,
            index,
            rejected,
            state: Mutex::new(PoolState { slots }),
        }
    }

    /// Create a pool from newline-separated text, skipping blanks and `#` comments.
    pub fn from_list(content: &str) -> Self {
        Self::new(utils::parse_proxy_list(content))
    }

    /// Check out the least used free proxy, or `None` if all are in use.
    pub fn try_acquire(&self) -> Option<String> {
        let mut state = self.state.lock();
        let idx = state
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == ProxyState::Available)
            .min_by_key(|(_, slot)| slot.usage_count)
            .map(|(idx, _)| idx)?;

        let slot = &mut state.slots[idx];
        slot.state = ProxyState::InUse;
        slot.usage_count += 1;

        let url = self.proxies[idx].url.clone();
        debug!("Acquired proxy {}", self.proxies[idx]);
        Some(url)
    }

    /// Return a proxy to the pool.
    ///
    /// Unknown or already available identifiers are ignored.
    pub fn release(&self, proxy: &str) {
        let Some(&idx) = self.index.get(proxy) else {
            debug!("Ignoring release of unknown proxy {:?}", proxy);
            return;
        };

        let mut state = self.state.lock();
        let slot = &mut state.slots[idx];
        if slot.state != ProxyState::InUse {
            debug!("Ignoring release of idle proxy {}", self.proxies[idx]);
            return;
        }
        slot.state = ProxyState::Available;
        debug!("Released proxy {}", self.proxies[idx]);
    }

    /// Poll [`try_acquire`](Self::try_acquire) until it succeeds or `timeout` elapses.
    ///
    /// The lock is never held while sleeping. Dropping the returned future
    /// abandons the wait without checking anything out.
    pub async fn acquire_with_wait(
        &self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<String> {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(proxy) = self.try_acquire() {
                return Some(proxy);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                debug!("Timed out after {:?} waiting for a proxy", timeout);
                return None;
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }

    /// Blocking counterpart of [`acquire_with_wait`](Self::acquire_with_wait) for plain threads.
    pub fn acquire_with_wait_blocking(
        &self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<String> {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(proxy) = self.try_acquire() {
                return Some(proxy);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("Timed out after {:?} waiting for a proxy", timeout);
                return None;
            }
            std::thread::sleep(poll_interval.min(deadline - now));
        }
    }

    /// Like [`try_acquire`](Self::try_acquire), but the proxy is released when the lease drops.
    pub fn try_lease(self: &Arc<Self>) -> Option<ProxyLease> {
        let proxy = self.try_acquire()?;
        Some(ProxyLease::new(Arc::clone(self), proxy))
    }

    /// Like [`acquire_with_wait`](Self::acquire_with_wait), returning a lease.
    pub async fn lease_with_wait(
        self: &Arc<Self>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<ProxyLease> {
        let proxy = self.acquire_with_wait(timeout, poll_interval).await?;
        Some(ProxyLease::new(Arc::clone(self), proxy))
    }

    /// Snapshot of the pool taken under the pool lock.
    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        let usage_counts = self
            .proxies
            .iter()
            .zip(&state.slots)
            .map(|(proxy, slot)| (proxy.url.clone(), slot.usage_count))
            .collect();

        PoolStatus {
            total_proxies: self.proxies.len(),
            available_proxies: state.count(ProxyState::Available),
            in_use_proxies: state.count(ProxyState::InUse),
            usage_counts,
        }
    }

    /// Number of valid proxies in the pool.
    pub fn total(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Validated proxies in candidate order.
    pub fn proxies(&self) -> &[Proxy] {
        &self.proxies
    }

    /// Look up the parsed endpoint for an identifier.
    pub fn endpoint(&self, proxy: &str) -> Option<&Proxy> {
        self.index.get(proxy).map(|&idx| &self.proxies[idx])
    }

    /// Current state of a proxy, `None` if it is not in the pool.
    pub fn state_of(&self, proxy: &str) -> Option<ProxyState> {
        let idx = *self.index.get(proxy)?;
        Some(self.state.lock().slots[idx].state)
    }

    /// Times a proxy has been checked out, `None` if it is not in the pool.
    pub fn usage_count(&self, proxy: &str) -> Option<u64> {
        let idx = *self.index.get(proxy)?;
        Some(self.state.lock().slots[idx].usage_count)
    }

    /// Candidates dropped at construction.
    pub fn rejected(&self) -> &[RejectedProxy] {
        &self.rejected
    }
}

/// A checked-out proxy that goes back to its pool when dropped.
#[derive(Debug)]
pub struct ProxyLease {
    pool: Arc<ProxyPool>,
    proxy: String,
}

impl ProxyLease {
    fn new(pool: Arc<ProxyPool>, proxy: String) -> Self {
        Self { pool, proxy }
    }

    /// The leased proxy identifier.
    pub fn proxy(&self) -> &str {
        &self.proxy
    }

    /// The parsed endpoint behind the lease.
    pub fn endpoint(&self) -> Option<&Proxy> {
        self.pool.endpoint(&self.proxy)
    }
}

impl Drop for ProxyLease {
    fn drop(&mut self) {
        self.pool.release(&self.proxy);
    }
}
