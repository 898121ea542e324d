//! Fan-out of units of work over a shared proxy pool.

use crate::config::ProxyPoolConfig;
use crate::pool::{ProxyLease, ProxyPool};

use futures::stream::{self, StreamExt};
use log::{info, warn};
use std::future::Future;
use std::sync::Arc;

/// Parallelism to actually use for a pool of `pool_total` proxies.
///
/// Never more workers than proxies, and never fewer than one so that an
/// empty pool still drains its work proxy-less.
pub fn effective_concurrency(requested: usize, pool_total: usize) -> usize {
    requested.min(pool_total).max(1)
}

/// Run `work` once per item, each holding a leased proxy for its duration.
///
/// Each unit waits up to `config.acquire_timeout` for a proxy and receives
/// `None` if none became free; whether to continue without one is up to
/// `work`. The lease is returned to the pool when the unit finishes.
/// Results come back in completion order, tagged with the item's index.
pub async fn run_batch<T, R, F, Fut>(
    pool: Arc<ProxyPool>,
    items: Vec<T>,
    config: &ProxyPoolConfig,
    work: F,
) -> Vec<(usize, R)>
where
    F: Fn(T, Option<ProxyLease>) -> Fut,
    Fut: Future<Output = R>,
{
    let concurrency = effective_concurrency(config.max_concurrency, pool.total());
    if concurrency < config.max_concurrency {
        info!(
            "Clamping concurrency from {} to {} to match pool size",
            config.max_concurrency, concurrency
        );
    }
    info!("Running {} units with {} workers", items.len(), concurrency);

    let timeout = config.acquire_timeout;
    let poll_interval = config.poll_interval;
    let work = &work;

    stream::iter(items.into_iter().enumerate())
        .map(|(idx, item)| {
            let pool = Arc::clone(&pool);
            async move {
                let lease = if pool.is_empty() {
                    None
                } else {
                    pool.lease_with_wait(timeout, poll_interval).await
                };
                if lease.is_none() {
                    warn!("Unit {} runs without a proxy", idx);
                }
                (idx, work(item, lease).await)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await
}
