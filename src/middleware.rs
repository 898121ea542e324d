//! Middleware implementation for reqwest.

use crate::config::ProxyPoolConfig;
use crate::error::NoProxyAvailable;
use crate::pool::ProxyPool;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{info, warn};
use reqwest_middleware::{Error, Middleware, Next, Result};
use std::sync::Arc;

/// Middleware that sends each request through a proxy leased exclusively from a pool.
#[derive(Clone)]
pub struct ProxyPoolMiddleware {
    /// The proxy pool.
    pool: Arc<ProxyPool>,
    config: ProxyPoolConfig,
}

impl ProxyPoolMiddleware {
    /// Create a new middleware over an existing pool.
    pub fn new(pool: Arc<ProxyPool>, config: ProxyPoolConfig) -> Self {
        let status = pool.status();
        info!(
            "Proxy middleware using {}/{} available proxies",
            status.available_proxies, status.total_proxies
        );
        if pool.is_empty() {
            warn!("No proxies in pool, every request will fail");
        }

        Self { pool, config }
    }

    /// The pool requests are routed through.
    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }
}

#[async_trait]
impl Middleware for ProxyPoolMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        _extensions: &mut http::Extensions,
        _next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let Some(lease) = self
            .pool
            .lease_with_wait(self.config.acquire_timeout, self.config.poll_interval)
            .await
        else {
            let status = self.pool.status();
            warn!(
                "No proxy available. Total: {}, In use: {}",
                status.total_proxies, status.in_use_proxies
            );
            return Err(Error::Middleware(anyhow!(NoProxyAvailable)));
        };

        // The lease is released on every return below.
        let endpoint = lease
            .endpoint()
            .ok_or_else(|| Error::Middleware(anyhow!("leased proxy missing from pool")))?;
        info!("Using proxy: {}", endpoint);

        let reqwest_proxy = endpoint.to_reqwest_proxy().map_err(|e| {
            warn!("Failed to create proxy from {}: {}", endpoint, e);
            Error::Reqwest(e)
        })?;

        let client = reqwest::Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| {
                warn!("Failed to build client with proxy {}: {}", endpoint, e);
                Error::Reqwest(e)
            })?;

        client.execute(req).await.map_err(|err| {
            warn!("Request failed with proxy {}: {}", endpoint, err);
            Error::Reqwest(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest_middleware::ClientBuilder;
    use std::time::Duration;

    #[tokio::test]
    async fn exhausted_pool_fails_without_sending() {
        let pool = Arc::new(ProxyPool::new(["http://127.0.0.1:9"]));
        let _held = pool.try_lease().unwrap();

        let config = ProxyPoolConfig::builder()
            .acquire_timeout(Duration::from_millis(50))
            .poll_interval(Duration::from_millis(10))
            .build();
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(ProxyPoolMiddleware::new(Arc::clone(&pool), config))
            .build();

        let err = client.get("http://example.invalid/").send().await.unwrap_err();
        assert!(err.to_string().contains("No proxy available"));
        assert_eq!(pool.status().in_use_proxies, 1);
    }

    #[tokio::test]
    async fn lease_returned_after_failed_request() {
        // Nothing listens on the discard port, so the connect fails fast.
        let pool = Arc::new(ProxyPool::new(["http://127.0.0.1:9"]));
        let config = ProxyPoolConfig::builder()
            .request_timeout(Duration::from_secs(2))
            .build();
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(ProxyPoolMiddleware::new(Arc::clone(&pool), config))
            .build();

        assert!(client.get("http://example.invalid/").send().await.is_err());

        let status = pool.status();
        assert_eq!(status.available_proxies, 1);
        assert_eq!(status.usage_counts["http://127.0.0.1:9"], 1);
    }
}
