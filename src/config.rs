//! Configuration for call sites that lease proxies from a pool.

use std::time::Duration;

/// Configuration shared by the batch runner and the middleware.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// How long a unit of work waits for a free proxy before giving up.
    pub acquire_timeout: Duration,
    /// Delay between acquisition attempts while the pool is exhausted.
    pub poll_interval: Duration,
    /// Requested parallelism, clamped to the pool size at run time.
    pub max_concurrency: usize,
    /// Timeout for a single outbound request made through a proxy.
    pub request_timeout: Duration,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        ProxyPoolConfigBuilder::new().build()
    }
}

/// Builder for `ProxyPoolConfig`.
pub struct ProxyPoolConfigBuilder {
    acquire_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    max_concurrency: Option<usize>,
    request_timeout: Option<Duration>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            acquire_timeout: None,
            poll_interval: None,
            max_concurrency: None,
            request_timeout: None,
        }
    }

    /// Set how long to wait for a free proxy.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Set the delay between acquisition attempts.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set the requested number of concurrent workers.
    pub fn max_concurrency(mut self, count: usize) -> Self {
        self.max_concurrency = Some(count);
        self
    }

    /// Set the timeout for requests sent through a proxy.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            acquire_timeout: self.acquire_timeout.unwrap_or(Duration::from_secs(30)),
            poll_interval: self.poll_interval.unwrap_or(Duration::from_millis(100)),
            max_concurrency: self.max_concurrency.unwrap_or(8),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
        }
    }
}

impl Default for ProxyPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = ProxyPoolConfig::builder().build();
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.max_concurrency, 8);
    }

    #[test]
    fn builder_overrides() {
        let config = ProxyPoolConfig::builder()
            .acquire_timeout(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(20))
            .max_concurrency(3)
            .request_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }
}
