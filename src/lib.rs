//! # proxy-allocator
//!
//! Exclusive proxy allocation for concurrent workers.
//!
//! A [`ProxyPool`] is built once per job from a list of proxy strings and shared
//! by reference with the job's workers. Each worker checks out a proxy before
//! its outbound work and returns it afterwards; no proxy is ever held by two
//! workers at once, and the least used free proxy is handed out first.

pub mod batch;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pool;
pub mod proxy;
mod utils;

pub use batch::{effective_concurrency, run_batch};
pub use config::{ProxyPoolConfig, ProxyPoolConfigBuilder};
pub use error::{InvalidProxy, NoProxyAvailable};
pub use middleware::ProxyPoolMiddleware;
pub use pool::{PoolStatus, ProxyLease, ProxyPool, RejectedProxy};
pub use proxy::{EndpointKey, Proxy, ProxyScheme, ProxyState};
