//! Error types for the proxy-allocator crate.

use thiserror::Error;

/// Reason a candidate proxy string was rejected when building a pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidProxy {
    /// The string could not be parsed as a URL at all.
    #[error("not a proxy url: {0}")]
    Malformed(String),
    /// The scheme is not one of the supported proxy protocols.
    #[error("unsupported proxy scheme `{0}`")]
    UnsupportedScheme(String),
    /// No host was given.
    #[error("missing host")]
    MissingHost,
    /// No explicit port was given.
    #[error("missing port")]
    MissingPort,
    /// An `@` or a password was given without a username.
    #[error("missing username before `@`")]
    MissingUsername,
    /// Path, query or fragment after the port.
    #[error("unexpected trailing component `{0}`")]
    TrailingComponent(String),
}

/// Error returned by call sites when no proxy could be leased in time.
#[derive(Debug, Error)]
#[error("No proxy available in pool")]
pub struct NoProxyAvailable;
