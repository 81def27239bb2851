//! Connection-pooled transport that runs a single attempt.
//!
//! The pool is tuned for many concurrent short-lived calls to one or a few
//! hosts. `reqwest::Client` is internally reference counted and thread safe, so
//! the transport is shared by every in-flight call without extra locking.

use crate::request::OutboundRequest;
use crate::{Error, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Connection pool and timeout tuning for the underlying HTTP client.
///
/// # Examples
///
/// ```
/// use controlplane_client::TransportConfig;
/// use std::time::Duration;
///
/// let transport = TransportConfig {
///     timeout: Duration::from_secs(10),
///     pool_max_idle_per_host: 4,
///     ..TransportConfig::default()
/// };
/// assert_eq!(transport.max_redirects, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Overall budget for one attempt, from connect to the end of the body.
    pub timeout: Duration,
    /// Budget for TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Longest silence tolerated while waiting for response bytes.
    pub read_timeout: Duration,
    /// Idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// How long an idle pooled connection is kept before being closed.
    pub pool_idle_timeout: Duration,
    /// TCP keepalive interval for pooled connections.
    pub tcp_keepalive: Duration,
    /// Redirects followed before the attempt fails.
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 16,
            pool_idle_timeout: Duration::from_secs(90),
            tcp_keepalive: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

impl TransportConfig {
    /// Builds a pooled `reqwest::Client` from this configuration.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .tcp_keepalive(self.tcp_keepalive)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))
    }
}

/// Runs attempts against the shared pool.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl Transport {
    pub(crate) fn new(http_client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }

    /// Executes exactly one attempt with a fresh copy of the request.
    ///
    /// Returns [`Error::Cancelled`] as soon as `cancel` fires, otherwise the
    /// response or the network error.
    pub(crate) async fn execute(
        &self,
        request: &OutboundRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let attempt = request.to_attempt(self.timeout);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.http_client.execute(attempt) => result.map_err(Error::Network),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_redirects, 10);
        assert!(config.connect_timeout < config.timeout);
    }

    #[test]
    fn test_build_client() {
        assert!(TransportConfig::default().build_client().is_ok());
    }
}
