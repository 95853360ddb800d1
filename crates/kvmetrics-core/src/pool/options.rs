//! Client options relevant to pool sizing

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options a single-endpoint client was created with
///
/// Only the network address and the pool sizing knobs are modelled here;
/// those are the values reported as static pool metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Network address of the server, `host:port`
    addr: String,
    /// Maximum number of connections in the pool
    pool_size: u32,
    /// Minimum number of idle connections kept open
    min_idle_conns: u32,
    /// Maximum number of idle connections kept open (0 = unlimited)
    max_idle_conns: u32,
    /// Time in milliseconds to wait for a free connection
    pool_timeout_ms: u64,
}

impl ClientOptions {
    /// Create options for the given address with default pool sizing
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            pool_size: 10,
            min_idle_conns: 0,
            max_idle_conns: 0,
            pool_timeout_ms: 4_000,
        }
    }

    /// Set the maximum number of pooled connections
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the minimum number of idle connections
    pub fn with_min_idle_conns(mut self, min_idle_conns: u32) -> Self {
        self.min_idle_conns = min_idle_conns;
        self
    }

    /// Set the maximum number of idle connections
    pub fn with_max_idle_conns(mut self, max_idle_conns: u32) -> Self {
        self.max_idle_conns = max_idle_conns;
        self
    }

    /// Set the pool timeout in milliseconds
    pub fn with_pool_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.pool_timeout_ms = timeout_ms;
        self
    }

    /// Get the server address
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Get the maximum pool size
    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    /// Get the minimum number of idle connections
    pub fn min_idle_conns(&self) -> u32 {
        self.min_idle_conns
    }

    /// Get the maximum number of idle connections
    pub fn max_idle_conns(&self) -> u32 {
        self.max_idle_conns
    }

    /// Get the pool timeout as a Duration
    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms)
    }
}

impl Default for ClientOptions {
    /// Options for a local server on the default port
    fn default() -> Self {
        Self::new("localhost:6379")
    }
}
