//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Point-in-time statistics of a client's connection pool
///
/// `hits`, `misses` and `timeouts` are cumulative since the pool was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of times a free connection was found in the pool
    hits: u32,
    /// Number of times a free connection was not found in the pool
    misses: u32,
    /// Number of times waiting for a connection timed out
    timeouts: u32,
    /// Number of connections in the pool (idle + in use)
    total_conns: u32,
    /// Number of idle connections in the pool
    idle_conns: u32,
    /// Number of stale connections removed from the pool
    stale_conns: u32,
}

impl PoolStats {
    /// Create a snapshot from connection counts
    pub fn new(total_conns: u32, idle_conns: u32) -> Self {
        Self {
            total_conns,
            idle_conns,
            ..Self::default()
        }
    }

    /// Builder method: set hit count
    pub fn with_hits(mut self, hits: u32) -> Self {
        self.hits = hits;
        self
    }

    /// Builder method: set miss count
    pub fn with_misses(mut self, misses: u32) -> Self {
        self.misses = misses;
        self
    }

    /// Builder method: set timeout count
    pub fn with_timeouts(mut self, timeouts: u32) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Builder method: set stale connection count
    pub fn with_stale_conns(mut self, stale_conns: u32) -> Self {
        self.stale_conns = stale_conns;
        self
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    pub fn total_conns(&self) -> u32 {
        self.total_conns
    }

    pub fn idle_conns(&self) -> u32 {
        self.idle_conns
    }

    pub fn stale_conns(&self) -> u32 {
        self.stale_conns
    }

    /// Number of connections currently borrowed from the pool
    ///
    /// Saturates at zero if a racy snapshot reports more idle than total.
    pub fn used_conns(&self) -> u32 {
        self.total_conns.saturating_sub(self.idle_conns)
    }
}
