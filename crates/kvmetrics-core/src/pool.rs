//! Connection pool configuration and statistics
//!
//! A client exposes the sizes it was configured with through
//! [`ClientOptions`] and a point-in-time [`PoolStats`] snapshot of its pool.
//!
//! # Example
//!
//! ```ignore
//! use kvmetrics_core::pool::{ClientOptions, PoolStats};
//!
//! let options = ClientOptions::new("127.0.0.1:6379")
//!     .with_pool_size(20)
//!     .with_max_idle_conns(5);
//!
//! let stats: PoolStats = client.pool_stats();
//! println!("{} of {} connections in use", stats.used_conns(), stats.total_conns());
//! ```

mod options;
mod stats;


pub use options::ClientOptions;
pub use stats::PoolStats;
