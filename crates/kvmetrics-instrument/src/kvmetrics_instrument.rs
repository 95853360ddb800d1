//! kvmetrics instrument - Connection pool and command latency metrics
//!
//! Observes an existing key-value store client without changing its
//! behavior:
//! - Pool statistics are reported through observable instruments, read on
//!   the metrics backend's own collection schedule
//! - Dial, command and pipeline execution are timed through a client hook
//! - Cluster and ring clients are instrumented per node as nodes appear
//! - An optional close signal unregisters every pool callback exactly once
//!
//! Measurements go through the OpenTelemetry metrics API. Unless a meter or
//! meter provider is given, the global meter provider is used.
//!
//! # Example
//!
//! ```ignore
//! use kvmetrics_instrument::{MetricsOptions, instrument_metrics};
//!
//! let shutdown = CancellationToken::new();
//! instrument_metrics(
//!     &client,
//!     MetricsOptions::new()
//!         .with_meter_provider(&provider)
//!         .with_close_signal(shutdown.clone()),
//! )?;
//! ```

mod config;
mod error;
mod hook;
mod instrument;
mod labels;
mod lifecycle;
mod pool_stats;
pub mod semconv;

#[cfg(test)]
mod testing;

pub use config::{INSTRUMENTATION_NAME, MetricsConfig, MetricsOptions};
pub use error::{ErrorHandler, LogErrorHandler, MetricsError, Result};
pub use hook::MetricsHook;
pub use instrument::instrument_metrics;
pub use labels::node_attributes;
pub use lifecycle::RegistrationSet;
pub use pool_stats::report_pool_stats;
