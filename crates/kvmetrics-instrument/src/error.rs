//! Error types for metrics instrumentation

use thiserror::Error;

/// Error raised while setting up or tearing down instrumentation
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Unsupported client type: {0}")]
    UnsupportedClient(&'static str),

    #[error("OpenTelemetry error: {0}")]
    Meter(#[from] opentelemetry::metrics::MetricsError),

    #[error("A close signal requires a running Tokio runtime")]
    NoRuntime,
}

/// Result type alias for instrumentation operations
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Receives errors that cannot be returned to the caller
///
/// Registration failures for nodes discovered after `instrument_metrics`
/// returned, and unregistration failures on close, end up here.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: MetricsError);
}

impl<F> ErrorHandler for F
where
    F: Fn(MetricsError) + Send + Sync,
{
    fn handle(&self, error: MetricsError) {
        self(error)
    }
}

/// Default handler, logs each error as a warning
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle(&self, error: MetricsError) {
        tracing::warn!(error = %error, "metrics instrumentation error");
    }
}
