//! Instrumentation options

use std::sync::Arc;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::{Meter, MeterProvider};
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorHandler, LogErrorHandler};

/// Name of the instrumentation scope meters are requested for
pub const INSTRUMENTATION_NAME: &str = "kvmetrics-instrument";

/// Options for [`instrument_metrics`](crate::instrument_metrics)
///
/// All options are optional. Without a meter or meter provider the meter is
/// taken from the global provider installed with
/// [`opentelemetry::global::set_meter_provider`].
#[derive(Clone, Default)]
pub struct MetricsOptions {
    provider_meter: Option<Meter>,
    meter: Option<Meter>,
    pool_name: Option<String>,
    attributes: Vec<KeyValue>,
    close_signal: Option<CancellationToken>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl MetricsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the meter from this provider instead of the global one
    ///
    /// The meter is requested right away, under the instrumentation scope.
    pub fn with_meter_provider(mut self, provider: &impl MeterProvider) -> Self {
        self.provider_meter = Some(scoped_meter(provider));
        self
    }

    /// Use this meter directly; takes precedence over any meter provider
    pub fn with_meter(mut self, meter: Meter) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Report every node under this `pool.name` instead of its address
    pub fn with_pool_name(mut self, pool_name: impl Into<String>) -> Self {
        self.pool_name = Some(pool_name.into());
        self
    }

    /// Add static attributes to every measurement
    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = KeyValue>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Unregister all pool callbacks once this token is cancelled
    pub fn with_close_signal(mut self, signal: CancellationToken) -> Self {
        self.close_signal = Some(signal);
        self
    }

    /// Route asynchronous errors to this handler instead of the log
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Resolve the options into the configuration shared by all nodes
    pub fn into_config(self) -> MetricsConfig {
        let meter = self
            .meter
            .or(self.provider_meter)
            .unwrap_or_else(|| scoped_meter(&global::meter_provider()));

        MetricsConfig {
            meter,
            attributes: self.attributes,
            pool_name: self.pool_name.filter(|name| !name.is_empty()),
            close_signal: self.close_signal,
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(LogErrorHandler) as Arc<dyn ErrorHandler>),
        }
    }
}

fn scoped_meter(provider: &impl MeterProvider) -> Meter {
    provider.versioned_meter(
        INSTRUMENTATION_NAME,
        Some(env!("CARGO_PKG_VERSION")),
        None::<&'static str>,
        None,
    )
}

/// Resolved, immutable instrumentation configuration
pub struct MetricsConfig {
    meter: Meter,
    attributes: Vec<KeyValue>,
    pool_name: Option<String>,
    close_signal: Option<CancellationToken>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl MetricsConfig {
    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Static attributes attached to every measurement
    pub fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }

    /// Explicit pool name, if one was configured
    pub fn pool_name(&self) -> Option<&str> {
        self.pool_name.as_deref()
    }

    pub fn close_signal(&self) -> Option<&CancellationToken> {
        self.close_signal.as_ref()
    }

    pub fn error_handler(&self) -> &dyn ErrorHandler {
        &*self.error_handler
    }

    pub(crate) fn shared_error_handler(&self) -> Arc<dyn ErrorHandler> {
        self.error_handler.clone()
    }
}
