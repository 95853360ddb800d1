//! Observable pool statistics

use std::any::Any;
use std::sync::Arc;

use kvmetrics_core::{ClientOptions, NodeClient, PoolStats};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{
    AsyncInstrument, CallbackRegistration, Meter, ObservableUpDownCounter, Observer,
};

use crate::error::Result;
use crate::labels::with_attribute;
use crate::semconv;


/// The seven observable instruments describing one pool
pub(crate) struct PoolInstruments {
    idle_max: ObservableUpDownCounter<i64>,
    idle_min: ObservableUpDownCounter<i64>,
    conns_max: ObservableUpDownCounter<i64>,
    usage: ObservableUpDownCounter<i64>,
    timeouts: ObservableUpDownCounter<i64>,
    hits: ObservableUpDownCounter<i64>,
    misses: ObservableUpDownCounter<i64>,
}

impl PoolInstruments {
    pub(crate) fn new(meter: &Meter) -> Result<Self> {
        Ok(Self {
            idle_max: up_down_counter(
                meter,
                semconv::CONNECTIONS_IDLE_MAX,
                "The maximum number of idle open connections allowed",
            )?,
            idle_min: up_down_counter(
                meter,
                semconv::CONNECTIONS_IDLE_MIN,
                "The minimum number of idle open connections allowed",
            )?,
            conns_max: up_down_counter(
                meter,
                semconv::CONNECTIONS_MAX,
                "The maximum number of open connections allowed",
            )?,
            usage: up_down_counter(
                meter,
                semconv::CONNECTIONS_USAGE,
                "The number of connections that are currently in state described by the state attribute",
            )?,
            timeouts: up_down_counter(
                meter,
                semconv::CONNECTIONS_TIMEOUTS,
                "The number of connection timeouts that have occurred trying to obtain a connection from the pool",
            )?,
            hits: up_down_counter(
                meter,
                semconv::CONNECTIONS_HITS,
                "The number of times free connection was found in the pool",
            )?,
            misses: up_down_counter(
                meter,
                semconv::CONNECTIONS_MISSES,
                "The number of times free connection was not found in the pool",
            )?,
        })
    }

    fn all(&self) -> [Arc<dyn Any>; 7] {
        [
            self.idle_max.as_any(),
            self.idle_min.as_any(),
            self.conns_max.as_any(),
            self.usage.as_any(),
            self.timeouts.as_any(),
            self.hits.as_any(),
            self.misses.as_any(),
        ]
    }
}

fn up_down_counter(
    meter: &Meter,
    name: &'static str,
    description: &'static str,
) -> Result<ObservableUpDownCounter<i64>> {
    let counter = meter
        .i64_observable_up_down_counter(name)
        .with_description(description)
        .try_init()?;
    Ok(counter)
}

/// Attribute sets for one pool, computed once at registration
pub(crate) struct PoolAttributes {
    base: Vec<KeyValue>,
    idle: Vec<KeyValue>,
    used: Vec<KeyValue>,
}

impl PoolAttributes {
    pub(crate) fn new(base: Vec<KeyValue>) -> Self {
        Self {
            idle: with_attribute(&base, KeyValue::new(semconv::STATE, semconv::STATE_IDLE)),
            used: with_attribute(&base, KeyValue::new(semconv::STATE, semconv::STATE_USED)),
            base,
        }
    }
}

/// Emit one observation set for a pool
///
/// Sizes come from the options the node was created with, everything else
/// from the statistics snapshot.
pub(crate) fn observe_pool(
    observer: &dyn Observer,
    instruments: &PoolInstruments,
    attributes: &PoolAttributes,
    options: &ClientOptions,
    stats: &PoolStats,
) {
    let base = attributes.base.as_slice();

    observer.observe_i64(&instruments.idle_max, i64::from(options.max_idle_conns()), base);
    observer.observe_i64(&instruments.idle_min, i64::from(options.min_idle_conns()), base);
    observer.observe_i64(&instruments.conns_max, i64::from(options.pool_size()), base);

    observer.observe_i64(&instruments.usage, i64::from(stats.idle_conns()), &attributes.idle);
    observer.observe_i64(&instruments.usage, i64::from(stats.used_conns()), &attributes.used);

    observer.observe_i64(&instruments.timeouts, i64::from(stats.timeouts()), base);
    observer.observe_i64(&instruments.hits, i64::from(stats.hits()), base);
    observer.observe_i64(&instruments.misses, i64::from(stats.misses()), base);
}

/// Report a node's pool statistics through observable instruments
///
/// Creates the pool instruments and registers a single callback for all of
/// them. Every invocation of the callback takes a fresh
/// [`NodeClient::pool_stats`] snapshot. Any failure aborts before the
/// callback is registered.
pub fn report_pool_stats(
    node: &Arc<dyn NodeClient>,
    meter: &Meter,
    attributes: Vec<KeyValue>,
) -> Result<Box<dyn CallbackRegistration>> {
    let instruments = PoolInstruments::new(meter)?;
    let attributes = PoolAttributes::new(attributes);
    let options = node.options().clone();
    let bound = instruments.all();

    let node = Arc::clone(node);
    let registration = meter.register_callback(&bound, move |observer: &dyn Observer| {
        let stats = node.pool_stats();
        observe_pool(observer, &instruments, &attributes, &options, &stats);
    })?;
    Ok(registration)
}
