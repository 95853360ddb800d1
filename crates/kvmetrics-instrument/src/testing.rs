//! Mock clients and metrics backends shared by the unit tests

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use kvmetrics_core::{
    BoxedConn, ClientOptions, Command, DialHook, DialTarget, Hook, HookChain, KvError,
    NewNodeCallback, NodeClient, NodeDiscovery, PoolStats, ProcessHook, ProcessPipelineHook,
    Reply, Topology, UniversalClient,
};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{
    AsyncInstrument, CallbackRegistration, InstrumentProvider, Meter, MeterProvider as _,
    MetricsError as OtelError, Observer,
};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider, data};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::testing::metrics::InMemoryMetricsExporter;
use parking_lot::Mutex;

use crate::error::{ErrorHandler, MetricsError};

/// Single-endpoint client with a scripted pool and server
pub(crate) struct MockNode {
    options: ClientOptions,
    stats: Mutex<PoolStats>,
    hooks: HookChain,
}

impl MockNode {
    pub(crate) fn new(addr: &str) -> Arc<Self> {
        Self::with_options(ClientOptions::new(addr))
    }

    pub(crate) fn with_options(options: ClientOptions) -> Arc<Self> {
        Arc::new(Self {
            options,
            stats: Mutex::new(PoolStats::default()),
            hooks: HookChain::new(),
        })
    }

    pub(crate) fn set_stats(&self, stats: PoolStats) {
        *self.stats.lock() = stats;
    }

    pub(crate) fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) async fn dial(
        &self,
        latency: Duration,
        fail: bool,
    ) -> kvmetrics_core::Result<BoxedConn> {
        let base: DialHook = Arc::new(move |target: DialTarget| {
            async move {
                tokio::time::sleep(latency).await;
                if fail {
                    let reason = format!("connection refused: {}", target.addr);
                    return Err(KvError::Connection(reason));
                }
                let (stream, _server) = tokio::io::duplex(64);
                Ok(Box::new(stream) as BoxedConn)
            }
            .boxed()
        });
        self.hooks.dial(base)(DialTarget::tcp(self.options.addr())).await
    }

    pub(crate) async fn command(
        &self,
        cmd: Command,
        latency: Duration,
        fail: bool,
    ) -> kvmetrics_core::Result<Reply> {
        let base: ProcessHook = Arc::new(move |cmd: Command| {
            async move {
                tokio::time::sleep(latency).await;
                if fail {
                    let reason = format!("ERR unknown command '{}'", cmd.name());
                    return Err(KvError::Command(reason));
                }
                Ok(Reply::Status("OK".into()))
            }
            .boxed()
        });
        self.hooks.process(base)(cmd).await
    }

    pub(crate) async fn pipeline(
        &self,
        cmds: Vec<Command>,
        latency: Duration,
        fail: bool,
    ) -> kvmetrics_core::Result<Vec<Reply>> {
        let base: ProcessPipelineHook = Arc::new(move |cmds: Vec<Command>| {
            async move {
                tokio::time::sleep(latency).await;
                if fail {
                    return Err(KvError::Timeout("pipeline read timed out".into()));
                }
                Ok(cmds.iter().map(|_| Reply::Status("OK".into())).collect())
            }
            .boxed()
        });
        self.hooks.process_pipeline(base)(cmds).await
    }
}

impl NodeClient for MockNode {
    fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn pool_stats(&self) -> PoolStats {
        *self.stats.lock()
    }

    fn add_hook(&self, hook: Arc<dyn Hook>) {
        self.hooks.add(hook);
    }
}

/// Cluster or ring topology whose nodes are added by the test
#[derive(Default)]
pub(crate) struct MockDiscovery {
    callbacks: Mutex<Vec<NewNodeCallback>>,
}

impl MockDiscovery {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Announce a newly created node to every subscriber
    pub(crate) fn add_node(&self, node: &Arc<MockNode>) {
        let node: Arc<dyn NodeClient> = node.clone();
        let callbacks = self.callbacks.lock().clone();
        for callback in callbacks {
            callback(node.clone());
        }
    }
}

impl NodeDiscovery for MockDiscovery {
    fn on_new_node(&self, callback: NewNodeCallback) {
        self.callbacks.lock().push(callback);
    }
}

pub(crate) enum MockClient {
    Single(Arc<MockNode>),
    Cluster(Arc<MockDiscovery>),
    Ring(Arc<MockDiscovery>),
}

impl UniversalClient for MockClient {
    fn topology(&self) -> Topology {
        match self {
            MockClient::Single(node) => Topology::Single(node.clone()),
            MockClient::Cluster(discovery) => Topology::Cluster(discovery.clone()),
            MockClient::Ring(discovery) => Topology::Ring(discovery.clone()),
        }
    }
}

/// Client kind the instrumentation does not support
pub(crate) struct FailoverClient;

impl UniversalClient for FailoverClient {
    fn topology(&self) -> Topology {
        Topology::Other
    }
}

/// Attributes of a collected data point, keyed by attribute name
pub(crate) type Attrs = BTreeMap<String, String>;

pub(crate) fn attrs(pairs: &[(&str, &str)]) -> Attrs {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn to_attrs(attributes: &[KeyValue]) -> Attrs {
    attributes
        .iter()
        .map(|kv| (kv.key.as_str().to_string(), kv.value.as_str().into_owned()))
        .collect()
}

/// SDK meter provider exporting into memory on demand
///
/// Must be created inside a Tokio runtime.
pub(crate) struct TestMetrics {
    provider: SdkMeterProvider,
    exporter: InMemoryMetricsExporter,
}

impl TestMetrics {
    pub(crate) fn new() -> Self {
        let exporter = InMemoryMetricsExporter::default();
        let reader = PeriodicReader::builder(exporter.clone(), runtime::TokioCurrentThread).build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        Self { provider, exporter }
    }

    pub(crate) fn provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    pub(crate) fn meter(&self) -> Meter {
        self.provider.meter("kvmetrics-test")
    }

    /// Run one collection cycle and return what was exported
    pub(crate) fn collect(&self) -> Snapshot {
        self.exporter.reset();
        self.provider.force_flush().expect("flush metrics");
        let exported = self.exporter.get_finished_metrics().expect("exported metrics");

        let mut snapshot = Snapshot::default();
        let Some(resource_metrics) = exported.last() else {
            return snapshot;
        };
        for scope_metrics in &resource_metrics.scope_metrics {
            let scope = &scope_metrics.scope;
            snapshot.scopes.push((
                scope.name.to_string(),
                scope.version.as_ref().map(|version| version.to_string()),
            ));
            for metric in &scope_metrics.metrics {
                snapshot.metrics.push(MetricData::from_sdk(metric));
            }
        }
        snapshot
    }
}

/// One exported metric stream
#[derive(Debug, Clone)]
pub(crate) struct MetricData {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) unit: String,
    pub(crate) sums: Vec<SumPoint>,
    pub(crate) histograms: Vec<HistogramPoint>,
}

impl MetricData {
    fn from_sdk(metric: &data::Metric) -> Self {
        let aggregation = metric.data.as_any();
        let sums = aggregation
            .downcast_ref::<data::Sum<i64>>()
            .map(|sum| {
                sum.data_points
                    .iter()
                    .map(|point| SumPoint {
                        value: point.value,
                        attributes: to_attrs(&point.attributes),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let histograms = aggregation
            .downcast_ref::<data::Histogram<f64>>()
            .map(|histogram| {
                histogram
                    .data_points
                    .iter()
                    .map(|point| HistogramPoint {
                        count: point.count,
                        sum: point.sum,
                        attributes: to_attrs(&point.attributes),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: metric.name.to_string(),
            description: metric.description.to_string(),
            unit: metric.unit.to_string(),
            sums,
            histograms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SumPoint {
    pub(crate) value: i64,
    pub(crate) attributes: Attrs,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HistogramPoint {
    pub(crate) count: u64,
    pub(crate) sum: f64,
    pub(crate) attributes: Attrs,
}

/// Everything exported by one collection cycle
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    scopes: Vec<(String, Option<String>)>,
    metrics: Vec<MetricData>,
}

impl Snapshot {
    /// Scope name and version of every exported scope
    pub(crate) fn scopes(&self) -> &[(String, Option<String>)] {
        &self.scopes
    }

    pub(crate) fn metric(&self, name: &str) -> Option<&MetricData> {
        self.metrics.iter().find(|metric| metric.name == name)
    }

    pub(crate) fn sum_points(&self, name: &str) -> Vec<SumPoint> {
        self.metrics
            .iter()
            .filter(|metric| metric.name == name)
            .flat_map(|metric| metric.sums.iter().cloned())
            .collect()
    }

    pub(crate) fn histogram_points(&self, name: &str) -> Vec<HistogramPoint> {
        self.metrics
            .iter()
            .filter(|metric| metric.name == name)
            .flat_map(|metric| metric.histograms.iter().cloned())
            .collect()
    }
}

/// One observation made by a pool callback, in emission order
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Observed {
    pub(crate) value: i64,
    pub(crate) attributes: Vec<KeyValue>,
}

impl Observed {
    pub(crate) fn attribute(&self, key: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.as_str().into_owned())
    }
}

type SharedCallback = Arc<dyn Fn(&dyn Observer) + Send + Sync>;

struct CallbackSlot {
    callback: SharedCallback,
    active: bool,
    unregister_calls: u32,
}

#[derive(Default)]
struct BackendState {
    failing_registrations: AtomicUsize,
    failing_unregister: AtomicBool,
    callbacks: Mutex<Vec<CallbackSlot>>,
}

/// Instrument provider that keeps callbacks for manual collection
///
/// Instruments are no-ops; callback registration and unregistration can be
/// scripted to fail.
#[derive(Clone, Default)]
pub(crate) struct ScriptedBackend {
    state: Arc<BackendState>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reject the next `times` callback registrations
    pub(crate) fn failing_registrations(self, times: usize) -> Self {
        self.state.failing_registrations.store(times, Ordering::SeqCst);
        self
    }

    /// Report an error from every unregistration, after unregistering
    pub(crate) fn failing_unregister(self) -> Self {
        self.state.failing_unregister.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn meter(&self) -> Meter {
        Meter::new(Arc::new(ScriptedProvider(self.state.clone())))
    }

    /// Invoke every active callback once
    pub(crate) fn collect(&self) -> Vec<Observed> {
        let active: Vec<SharedCallback> = self
            .state
            .callbacks
            .lock()
            .iter()
            .filter(|slot| slot.active)
            .map(|slot| slot.callback.clone())
            .collect();

        let observer = RecordingObserver::default();
        for callback in active {
            callback(&observer);
        }
        observer.observed.into_inner()
    }

    pub(crate) fn registration_count(&self) -> usize {
        self.state.callbacks.lock().len()
    }

    pub(crate) fn active_registration_count(&self) -> usize {
        self.state
            .callbacks
            .lock()
            .iter()
            .filter(|slot| slot.active)
            .count()
    }

    /// How often each registration was unregistered, in registration order
    pub(crate) fn unregister_counts(&self) -> Vec<u32> {
        self.state
            .callbacks
            .lock()
            .iter()
            .map(|slot| slot.unregister_calls)
            .collect()
    }
}

struct ScriptedProvider(Arc<BackendState>);

impl InstrumentProvider for ScriptedProvider {
    fn register_callback(
        &self,
        _instruments: &[Arc<dyn Any>],
        callback: Box<dyn Fn(&dyn Observer) + Send + Sync>,
    ) -> opentelemetry::metrics::Result<Box<dyn CallbackRegistration>> {
        let rejected = self
            .0
            .failing_registrations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(OtelError::Other("backend rejected callback".into()));
        }

        let mut callbacks = self.0.callbacks.lock();
        callbacks.push(CallbackSlot {
            callback: Arc::from(callback),
            active: true,
            unregister_calls: 0,
        });
        Ok(Box::new(ScriptedRegistration {
            index: callbacks.len() - 1,
            state: self.0.clone(),
        }))
    }
}

struct ScriptedRegistration {
    index: usize,
    state: Arc<BackendState>,
}

impl CallbackRegistration for ScriptedRegistration {
    fn unregister(&mut self) -> opentelemetry::metrics::Result<()> {
        {
            let mut callbacks = self.state.callbacks.lock();
            let slot = &mut callbacks[self.index];
            slot.unregister_calls += 1;
            slot.active = false;
        }
        if self.state.failing_unregister.load(Ordering::SeqCst) {
            return Err(OtelError::Other("exporter already shut down".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingObserver {
    observed: Mutex<Vec<Observed>>,
}

impl Observer for RecordingObserver {
    fn observe_f64(&self, _: &dyn AsyncInstrument<f64>, _: f64, _: &[KeyValue]) {}

    fn observe_u64(&self, _: &dyn AsyncInstrument<u64>, _: u64, _: &[KeyValue]) {}

    fn observe_i64(&self, _: &dyn AsyncInstrument<i64>, value: i64, attributes: &[KeyValue]) {
        self.observed.lock().push(Observed {
            value,
            attributes: attributes.to_vec(),
        });
    }
}

/// Error handler collecting messages for assertions
pub(crate) fn error_log() -> (Arc<Mutex<Vec<String>>>, Arc<dyn ErrorHandler>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let handler: Arc<dyn ErrorHandler> =
        Arc::new(move |err: MetricsError| sink.lock().push(err.to_string()));
    (log, handler)
}

/// Yield to other tasks until `condition` holds
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
