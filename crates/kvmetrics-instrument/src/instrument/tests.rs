//! Tests for the instrumentation entry point

use std::time::Duration;

use kvmetrics_core::{ClientOptions, Command, PoolStats};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::noop::NoopMeterProvider;
use tokio_util::sync::CancellationToken;

use super::instrument_metrics;
use crate::config::{INSTRUMENTATION_NAME, MetricsOptions};
use crate::error::MetricsError;
use crate::semconv;
use crate::testing::{
    FailoverClient, MockClient, MockDiscovery, MockNode, Observed, ScriptedBackend, SumPoint,
    TestMetrics, attrs, error_log, eventually,
};

fn options(backend: &ScriptedBackend) -> MetricsOptions {
    MetricsOptions::new().with_meter(backend.meter())
}

/// Pool name of every registered node, in registration order
fn pool_names(observed: &[Observed]) -> Vec<String> {
    observed
        .chunks(8)
        .filter_map(|node| node[0].attribute(semconv::POOL_NAME))
        .collect()
}

// =============================================================================
// Topology dispatch
// =============================================================================

#[test]
fn test_single_node_registered_immediately() {
    let backend = ScriptedBackend::new();
    let node = MockNode::with_options(ClientOptions::new("10.0.0.1:6379").with_pool_size(16));
    node.set_stats(PoolStats::new(4, 1));

    instrument_metrics(&MockClient::Single(node.clone()), options(&backend)).expect("instrument");

    assert_eq!(node.hook_count(), 1);
    assert_eq!(backend.registration_count(), 1);
    let observed = backend.collect();
    assert_eq!(observed.len(), 8);
    assert_eq!(pool_names(&observed), vec!["10.0.0.1:6379"]);
}

#[test]
fn test_cluster_registers_nodes_as_they_appear() {
    let backend = ScriptedBackend::new();
    let cluster = MockDiscovery::new();

    instrument_metrics(&MockClient::Cluster(cluster.clone()), options(&backend))
        .expect("instrument");
    assert_eq!(cluster.subscriber_count(), 1);
    assert_eq!(backend.registration_count(), 0);

    let first = MockNode::new("10.0.0.1:7000");
    let second = MockNode::new("10.0.0.2:7001");
    cluster.add_node(&first);
    cluster.add_node(&second);

    assert_eq!(first.hook_count(), 1);
    assert_eq!(second.hook_count(), 1);
    assert_eq!(backend.registration_count(), 2);
    assert_eq!(
        pool_names(&backend.collect()),
        vec!["10.0.0.1:7000", "10.0.0.2:7001"]
    );
}

#[test]
fn test_ring_registers_nodes_as_they_appear() {
    let backend = ScriptedBackend::new();
    let ring = MockDiscovery::new();

    instrument_metrics(&MockClient::Ring(ring.clone()), options(&backend)).expect("instrument");

    let shard = MockNode::new("shard-a:6379");
    ring.add_node(&shard);

    assert_eq!(shard.hook_count(), 1);
    assert_eq!(pool_names(&backend.collect()), vec!["shard-a:6379"]);
}

#[test]
fn test_unsupported_client_registers_nothing() {
    let backend = ScriptedBackend::new();

    let err = instrument_metrics(&FailoverClient, options(&backend)).unwrap_err();

    match err {
        MetricsError::UnsupportedClient(type_name) => {
            assert!(type_name.ends_with("FailoverClient"), "{type_name}")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.registration_count(), 0);
}

// =============================================================================
// Meter resolution
// =============================================================================

#[tokio::test]
async fn test_meter_provider_used_when_no_meter_given() {
    let metrics = TestMetrics::new();
    let node = MockNode::new("10.0.0.1:6379");

    instrument_metrics(
        &MockClient::Single(node),
        MetricsOptions::new().with_meter_provider(metrics.provider()),
    )
    .expect("instrument");

    let snapshot = metrics.collect();
    assert_eq!(snapshot.scopes()[0].0, INSTRUMENTATION_NAME);
    assert_eq!(
        snapshot.sum_points(semconv::CONNECTIONS_MAX),
        vec![SumPoint {
            value: 10,
            attributes: attrs(&[("pool.name", "10.0.0.1:6379")]),
        }]
    );
}

#[tokio::test]
async fn test_global_provider_used_by_default() {
    let metrics = TestMetrics::new();
    global::set_meter_provider(metrics.provider().clone());

    let node = MockNode::new("10.0.0.1:6379");
    node.set_stats(PoolStats::new(2, 1).with_hits(4));
    let result = instrument_metrics(&MockClient::Single(node), MetricsOptions::new());
    let snapshot = metrics.collect();
    global::set_meter_provider(NoopMeterProvider::new());

    result.expect("instrument");
    assert_eq!(snapshot.scopes()[0].0, INSTRUMENTATION_NAME);
    let pool = attrs(&[("pool.name", "10.0.0.1:6379")]);
    assert_eq!(
        snapshot.sum_points(semconv::CONNECTIONS_HITS),
        vec![SumPoint {
            value: 4,
            attributes: pool.clone(),
        }]
    );
    assert_eq!(snapshot.sum_points(semconv::CONNECTIONS_USAGE).len(), 2);
    for name in [
        semconv::CONNECTIONS_IDLE_MAX,
        semconv::CONNECTIONS_IDLE_MIN,
        semconv::CONNECTIONS_MAX,
        semconv::CONNECTIONS_TIMEOUTS,
        semconv::CONNECTIONS_MISSES,
    ] {
        let points = snapshot.sum_points(name);
        assert_eq!(points.len(), 1, "{name}");
        assert_eq!(points[0].attributes, pool, "{name}");
    }
}

// =============================================================================
// Attributes
// =============================================================================

#[test]
fn test_explicit_pool_name_applies_to_every_node() {
    let backend = ScriptedBackend::new();
    let cluster = MockDiscovery::new();
    instrument_metrics(
        &MockClient::Cluster(cluster.clone()),
        options(&backend).with_pool_name("sessions"),
    )
    .expect("instrument");

    cluster.add_node(&MockNode::new("10.0.0.1:7000"));
    cluster.add_node(&MockNode::new("10.0.0.2:7001"));

    assert_eq!(pool_names(&backend.collect()), vec!["sessions", "sessions"]);
}

#[tokio::test(start_paused = true)]
async fn test_custom_attributes_on_pool_and_latency_metrics() {
    let metrics = TestMetrics::new();
    let node = MockNode::new("10.0.0.1:6379");
    instrument_metrics(
        &MockClient::Single(node.clone()),
        MetricsOptions::new()
            .with_meter(metrics.meter())
            .with_attributes([KeyValue::new("service", "checkout")]),
    )
    .expect("instrument");

    node.command(Command::new("GET"), Duration::from_millis(2), false)
        .await
        .expect("command");

    let snapshot = metrics.collect();
    let base = attrs(&[("service", "checkout"), ("pool.name", "10.0.0.1:6379")]);
    let hits = snapshot.sum_points(semconv::CONNECTIONS_HITS);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].attributes, base);

    let points = snapshot.histogram_points(semconv::CONNECTIONS_USE_TIME);
    assert_eq!(points.len(), 1);
    let mut expected = base.clone();
    expected.insert("type".into(), "command".into());
    expected.insert("status".into(), "ok".into());
    assert_eq!(points[0].attributes, expected);
}

// =============================================================================
// Error routing
// =============================================================================

#[test]
fn test_single_node_failure_is_returned_and_nothing_attached() {
    let backend = ScriptedBackend::new().failing_registrations(1);
    let node = MockNode::new("10.0.0.1:6379");

    let result = instrument_metrics(&MockClient::Single(node.clone()), options(&backend));

    assert!(matches!(result, Err(MetricsError::Meter(_))));
    assert_eq!(node.hook_count(), 0);
    assert_eq!(backend.registration_count(), 0);
}

#[test]
fn test_discovered_node_failure_goes_to_error_handler() {
    let backend = ScriptedBackend::new().failing_registrations(1);
    let (errors, handler) = error_log();
    let cluster = MockDiscovery::new();
    instrument_metrics(
        &MockClient::Cluster(cluster.clone()),
        options(&backend).with_error_handler(handler),
    )
    .expect("instrument");

    let broken = MockNode::new("10.0.0.1:7000");
    let healthy = MockNode::new("10.0.0.2:7001");
    cluster.add_node(&broken);
    cluster.add_node(&healthy);

    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("backend rejected callback"), "{}", errors[0]);
    assert_eq!(broken.hook_count(), 0);
    assert_eq!(healthy.hook_count(), 1);
    assert_eq!(pool_names(&backend.collect()), vec!["10.0.0.2:7001"]);
}

// =============================================================================
// Close signal
// =============================================================================

#[test]
fn test_close_signal_requires_runtime() {
    let backend = ScriptedBackend::new();
    let node = MockNode::new("10.0.0.1:6379");

    let result = instrument_metrics(
        &MockClient::Single(node.clone()),
        options(&backend).with_close_signal(CancellationToken::new()),
    );

    assert!(matches!(result, Err(MetricsError::NoRuntime)));
    assert_eq!(node.hook_count(), 0);
}

#[tokio::test]
async fn test_close_signal_unregisters_single_node() {
    let backend = ScriptedBackend::new();
    let shutdown = CancellationToken::new();
    let node = MockNode::new("10.0.0.1:6379");
    instrument_metrics(
        &MockClient::Single(node.clone()),
        options(&backend).with_close_signal(shutdown.clone()),
    )
    .expect("instrument");
    assert_eq!(backend.collect().len(), 8);

    shutdown.cancel();
    eventually(|| backend.active_registration_count() == 0).await;

    assert_eq!(backend.unregister_counts(), vec![1]);
    assert!(backend.collect().is_empty());
    // Hooks stay attached for the lifetime of the node.
    assert_eq!(node.hook_count(), 1);
}

#[tokio::test]
async fn test_close_signal_unregisters_every_node_once_and_skips_later_nodes() {
    let backend = ScriptedBackend::new();
    let shutdown = CancellationToken::new();
    let (errors, handler) = error_log();
    let cluster = MockDiscovery::new();
    instrument_metrics(
        &MockClient::Cluster(cluster.clone()),
        options(&backend)
            .with_close_signal(shutdown.clone())
            .with_error_handler(handler),
    )
    .expect("instrument");

    for port in 7000..7003 {
        cluster.add_node(&MockNode::new(&format!("10.0.0.1:{port}")));
    }
    assert_eq!(backend.active_registration_count(), 3);

    shutdown.cancel();
    eventually(|| backend.active_registration_count() == 0).await;

    let late = MockNode::new("10.0.0.9:7009");
    cluster.add_node(&late);

    assert_eq!(backend.unregister_counts(), vec![1, 1, 1]);
    assert_eq!(backend.registration_count(), 3);
    assert_eq!(late.hook_count(), 0);
    assert!(backend.collect().is_empty());
    assert!(errors.lock().is_empty());
}

#[tokio::test]
async fn test_unregister_failures_reported_on_close() {
    let backend = ScriptedBackend::new().failing_unregister();
    let shutdown = CancellationToken::new();
    let (errors, handler) = error_log();
    let ring = MockDiscovery::new();
    instrument_metrics(
        &MockClient::Ring(ring.clone()),
        options(&backend)
            .with_close_signal(shutdown.clone())
            .with_error_handler(handler),
    )
    .expect("instrument");
    ring.add_node(&MockNode::new("shard-a:6379"));
    ring.add_node(&MockNode::new("shard-b:6379"));

    shutdown.cancel();
    eventually(|| errors.lock().len() == 2).await;

    assert_eq!(backend.unregister_counts(), vec![1, 1]);
    assert_eq!(backend.active_registration_count(), 0);
}

#[tokio::test]
async fn test_nodes_keep_reporting_without_close_signal() {
    let backend = ScriptedBackend::new();
    let cluster = MockDiscovery::new();
    instrument_metrics(&MockClient::Cluster(cluster.clone()), options(&backend))
        .expect("instrument");

    cluster.add_node(&MockNode::new("10.0.0.1:7000"));
    tokio::task::yield_now().await;

    assert_eq!(backend.active_registration_count(), 1);
    assert_eq!(backend.unregister_counts(), vec![0]);
}
