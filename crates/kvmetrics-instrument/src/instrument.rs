//! Entry point: attach metrics to a client and every node it discovers

use std::sync::Arc;

use kvmetrics_core::{NodeClient, NodeDiscovery, Topology, UniversalClient};
use opentelemetry::metrics::CallbackRegistration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::config::{MetricsConfig, MetricsOptions};
use crate::error::{ErrorHandler, MetricsError, Result};
use crate::hook::MetricsHook;
use crate::labels::node_attributes;
use crate::lifecycle::RegistrationSet;
use crate::pool_stats::report_pool_stats;

#[cfg(test)]
mod tests;

/// How a supported client gets its nodes registered
enum Target {
    /// Registered once, right away
    Single(Arc<dyn NodeClient>),
    /// Registered per node as the client creates them
    MultiNode(&'static str, Arc<dyn NodeDiscovery>),
}

/// Start reporting pool statistics and latencies for `client`
///
/// Single-endpoint clients are registered before this returns, and a
/// registration failure is returned. Cluster and ring clients register each
/// node when it is created; failures for those nodes go to the configured
/// [`ErrorHandler`] and do not affect other nodes.
///
/// With a close signal, cancelling it unregisters every pool-stats callback
/// created so far and stops registering new nodes. Hooks already attached to
/// nodes stay in place. The close signal requires a Tokio runtime.
pub fn instrument_metrics(client: &dyn UniversalClient, options: MetricsOptions) -> Result<()> {
    let topology = client.topology();
    let kind = topology.kind();
    let target = match topology {
        Topology::Single(node) => Target::Single(node),
        Topology::Cluster(discovery) | Topology::Ring(discovery) => {
            Target::MultiNode(kind, discovery)
        }
        Topology::Other => return Err(MetricsError::UnsupportedClient(client.type_name())),
    };

    let config = Arc::new(options.into_config());
    let session = match config.close_signal() {
        Some(signal) => {
            let runtime = Handle::try_current().map_err(|_| MetricsError::NoRuntime)?;
            Some((runtime, signal.clone(), Arc::new(RegistrationSet::new())))
        }
        None => None,
    };
    let registrations = session.as_ref().map(|(_, _, set)| Arc::clone(set));

    match target {
        Target::Single(node) => register_node(node, &config, registrations.as_deref())?,
        Target::MultiNode(kind, discovery) => {
            watch_new_nodes(&*discovery, Arc::clone(&config), registrations);
            tracing::debug!(topology = kind, "watching for new nodes");
        }
    }

    if let Some((runtime, signal, registrations)) = session {
        spawn_close_watcher(&runtime, signal, registrations, config.shared_error_handler());
    }
    Ok(())
}

/// Register every node the client creates from now on
fn watch_new_nodes(
    discovery: &dyn NodeDiscovery,
    config: Arc<MetricsConfig>,
    registrations: Option<Arc<RegistrationSet>>,
) {
    discovery.on_new_node(Arc::new(move |node: Arc<dyn NodeClient>| {
        if let Err(err) = register_node(node, &config, registrations.as_deref()) {
            config.error_handler().handle(err);
        }
    }));
}

/// Attach pool-stats reporting and the metrics hook to one node
///
/// When the session is already closed the node is skipped silently.
fn register_node(
    node: Arc<dyn NodeClient>,
    config: &MetricsConfig,
    registrations: Option<&RegistrationSet>,
) -> Result<()> {
    let Some(registrations) = registrations else {
        // Without a close signal the callback stays registered for good.
        attach_node(&node, config)?;
        return Ok(());
    };

    if !registrations.try_append(|| attach_node(&node, config))? {
        tracing::debug!(
            addr = node.options().addr(),
            "metrics session closed, node not instrumented"
        );
    }
    Ok(())
}

fn attach_node(
    node: &Arc<dyn NodeClient>,
    config: &MetricsConfig,
) -> Result<Box<dyn CallbackRegistration>> {
    let attributes = node_attributes(config.attributes(), config.pool_name(), node.options());

    let hook = MetricsHook::new(config.meter(), attributes.clone())?;
    let registration = report_pool_stats(node, config.meter(), attributes)?;
    node.add_hook(Arc::new(hook));

    tracing::debug!(addr = node.options().addr(), "node instrumented");
    Ok(registration)
}

fn spawn_close_watcher(
    runtime: &Handle,
    signal: CancellationToken,
    registrations: Arc<RegistrationSet>,
    error_handler: Arc<dyn ErrorHandler>,
) {
    runtime.spawn(async move {
        signal.cancelled().await;
        let unregistered = registrations.close_and_drain_all(&*error_handler);
        tracing::debug!(unregistered, "metrics session closed");
    });
}
