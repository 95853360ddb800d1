//! Client handles and their topologies

use std::sync::Arc;

use crate::hook::Hook;
use crate::pool::{ClientOptions, PoolStats};

/// A client bound to a single server endpoint with its own connection pool
///
/// Multi-node clients create one of these per node they talk to.
pub trait NodeClient: Send + Sync {
    /// Options the client was created with
    fn options(&self) -> &ClientOptions;

    /// Take a fresh snapshot of the connection pool statistics
    fn pool_stats(&self) -> PoolStats;

    /// Register a hook around dial, command and pipeline execution
    fn add_hook(&self, hook: Arc<dyn Hook>);
}

/// Callback invoked with each per-node client a multi-node client creates
pub type NewNodeCallback = Arc<dyn Fn(Arc<dyn NodeClient>) + Send + Sync>;

/// A multi-node client (cluster or ring) that discovers nodes at runtime
pub trait NodeDiscovery: Send + Sync {
    /// Subscribe to newly created per-node clients
    ///
    /// The callback may fire on any thread, concurrently with other calls,
    /// for the whole lifetime of the client.
    fn on_new_node(&self, callback: NewNodeCallback);
}

/// The shape of a client handle
pub enum Topology {
    /// A single endpoint
    Single(Arc<dyn NodeClient>),
    /// A sharded cluster whose nodes are discovered from the servers
    Cluster(Arc<dyn NodeDiscovery>),
    /// A client-side sharded ring of independent servers
    Ring(Arc<dyn NodeDiscovery>),
    /// Any other client kind, e.g. a failover client or a raw connection
    Other,
}

impl Topology {
    /// Short name of the topology
    pub fn kind(&self) -> &'static str {
        match self {
            Topology::Single(_) => "single",
            Topology::Cluster(_) => "cluster",
            Topology::Ring(_) => "ring",
            Topology::Other => "other",
        }
    }
}

/// Any key-value store client handle
pub trait UniversalClient: Send + Sync {
    /// Resolve the handle into its topology
    fn topology(&self) -> Topology;

    /// Name of the concrete client type, used in error messages
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Discovery;

    impl NodeDiscovery for Discovery {
        fn on_new_node(&self, _callback: NewNodeCallback) {}
    }

    #[test]
    fn test_topology_kind() {
        assert_eq!(Topology::Cluster(Arc::new(Discovery)).kind(), "cluster");
        assert_eq!(Topology::Ring(Arc::new(Discovery)).kind(), "ring");
        assert_eq!(Topology::Other.kind(), "other");
    }
}
