//! Metric and attribute names emitted by the instrumentation
//!
//! These follow the database client connection metrics conventions and are
//! relied upon by dashboards, so they must not change.

pub const CONNECTIONS_IDLE_MAX: &str = "db.client.connections.idle.max";
pub const CONNECTIONS_IDLE_MIN: &str = "db.client.connections.idle.min";
pub const CONNECTIONS_MAX: &str = "db.client.connections.max";
pub const CONNECTIONS_USAGE: &str = "db.client.connections.usage";
pub const CONNECTIONS_TIMEOUTS: &str = "db.client.connections.timeouts";
pub const CONNECTIONS_HITS: &str = "db.client.connections.hits";
pub const CONNECTIONS_MISSES: &str = "db.client.connections.misses";
pub const CONNECTIONS_CREATE_TIME: &str = "db.client.connections.create_time";
pub const CONNECTIONS_USE_TIME: &str = "db.client.connections.use_time";

pub const POOL_NAME: &str = "pool.name";

pub const STATE: &str = "state";
pub const STATE_IDLE: &str = "idle";
pub const STATE_USED: &str = "used";

pub const TYPE: &str = "type";
pub const TYPE_COMMAND: &str = "command";
pub const TYPE_PIPELINE: &str = "pipeline";

pub const STATUS: &str = "status";
pub const STATUS_OK: &str = "ok";
pub const STATUS_ERROR: &str = "error";

/// Unit of the latency histograms
pub const UNIT_MILLISECONDS: &str = "ms";
