//! kvmetrics core - Client-side abstractions observed by the metrics instrumentation
//!
//! This crate defines the narrow surface a key-value store client exposes so
//! that its connection pool and command pipeline can be observed:
//!
//! - `NodeClient` - A single-endpoint client with a connection pool
//! - `NodeDiscovery` - Multi-node clients that announce new per-node clients
//! - `UniversalClient` - Any client handle, resolved to a `Topology`
//! - `Hook` / `HookChain` - Interception of dial, command and pipeline execution
//! - `PoolStats` / `ClientOptions` - Pool statistics and configured pool sizes

mod client;
mod error;
pub mod hook;
pub mod pool;

pub use client::*;
pub use error::*;
pub use hook::{
    AsyncConn, BoxedConn, Command, DialHook, DialTarget, Hook, HookChain, ProcessHook,
    ProcessPipelineHook, Reply,
};
pub use pool::{ClientOptions, PoolStats};
