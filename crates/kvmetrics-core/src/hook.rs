//! Interception of connection establishment and command execution
//!
//! A client runs each dial, command and pipeline through three function
//! values. A [`Hook`] receives the next function of each kind and returns a
//! wrapped one, so hooks compose like middleware. [`HookChain`] keeps the
//! registered hooks and builds the composed functions, with the first-added
//! hook running outermost.
//!
//! # Example
//!
//! ```ignore
//! use kvmetrics_core::hook::{Command, HookChain};
//!
//! let chain = HookChain::new();
//! chain.add(Arc::new(MyHook));
//!
//! let process = chain.process(base_process);
//! let reply = process(Command::new("GET").arg("key")).await?;
//! ```

mod chain;
mod types;


pub use chain::{DialHook, Hook, HookChain, ProcessHook, ProcessPipelineHook};
pub use types::{AsyncConn, BoxedConn, Command, DialTarget, Reply};
