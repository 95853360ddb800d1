//! Hook trait and hook composition

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;

use super::types::{BoxedConn, Command, DialTarget, Reply};
use crate::Result;

/// Establishes a new pooled connection
pub type DialHook = Arc<dyn Fn(DialTarget) -> BoxFuture<'static, Result<BoxedConn>> + Send + Sync>;

/// Executes a single command
pub type ProcessHook = Arc<dyn Fn(Command) -> BoxFuture<'static, Result<Reply>> + Send + Sync>;

/// Executes a batch of commands in one round trip
pub type ProcessPipelineHook =
    Arc<dyn Fn(Vec<Command>) -> BoxFuture<'static, Result<Vec<Reply>>> + Send + Sync>;

/// Wraps the dial, command and pipeline execution of a client
///
/// Each method receives the next function in the chain and returns the
/// function to call instead. The default implementations pass `next`
/// through unchanged.
pub trait Hook: Send + Sync {
    fn dial_hook(&self, next: DialHook) -> DialHook {
        next
    }

    fn process_hook(&self, next: ProcessHook) -> ProcessHook {
        next
    }

    fn process_pipeline_hook(&self, next: ProcessPipelineHook) -> ProcessPipelineHook {
        next
    }
}

/// Ordered set of hooks registered on a client
///
/// Hooks can be added at any time from any thread. Composed functions
/// only include the hooks registered when they were built.
#[derive(Default)]
pub struct HookChain {
    hooks: RwLock<Vec<Arc<dyn Hook>>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook; it runs inside all previously added hooks
    pub fn add(&self, hook: Arc<dyn Hook>) {
        let mut hooks = self.hooks.write();
        hooks.push(hook);
        tracing::debug!(hooks = hooks.len(), "hook added");
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Wrap `base` with every registered dial hook
    pub fn dial(&self, base: DialHook) -> DialHook {
        self.snapshot()
            .iter()
            .rev()
            .fold(base, |next, hook| hook.dial_hook(next))
    }

    /// Wrap `base` with every registered command hook
    pub fn process(&self, base: ProcessHook) -> ProcessHook {
        self.snapshot()
            .iter()
            .rev()
            .fold(base, |next, hook| hook.process_hook(next))
    }

    /// Wrap `base` with every registered pipeline hook
    pub fn process_pipeline(&self, base: ProcessPipelineHook) -> ProcessPipelineHook {
        self.snapshot()
            .iter()
            .rev()
            .fold(base, |next, hook| hook.process_pipeline_hook(next))
    }

    fn snapshot(&self) -> Vec<Arc<dyn Hook>> {
        self.hooks.read().clone()
    }
}
