//! Thread Pool
//!
//! Fixed collection of execution contexts that remote actors are routed to,
//! one spawn at a time, round-robin. Contexts are never removed; calling
//! [`ThreadPool::initialize`] again appends more of them.

use crate::config::PoolConfig;
use crate::context::{ThreadContext, WorkerModule};
use crate::error::{ActorError, Result};
use crate::messages::SpawnEvent;
use crate::metrics::PoolMetrics;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Pool width used when none is configured
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Background execution context supplied by the host
///
/// A context accepts spawn events on its inbound queue. Everything after the
/// spawn event travels over the port carried inside it.
pub trait ExecutionContext: Send + Sync + fmt::Debug + 'static {
    /// Human readable context name
    fn name(&self) -> &str;

    /// Deliver a spawn event to the context's inbound queue
    fn post(&self, event: SpawnEvent) -> Result<()>;
}

#[derive(Debug, Default)]
struct PoolState {
    contexts: Vec<Arc<dyn ExecutionContext>>,
    next_thread: usize,
}

/// Round-robin pool of execution contexts
#[derive(Debug, Clone, Default)]
pub struct ThreadPool {
    state: Arc<Mutex<PoolState>>,
    metrics: Arc<PoolMetrics>,
}

impl ThreadPool {
    /// Create an empty pool; remote spawns fail until it is initialized
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool of [`ThreadContext`]s from configuration
    pub fn from_config(config: &PoolConfig, module: WorkerModule) -> Result<Self> {
        config.validate()?;
        let pool = Self::new();
        let prefix = config.thread_name_prefix.clone();
        pool.initialize(
            |index| ThreadContext::spawn(format!("{}-{}", prefix, index), module.clone()),
            config.threads,
        )?;
        Ok(pool)
    }

    /// Append `count` contexts produced by `factory`
    ///
    /// The factory receives the absolute pool index of the context it
    /// creates. Contexts created before a factory failure stay in the pool.
    pub fn initialize<F, C>(&self, mut factory: F, count: usize) -> Result<()>
    where
        F: FnMut(usize) -> Result<C>,
        C: ExecutionContext,
    {
        let mut state = self.state.lock();
        for _ in 0..count {
            let index = state.contexts.len();
            let context = factory(index)?;
            debug!(index, context = context.name(), "Added execution context to pool");
            state.contexts.push(Arc::new(context));
            self.metrics.track_contexts(state.contexts.len());
        }
        info!(pool_size = state.contexts.len(), added = count, "Thread pool initialized");
        Ok(())
    }

    /// Select the context at the cursor and advance the cursor
    pub fn next_context(&self) -> Result<(usize, Arc<dyn ExecutionContext>)> {
        let mut state = self.state.lock();
        if state.contexts.is_empty() {
            return Err(ActorError::PoolNotInitialized);
        }

        let index = state.next_thread;
        let context = Arc::clone(&state.contexts[index]);
        state.next_thread = (index + 1) % state.contexts.len();
        drop(state);

        self.metrics.record_routed(index);
        Ok((index, context))
    }

    pub fn len(&self) -> usize {
        self.state.lock().contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared counters for this pool and its handles
    pub fn metrics(&self) -> Arc<PoolMetrics> {
        Arc::clone(&self.metrics)
    }
}

/// Create a pool of `count` worker threads, each running `module` at startup
pub fn create_local_thread_pool(module: WorkerModule, count: usize) -> Result<ThreadPool> {
    let config = PoolConfig {
        threads: count,
        ..PoolConfig::default()
    };
    ThreadPool::from_config(&config, module)
}
