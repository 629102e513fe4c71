//! Thread Execution Context
//!
//! [`ThreadContext`] is the default [`ExecutionContext`]: a named OS thread
//! running a current-thread tokio runtime inside a [`LocalSet`]. Everything
//! scheduled on it runs cooperatively on that one thread, so actor state can
//! use `Rc` and `RefCell` freely.
//!
//! On start the thread builds its [`ActorRegistry`] and runs the
//! [`WorkerModule`], which registers the actors this context can host.

use crate::error::{ActorError, Result};
use crate::messages::SpawnEvent;
use crate::pool::ExecutionContext;
use crate::registry::{ActorRegistry, InboundMessage};
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;
use tracing::{debug, info};

/// Startup routine run once inside every worker context
pub type WorkerModule = Arc<dyn Fn(&ActorRegistry) + Send + Sync>;

/// Wrap a registration closure as a [`WorkerModule`]
pub fn worker_module<F>(f: F) -> WorkerModule
where
    F: Fn(&ActorRegistry) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Worker thread hosting actor instances
///
/// The thread runs until this value is dropped.
pub struct ThreadContext {
    name: String,
    inbox: mpsc::UnboundedSender<InboundMessage>,
    _keepalive: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

impl ThreadContext {
    /// Start a worker thread named `name` and run `module` on it
    pub fn spawn(name: impl Into<String>, module: WorkerModule) -> Result<Self> {
        let name = name.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ActorError::context_with_source(format!("runtime for {}", name), e))?;

        let (inbox, inbound) = mpsc::unbounded_channel();
        let (keepalive, released) = oneshot::channel::<()>();

        let thread_name = name.clone();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let local = LocalSet::new();
                local.block_on(&runtime, async move {
                    let registry = ActorRegistry::new(thread_name.clone(), inbound);
                    module(&registry);
                    info!(
                        context = %thread_name,
                        actors = ?registry.actor_ids(),
                        "Worker context started"
                    );
                    // Resolves with an error once the owning ThreadContext is dropped
                    let _ = released.await;
                    debug!(context = %thread_name, "Worker context stopping");
                });
            })
            .map_err(|e| ActorError::context_with_source(format!("thread {}", name), e))?;

        Ok(Self {
            name,
            inbox,
            _keepalive: keepalive,
            thread,
        })
    }

    /// False once the worker thread has exited
    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }
}

impl ExecutionContext for ThreadContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, event: SpawnEvent) -> Result<()> {
        self.inbox
            .send(InboundMessage::trusted(event))
            .map_err(|_| ActorError::context(format!("context {} is not running", self.name)))
    }
}

impl fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadContext")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
