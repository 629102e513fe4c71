//! Actor Definitions
//!
//! An actor is an identifier plus a factory. The factory takes constructor
//! arguments and produces a [`MethodTable`]: a set of named callables that
//! close over the actor's state.
//!
//! A definition can be spawned two ways:
//! - [`ActorDefinition::spawn_local`] runs the factory in the caller's own
//!   context and hands back the table. No channel, no serialization, and any
//!   long-running method blocks the caller
//! - [`ActorDefinition::spawn_remote`] routes the construction to the next
//!   pool context and returns a [`RemoteHandle`] once the handshake completes
//!
//! Remote spawning only works in contexts whose registry knows the same
//! definition (see [`ActorRegistry::register`](crate::registry::ActorRegistry::register)).

use crate::error::{ActorError, ErrorValue, Result};
use crate::handle::RemoteHandle;
use crate::messages::{encode_args, Args, SpawnEvent, SpawnResult};
use crate::pool::ThreadPool;
use crate::transport::{MessageChannel, PortReceiver};
use futures::future::{FutureExt, LocalBoxFuture};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a method invocation
pub type MethodResult = std::result::Result<Value, ErrorValue>;

/// Future returned by every method in a [`MethodTable`]
pub type MethodFuture = LocalBoxFuture<'static, MethodResult>;

/// Future returned by an actor factory
pub type FactoryFuture = LocalBoxFuture<'static, std::result::Result<MethodTable, ErrorValue>>;

type Method = Rc<dyn Fn(Args) -> MethodFuture>;

pub(crate) type Factory = Arc<dyn Fn(Args) -> FactoryFuture + Send + Sync>;

fn to_method_value<R: Serialize>(value: R) -> MethodResult {
    serde_json::to_value(value).map_err(|e| {
        ErrorValue::type_error(format!("method result is not serializable: {}", e))
    })
}

/// Named callables produced by an actor factory
///
/// Tables live in exactly one execution context. Methods run lazily: nothing
/// executes until the returned future is polled, so failures and panics
/// surface through the future.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, Method>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a synchronous method
    pub fn method<F, R>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Args) -> std::result::Result<R, ErrorValue> + 'static,
        R: Serialize,
    {
        let f = Rc::new(f);
        let method: Method = Rc::new(move |args| {
            let f = Rc::clone(&f);
            async move { f(args).and_then(to_method_value) }.boxed_local()
        });
        self.methods.insert(name.into(), method);
        self
    }

    /// Add an asynchronous method
    pub fn async_method<F, Fut, R>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Args) -> Fut + 'static,
        Fut: Future<Output = std::result::Result<R, ErrorValue>> + 'static,
        R: Serialize,
    {
        let f = Rc::new(f);
        let method: Method = Rc::new(move |args| {
            let f = Rc::clone(&f);
            async move { f(args).await.and_then(to_method_value) }.boxed_local()
        });
        self.methods.insert(name.into(), method);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Method names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke a method by name
    ///
    /// Unknown names fail the same way a call on a non-function would: with a
    /// `TypeError` value, not a panic.
    pub fn call(&self, name: &str, args: Args) -> MethodFuture {
        match self.methods.get(name) {
            Some(method) => method(args),
            None => {
                let error =
                    ErrorValue::type_error(format!("actor method `{}` is not a function", name));
                futures::future::ready(Err(error)).boxed_local()
            }
        }
    }

    /// Invoke a method with serializable arguments and decode its result
    pub async fn invoke<R, A>(&self, name: &str, args: A) -> std::result::Result<R, ErrorValue>
    where
        R: DeserializeOwned,
        A: Serialize,
    {
        let args = encode_args(args).map_err(|e| ErrorValue::type_error(e.to_string()))?;
        let value = self.call(name, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.names())
            .finish()
    }
}

/// An actor identifier bound to its factory
#[derive(Clone)]
pub struct ActorDefinition {
    id: Arc<str>,
    factory: Factory,
}

impl ActorDefinition {
    /// Define an actor with a synchronous factory
    pub fn new<F>(id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Args) -> std::result::Result<MethodTable, ErrorValue> + Send + Sync + 'static,
    {
        let factory = Arc::new(factory);
        Self {
            id: Arc::from(id.into()),
            factory: Arc::new(move |args| {
                let factory = Arc::clone(&factory);
                async move { factory(args) }.boxed_local()
            }),
        }
    }

    /// Define an actor whose factory completes asynchronously
    pub fn new_async<F, Fut>(id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<MethodTable, ErrorValue>> + 'static,
    {
        let factory = Arc::new(factory);
        Self {
            id: Arc::from(id.into()),
            factory: Arc::new(move |args| {
                let factory = Arc::clone(&factory);
                async move { factory(args).await }.boxed_local()
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run the factory in the current context
    pub(crate) fn instantiate(&self, args: Args) -> FactoryFuture {
        (self.factory)(args)
    }

    /// Instantiate the actor in the caller's own context
    pub async fn spawn_local<A: Serialize>(&self, args: A) -> Result<MethodTable> {
        let args = encode_args(args)?;
        debug!(actor_id = %self.id, args = args.len(), "Spawning local actor");
        self.instantiate(args).await.map_err(ActorError::Thrown)
    }

    /// Instantiate the actor in the next pool context
    ///
    /// Resolves once the context reports that construction finished. A
    /// constructor failure comes back as [`ActorError::Thrown`] carrying the
    /// constructor's own error value. There is no timeout: if the context
    /// never answers, neither does this future.
    pub async fn spawn_remote<A: Serialize>(&self, pool: &ThreadPool, args: A) -> Result<RemoteHandle> {
        let args = encode_args(args)?;
        let (context_index, context) = pool.next_context()?;
        let MessageChannel { port1, port2 } = MessageChannel::new();

        debug!(
            actor_id = %self.id,
            context = context.name(),
            context_index,
            args = args.len(),
            "Spawning remote actor"
        );

        context.post(SpawnEvent {
            actor_id: self.id.to_string(),
            args,
            port: port1,
        })?;

        let (sender, mut receiver) = port2.split();
        let metrics = pool.metrics();
        let handshake = await_handshake(&mut receiver).await;
        metrics.record_spawn(handshake.is_ok());

        if let Err(e) = handshake {
            warn!(
                actor_id = %self.id,
                context = context.name(),
                error = %e,
                error_category = e.category(),
                "Remote actor spawn failed"
            );
            return Err(e);
        }

        let handle = RemoteHandle::attach(
            Arc::clone(&self.id),
            context_index,
            sender,
            receiver,
            metrics,
        );
        debug!(
            actor_id = %self.id,
            context = context.name(),
            instance_id = %handle.instance_id(),
            "Remote actor spawned"
        );
        Ok(handle)
    }
}

impl fmt::Debug for ActorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorDefinition").field("id", &self.id).finish()
    }
}

/// Wait for the first message on a fresh channel
async fn await_handshake(receiver: &mut PortReceiver) -> Result<()> {
    let result: SpawnResult = match receiver.recv_message().await {
        Some(result) => result?,
        None => return Err(ActorError::disconnected(receiver.label())),
    };
    match result.error {
        Some(error) => Err(ActorError::Thrown(error)),
        None => Ok(()),
    }
}
