//! Remote Actor Handles
//!
//! A [`RemoteHandle`] is the caller's view of an actor instance living in a
//! pool context. It knows no method list up front: any name can be looked up
//! with [`RemoteHandle::get`] or called directly with [`RemoteHandle::call`],
//! and every call becomes a correlated request/response pair on the
//! instance's private channel.
//!
//! # Correlation
//!
//! ```text
//! call("add", (2, 3))
//!   ├─ callId = next_call_id++          (0, 1, 2, ... per handle)
//!   ├─ pending[callId] = oneshot sender
//!   └─ post CallRequest { callId, method, args }
//!
//! response pump (one task per handle)
//!   ├─ CallResponse { callId, .. } → pending.remove(callId) → resolve/reject
//!   └─ unknown callId             → logged, dropped
//! ```
//!
//! Responses may arrive in any order. Nothing here times out.

use crate::error::{ActorError, ErrorValue, Result};
use crate::messages::{decode, encode_args, Args, CallRequest, CallResponse};
use crate::metrics::PoolMetrics;
use crate::transport::{PortReceiver, PortSender};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// Reserved name that never resolves to a method
///
/// Lookups of this name return `None` so a handle is never mistaken for an
/// awaitable value by code that probes for it.
pub const AWAIT_PROBE: &str = "then";

type Resolver = oneshot::Sender<std::result::Result<Value, ErrorValue>>;

/// Resolvers for calls that have been sent but not answered
#[derive(Debug, Default)]
pub(crate) struct PendingCalls {
    resolvers: Mutex<HashMap<u64, Resolver>>,
}

impl PendingCalls {
    fn register(&self, call_id: u64) -> oneshot::Receiver<std::result::Result<Value, ErrorValue>> {
        let (tx, rx) = oneshot::channel();
        self.resolvers.lock().insert(call_id, tx);
        rx
    }

    fn remove(&self, call_id: u64) {
        self.resolvers.lock().remove(&call_id);
    }

    /// Settle the matching call; false when no resolver exists for it
    fn resolve(&self, response: CallResponse) -> bool {
        let resolver = self.resolvers.lock().remove(&response.call_id);
        match resolver {
            Some(tx) => {
                // The caller may have stopped waiting; that is not an error here
                let _ = tx.send(response.into_outcome());
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.resolvers.lock().len()
    }

    fn clear(&self) {
        self.resolvers.lock().clear();
    }
}

struct HandleInner {
    actor_id: Arc<str>,
    context_index: usize,
    instance_id: Uuid,
    sender: PortSender,
    next_call_id: AtomicU64,
    pending: Arc<PendingCalls>,
    metrics: Arc<PoolMetrics>,
    pump: JoinHandle<()>,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Client-side proxy for a remote actor instance
///
/// Clones share the same channel, call counter and pending table. The
/// instance is released once the last clone is dropped.
#[derive(Clone)]
pub struct RemoteHandle {
    inner: Arc<HandleInner>,
}

impl RemoteHandle {
    /// Take over the caller's endpoint after a successful handshake
    pub(crate) fn attach(
        actor_id: Arc<str>,
        context_index: usize,
        sender: PortSender,
        receiver: PortReceiver,
        metrics: Arc<PoolMetrics>,
    ) -> Self {
        let instance_id = Uuid::new_v4();
        let pending = Arc::new(PendingCalls::default());
        let pump = tokio::spawn(pump_responses(
            receiver,
            Arc::clone(&pending),
            Arc::clone(&metrics),
            Arc::clone(&actor_id),
            instance_id,
        ));

        Self {
            inner: Arc::new(HandleInner {
                actor_id,
                context_index,
                instance_id,
                sender,
                next_call_id: AtomicU64::new(0),
                pending,
                metrics,
                pump,
            }),
        }
    }

    pub fn actor_id(&self) -> &str {
        &self.inner.actor_id
    }

    /// Pool index of the context hosting this instance
    pub fn context_index(&self) -> usize {
        self.inner.context_index
    }

    /// Unique id of this instance, used to correlate log lines
    pub fn instance_id(&self) -> Uuid {
        self.inner.instance_id
    }

    /// Number of calls still waiting for a response
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    /// Look up a method by name
    ///
    /// Every name resolves to a [`BoundMethod`] except [`AWAIT_PROBE`]. Whether
    /// the method exists is only known once it is called.
    pub fn get(&self, name: &str) -> Option<BoundMethod> {
        if name == AWAIT_PROBE {
            return None;
        }
        Some(BoundMethod {
            handle: self.clone(),
            method: name.to_string(),
        })
    }

    /// Call a method with serializable arguments
    ///
    /// Tuples are spread into positional arguments. The request is sent
    /// before this returns, so call ids follow issue order even if the
    /// returned futures are awaited in a different order.
    pub fn call<A: Serialize>(&self, method: &str, args: A) -> PendingCall {
        match encode_args(args) {
            Ok(args) => self.call_args(method, args),
            Err(e) => PendingCall::failed(None, e),
        }
    }

    /// Call a method with an already built argument list
    pub fn call_args(&self, method: &str, args: Args) -> PendingCall {
        let inner = &self.inner;
        let call_id = inner.next_call_id.fetch_add(1, Ordering::SeqCst);
        let rx = inner.pending.register(call_id);
        inner.metrics.record_call_issued();

        let request = CallRequest {
            call_id,
            method: method.to_string(),
            args,
        };
        if let Err(e) = inner.sender.post_message(&request) {
            inner.pending.remove(call_id);
            inner.metrics.record_call_failed();
            warn!(
                actor_id = %inner.actor_id,
                instance_id = %inner.instance_id,
                call_id,
                method,
                error = %e,
                "Failed to send actor call"
            );
            return PendingCall::failed(Some(call_id), e);
        }

        trace!(
            actor_id = %inner.actor_id,
            instance_id = %inner.instance_id,
            call_id,
            method,
            "Sent actor call"
        );
        PendingCall {
            call_id: Some(call_id),
            state: PendingState::Waiting {
                rx,
                metrics: Arc::clone(&inner.metrics),
            },
        }
    }

    /// Call a method and decode its result into `R`
    pub async fn invoke<R, A>(&self, method: &str, args: A) -> Result<R>
    where
        R: DeserializeOwned,
        A: Serialize,
    {
        let value = self.call(method, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHandle")
            .field("actor_id", &self.inner.actor_id)
            .field("context_index", &self.inner.context_index)
            .field("instance_id", &self.inner.instance_id)
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}

/// A method name bound to a handle
#[derive(Clone, Debug)]
pub struct BoundMethod {
    handle: RemoteHandle,
    method: String,
}

impl BoundMethod {
    pub fn name(&self) -> &str {
        &self.method
    }

    pub fn call<A: Serialize>(&self, args: A) -> PendingCall {
        self.handle.call(&self.method, args)
    }
}

enum PendingState {
    Waiting {
        rx: oneshot::Receiver<std::result::Result<Value, ErrorValue>>,
        metrics: Arc<PoolMetrics>,
    },
    Failed(Option<ActorError>),
}

/// Future for one in-flight call
///
/// Resolves with the method's return value, or [`ActorError::Thrown`]
/// carrying exactly the error value the method produced.
pub struct PendingCall {
    call_id: Option<u64>,
    state: PendingState,
}

impl PendingCall {
    fn failed(call_id: Option<u64>, error: ActorError) -> Self {
        Self {
            call_id,
            state: PendingState::Failed(Some(error)),
        }
    }

    /// Correlation id assigned to this call, if it was sent
    pub fn call_id(&self) -> Option<u64> {
        self.call_id
    }
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            PendingState::Waiting { rx, metrics } => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(Ok(value))) => Poll::Ready(Ok(value)),
                Poll::Ready(Ok(Err(thrown))) => {
                    metrics.record_call_failed();
                    Poll::Ready(Err(ActorError::Thrown(thrown)))
                }
                Poll::Ready(Err(_)) => {
                    metrics.record_call_failed();
                    Poll::Ready(Err(ActorError::disconnected("actor channel")))
                }
                Poll::Pending => Poll::Pending,
            },
            PendingState::Failed(error) => {
                let error = error
                    .take()
                    .unwrap_or_else(|| ActorError::disconnected("actor channel"));
                Poll::Ready(Err(error))
            }
        }
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            PendingState::Waiting { .. } => "waiting",
            PendingState::Failed(_) => "failed",
        };
        f.debug_struct("PendingCall")
            .field("call_id", &self.call_id)
            .field("state", &state)
            .finish()
    }
}

/// Route every response on the channel to its pending call
async fn pump_responses(
    mut receiver: PortReceiver,
    pending: Arc<PendingCalls>,
    metrics: Arc<PoolMetrics>,
    actor_id: Arc<str>,
    instance_id: Uuid,
) {
    while let Some(frame) = receiver.recv_frame().await {
        let response: CallResponse = match decode(&frame) {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    actor_id = %actor_id,
                    instance_id = %instance_id,
                    error = %e,
                    "Dropping undecodable actor response"
                );
                continue;
            }
        };

        let call_id = response.call_id;
        if !pending.resolve(response) {
            metrics.record_orphan_response();
            error!(
                actor_id = %actor_id,
                instance_id = %instance_id,
                call_id,
                "Failed to find actor resolver for call"
            );
        }
    }

    debug!(
        actor_id = %actor_id,
        instance_id = %instance_id,
        outstanding = pending.len(),
        "Actor channel closed"
    );
    pending.clear();
}
