//! Worker Actors
//!
//! Round-robin actor runtime over a pool of worker threads. An actor is an id
//! plus a factory that builds a table of named methods. Spawning it remotely
//! runs the factory on the next pool context and hands back a
//! [`RemoteHandle`] whose calls travel as JSON frames over a private channel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐          ┌──────────────────────────────┐
//! │       Caller         │          │  ThreadContext (per thread)  │
//! │                      │  spawn   │                              │
//! │  ThreadPool ─────────┼─ event ─▶│  ActorRegistry               │
//! │  (round-robin)       │  +port   │    └─ inbound dispatcher     │
//! │                      │          │                              │
//! │  RemoteHandle        │◀─────────┼─ SpawnResult {} / {error}    │
//! │    call(m, args) ────┼─────────▶│  instance: MethodTable       │
//! │    pending[callId] ◀─┼──────────┼─ CallResponse {callId, ..}   │
//! └──────────────────────┘          └──────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use worker_actors::{
//!     create_local_thread_pool, worker_module, ActorDefinition, Args, ErrorValue, MethodTable,
//! };
//!
//! fn adder() -> ActorDefinition {
//!     ActorDefinition::new("adder", |_args| {
//!         Ok(MethodTable::new().method("add", |args: Args| {
//!             let (a, b): (i64, i64) = args.decode()?;
//!             Ok::<_, ErrorValue>(a + b)
//!         }))
//!     })
//! }
//!
//! # async fn run() -> worker_actors::Result<()> {
//! let pool = create_local_thread_pool(worker_module(|registry| registry.register(&adder())), 2)?;
//! let handle = adder().spawn_remote(&pool, ()).await?;
//! let sum: i64 = handle.invoke("add", (2, 3)).await?;
//! assert_eq!(sum, 5);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
mod dispatch;
pub mod error;
pub mod handle;
pub mod messages;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod system;
pub mod transport;

pub use config::PoolConfig;
pub use context::{worker_module, ThreadContext, WorkerModule};
pub use error::{ActorError, ErrorValue, Result};
pub use handle::{BoundMethod, PendingCall, RemoteHandle, AWAIT_PROBE};
pub use messages::{encode_args, Args, CallRequest, CallResponse, SpawnEvent, SpawnResult};
pub use metrics::{PoolMetrics, PoolStats};
pub use pool::{create_local_thread_pool, ExecutionContext, ThreadPool, DEFAULT_POOL_SIZE};
pub use registry::{ActorRegistry, InboundMessage, Origin};
pub use system::{ActorDefinition, MethodFuture, MethodResult, MethodTable};
pub use transport::{MessageChannel, Port, PortReceiver, PortSender};
