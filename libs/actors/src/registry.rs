//! Actor Registry
//!
//! Context-local table of actor definitions plus the single inbound
//! dispatcher that turns spawn events into running instances.
//!
//! A registry belongs to exactly one execution context and never leaves it.
//! The dispatcher is installed lazily by the first [`ActorRegistry::register`]
//! call; later registrations only add entries.

use crate::dispatch;
use crate::messages::SpawnEvent;
use crate::system::ActorDefinition;
use crate::transport::Port;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Where an inbound message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Posted by the owning thread pool
    Pool,
    /// Any other sender; never acted on
    External,
}

/// Message delivered to a context's inbound queue
#[derive(Debug)]
pub struct InboundMessage {
    pub origin: Origin,
    pub event: SpawnEvent,
}

impl InboundMessage {
    /// Wrap a spawn event posted by the pool
    pub fn trusted(event: SpawnEvent) -> Self {
        Self {
            origin: Origin::Pool,
            event,
        }
    }

    pub fn is_trusted(&self) -> bool {
        self.origin == Origin::Pool
    }
}

struct RegistryInner {
    context_name: String,
    definitions: RefCell<HashMap<String, ActorDefinition>>,
    inbound: RefCell<Option<mpsc::UnboundedReceiver<InboundMessage>>>,
    handler_installs: Cell<usize>,
    /// Endpoints for unknown actors, held so the spawning side stays pending
    unanswered: RefCell<Vec<Port>>,
}

/// Registry of actors this context can host
///
/// Cheap to clone; all clones share the same table. Must be used from inside
/// a [`tokio::task::LocalSet`].
#[derive(Clone)]
pub struct ActorRegistry {
    inner: Rc<RegistryInner>,
}

impl ActorRegistry {
    pub fn new(
        context_name: impl Into<String>,
        inbound: mpsc::UnboundedReceiver<InboundMessage>,
    ) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                context_name: context_name.into(),
                definitions: RefCell::new(HashMap::new()),
                inbound: RefCell::new(Some(inbound)),
                handler_installs: Cell::new(0),
                unanswered: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Make `definition` spawnable in this context
    ///
    /// A later registration under the same id replaces the earlier one.
    pub fn register(&self, definition: &ActorDefinition) {
        let replaced = self
            .inner
            .definitions
            .borrow_mut()
            .insert(definition.id().to_string(), definition.clone())
            .is_some();
        debug!(
            context = %self.inner.context_name,
            actor_id = definition.id(),
            replaced,
            "Registered actor"
        );

        let inbound = self.inner.inbound.borrow_mut().take();
        if let Some(inbound) = inbound {
            self.inner.handler_installs.set(self.inner.handler_installs.get() + 1);
            tokio::task::spawn_local(run_inbound(self.clone(), inbound));
            debug!(context = %self.inner.context_name, "Installed inbound handler");
        }
    }

    /// Number of times the inbound handler was installed (0 or 1)
    pub fn handler_installs(&self) -> usize {
        self.inner.handler_installs.get()
    }

    pub fn contains(&self, actor_id: &str) -> bool {
        self.inner.definitions.borrow().contains_key(actor_id)
    }

    /// Registered actor ids, sorted
    pub fn actor_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.definitions.borrow().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn context_name(&self) -> &str {
        &self.inner.context_name
    }

    /// Number of spawn requests left unanswered because the actor was unknown
    pub fn unanswered_spawns(&self) -> usize {
        self.inner.unanswered.borrow().len()
    }

    /// Handle one inbound message
    pub fn handle_inbound(&self, message: InboundMessage) {
        if !message.is_trusted() {
            warn!(
                context = %self.inner.context_name,
                actor_id = %message.event.actor_id,
                origin = ?message.origin,
                "Dropping spawn event from untrusted origin"
            );
            return;
        }

        let SpawnEvent {
            actor_id,
            args,
            port,
        } = message.event;

        let definition = self.inner.definitions.borrow().get(&actor_id).cloned();
        match definition {
            Some(definition) => {
                debug!(
                    context = %self.inner.context_name,
                    actor_id = %actor_id,
                    port = port.label(),
                    "Dispatching spawn event"
                );
                tokio::task::spawn_local(dispatch::serve_instance(
                    definition,
                    args,
                    port,
                    self.inner.context_name.clone(),
                ));
            }
            None => {
                error!(
                    context = %self.inner.context_name,
                    actor_id = %actor_id,
                    registered = ?self.actor_ids(),
                    "Actor is not registered in this context"
                );
                self.inner.unanswered.borrow_mut().push(port);
            }
        }
    }
}

impl fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("context_name", &self.inner.context_name)
            .field("actors", &self.actor_ids())
            .field("handler_installs", &self.handler_installs())
            .finish()
    }
}

async fn run_inbound(
    registry: ActorRegistry,
    mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
) {
    while let Some(message) = inbound.recv().await {
        registry.handle_inbound(message);
    }
    debug!(context = %registry.inner.context_name, "Inbound queue closed");
}
