/// Application container
///
/// The App owns every hub, keeps the directory of component names, and is the
/// single entry point for broadcasting messages and calling exported methods.
/// It is a cheap `Clone` handle; components reach it through their context.
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::BusError;
use crate::messaging::{CallRequest, CallResult, EventBus, Message, MessageKind, ReplyTo, SubscriberId};

use super::component::Component;
use super::hub::{Hub, HubEnvelope};

/// Identifier of a hub inside its App
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HubId(usize);

impl HubId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for HubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hub#{}", self.0)
    }
}

struct HubHandle {
    id: HubId,
    name: String,
    tx: Sender<HubEnvelope>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

struct AppInner {
    hubs: RwLock<Vec<Arc<HubHandle>>>,
    directory: RwLock<HashMap<String, HubId>>,
    taps: EventBus,
    next_call_id: AtomicU64,
}

#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AppInner {
                hubs: RwLock::new(Vec::new()),
                directory: RwLock::new(HashMap::new()),
                taps: EventBus::new(),
                next_call_id: AtomicU64::new(1),
            }),
        }
    }

    /// Start a new hub thread named `hub-<name>`
    pub fn add_hub(&self, name: &str) -> Result<HubId, BusError> {
        let (tx, rx) = unbounded();
        let mut hubs = self.inner.hubs.write();
        let id = HubId(hubs.len());

        let hub = Hub::new(id, name.to_string(), self.clone(), rx);
        let thread = thread::Builder::new()
            .name(format!("hub-{}", name))
            .spawn(move || hub.run())
            .map_err(BusError::ThreadSpawnFailed)?;

        hubs.push(Arc::new(HubHandle {
            id,
            name: name.to_string(),
            tx,
            thread: Mutex::new(Some(thread)),
        }));
        tracing::info!("Hub {} added ({})", name, id);
        Ok(id)
    }

    /// Attach a component to a hub; it starts on the hub thread
    pub fn add_component(&self, hub: HubId, component: Box<dyn Component>) -> Result<(), BusError> {
        let name = component.name().to_string();
        let handle = self.hub_handle(hub)?;

        {
            let mut directory = self.inner.directory.write();
            if directory.contains_key(&name) {
                return Err(BusError::DuplicateName(name));
            }
            directory.insert(name.clone(), hub);
        }

        if handle.tx.send(HubEnvelope::Spawn(component)).is_err() {
            self.forget(&name);
            return Err(BusError::HubClosed(handle.name.clone()));
        }
        tracing::debug!("Component {} queued on hub {}", name, handle.name);
        Ok(())
    }

    /// Deliver a message to every hub and every tap
    ///
    /// Messages are queued in broadcast order on each hub; the caller never
    /// blocks on a recipient.
    pub fn broadcast(&self, message: impl Into<Message>) {
        let message = Arc::new(message.into());
        tracing::trace!("Broadcast: {}", message.description());

        for hub in self.inner.hubs.read().iter() {
            // A closed hub has already stopped all of its components
            let _ = hub.tx.send(HubEnvelope::Deliver(Arc::clone(&message)));
        }
        self.inner.taps.publish(&message);
    }

    /// Call an exported method and block until it answers or `timeout` elapses
    ///
    /// Must not be used from the hub thread that owns `target`.
    pub fn call(&self, target: &str, method: &str, args: Vec<Value>, timeout: Duration) -> CallResult {
        let handle = self.handle_for(target)?;
        let (request, pending) = CallRequest::waiting(target, method, args);
        tracing::debug!("Call {}", request.description());

        handle
            .tx
            .send(HubEnvelope::Call(request))
            .map_err(|_| BusError::HubClosed(handle.name.clone()))?;
        pending.wait(timeout)
    }

    /// Call an exported method without blocking
    ///
    /// The result is broadcast as a `CallReply` message addressed to `caller`,
    /// carrying the returned call id.
    pub fn call_with_reply(
        &self,
        caller: &str,
        target: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<u64, BusError> {
        let handle = self.handle_for(target)?;
        let call_id = self.inner.next_call_id.fetch_add(1, Ordering::Relaxed);
        let request = CallRequest {
            target: target.to_string(),
            method: method.to_string(),
            args,
            reply: ReplyTo::Message {
                caller: caller.to_string(),
                call_id,
            },
        };
        tracing::debug!("Call {} (reply #{} to {})", request.description(), call_id, caller);

        handle
            .tx
            .send(HubEnvelope::Call(request))
            .map_err(|_| BusError::HubClosed(handle.name.clone()))?;
        Ok(call_id)
    }

    /// Observe every broadcast message from outside the hubs
    pub fn subscribe(&self) -> (Receiver<Arc<Message>>, SubscriberId) {
        self.inner.taps.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.taps.unsubscribe(id);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.directory.read().contains_key(name)
    }

    pub fn hub_of(&self, name: &str) -> Option<HubId> {
        self.inner.directory.read().get(name).copied()
    }

    /// Names of all live components, sorted
    pub fn component_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.directory.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn hub_count(&self) -> usize {
        self.inner.hubs.read().len()
    }

    /// Stop every component and join every hub thread
    ///
    /// Broadcasts `Shutdown`, then closes the hubs in order. Returns once all
    /// components have run their shutdown sequence.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down {} hubs", self.hub_count());
        self.broadcast(MessageKind::Shutdown);

        let hubs: Vec<Arc<HubHandle>> = self.inner.hubs.read().clone();
        for hub in &hubs {
            let _ = hub.tx.send(HubEnvelope::Close);
        }

        let current = thread::current().id();
        for hub in &hubs {
            let Some(thread) = hub.thread.lock().take() else {
                continue;
            };
            if thread.thread().id() == current {
                tracing::warn!("Hub {} cannot join itself; leaving it to exit", hub.name);
                continue;
            }
            if thread.join().is_err() {
                tracing::error!("Hub {} panicked", hub.name);
            } else {
                tracing::debug!("Hub {} joined ({})", hub.name, hub.id);
            }
        }
        tracing::info!("Shutdown complete");
    }

    /// Remove a stopped component from the directory
    pub(crate) fn forget(&self, name: &str) {
        self.inner.directory.write().remove(name);
    }

    fn hub_handle(&self, hub: HubId) -> Result<Arc<HubHandle>, BusError> {
        self.inner
            .hubs
            .read()
            .get(hub.0)
            .cloned()
            .ok_or(BusError::HubNotFound(hub.0))
    }

    fn handle_for(&self, target: &str) -> Result<Arc<HubHandle>, BusError> {
        let hub = self
            .hub_of(target)
            .ok_or_else(|| BusError::ComponentNotFound(target.to_string()))?;
        self.hub_handle(hub)
    }
}
