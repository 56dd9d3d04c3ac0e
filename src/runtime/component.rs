/// Component trait and the context handed to component callbacks
///
/// Every callback of a component runs on its hub thread, one at a time, so
/// component state needs no locking.
use serde_json::Value;
use std::time::Duration;

use crate::error::{BusError, ComponentError};
use crate::messaging::{CallResult, Message, MessageKind};

use super::app::{App, HubId};
use super::timers::{TimerId, TimerQueue};

/// A named unit of behaviour attached to a hub
///
/// Implement this trait to create inputs, detectors, scenes and outputs.
pub trait Component: Send {
    /// Unique name on the bus (for addressing and logging)
    fn name(&self) -> &str;

    /// Called once on the hub thread before the first message
    fn start(&mut self, _ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Handle a broadcast message
    ///
    /// Returning an error stops the component.
    fn receive(&mut self, message: &Message, ctx: &mut Context<'_>)
        -> Result<(), ComponentError>;

    /// A timer scheduled with [`Context::set_timeout`] fired
    fn on_timer(&mut self, _token: u64, _ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Names of the methods callable through [`App::call`]
    fn exports(&self) -> &'static [&'static str] {
        &[]
    }

    /// Run an exported method
    fn call(
        &mut self,
        method: &str,
        _args: &[Value],
        _ctx: &mut Context<'_>,
    ) -> Result<Value, ComponentError> {
        Err(BusError::UnknownMethod {
            component: self.name().to_string(),
            method: method.to_string(),
        }
        .into())
    }

    /// Release resources; owned background tasks must be joined before
    /// returning
    fn stop(&mut self, _ctx: &mut Context<'_>) {}
}

/// Handle given to a component while one of its callbacks runs
pub struct Context<'a> {
    app: &'a App,
    hub: HubId,
    name: &'a str,
    timers: &'a mut TimerQueue,
}

impl<'a> Context<'a> {
    pub(crate) fn new(app: &'a App, hub: HubId, name: &'a str, timers: &'a mut TimerQueue) -> Self {
        Self {
            app,
            hub,
            name,
            timers,
        }
    }

    /// Name of the component this context belongs to
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn hub(&self) -> HubId {
        self.hub
    }

    pub fn app(&self) -> &App {
        self.app
    }

    /// Broadcast a message with this component as its source
    pub fn send(&self, kind: MessageKind) {
        self.app.broadcast(Message::new(kind).from_component(self.name));
    }

    /// Broadcast a prepared message, filling in the source when missing
    pub fn send_message(&self, message: Message) {
        let message = if message.source().is_none() {
            message.from_component(self.name)
        } else {
            message
        };
        self.app.broadcast(message);
    }

    /// Sending handle for background tasks owned by this component
    pub fn sender(&self) -> BusSender {
        BusSender {
            app: self.app.clone(),
            source: self.name.to_string(),
        }
    }

    /// Schedule `on_timer(token)` after `after` elapses
    pub fn set_timeout(&mut self, after: Duration, token: u64) -> TimerId {
        self.timers.schedule(self.name, after, token)
    }

    pub fn cancel_timeout(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    /// Call an exported method and wait for its result.
    ///
    /// Calling a component on the same hub would block the thread that has to
    /// answer, so it is refused; use [`Context::call_with_reply`] instead.
    pub fn call(
        &self,
        target: &str,
        method: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> CallResult {
        if self.app.hub_of(target) == Some(self.hub) {
            return Err(BusError::ReentrantCall(target.to_string()));
        }
        self.app.call(target, method, args, timeout)
    }

    /// Call an exported method; the result arrives later as a `CallReply`
    /// message addressed to this component.
    pub fn call_with_reply(
        &self,
        target: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<u64, BusError> {
        self.app.call_with_reply(self.name, target, method, args)
    }
}

/// Cloneable sender bound to a component name
///
/// Background tasks use it to emit messages while their owner is busy.
#[derive(Clone)]
pub struct BusSender {
    app: App,
    source: String,
}

impl BusSender {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn send(&self, kind: MessageKind) {
        self.app
            .broadcast(Message::new(kind).from_component(self.source.as_str()));
    }

    pub fn send_message(&self, message: Message) {
        let message = if message.source().is_none() {
            message.from_component(self.source.as_str())
        } else {
            message
        };
        self.app.broadcast(message);
    }
}
