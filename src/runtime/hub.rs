/// Hub event loop
///
/// A hub is one OS thread that owns a group of components. Messages, calls,
/// new components and timer deadlines are all serialized through one channel,
/// so a component only ever sees one callback at a time and messages arrive in
/// the order they were broadcast.
use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{BusError, ComponentError};
use crate::messaging::{CallRequest, CallResult, Message, MessageKind, ReplyTo};
use crate::state::LifecycleMachine;

use super::app::{App, HubId};
use super::component::{Component, Context};
use super::timers::TimerQueue;

/// Work item for a hub thread
pub(crate) enum HubEnvelope {
    Deliver(Arc<Message>),
    Spawn(Box<dyn Component>),
    Call(CallRequest),
    Close,
}

struct ComponentSlot {
    name: String,
    component: Box<dyn Component>,
    lifecycle: LifecycleMachine,
}

/// Outcome of one component callback
enum Outcome<T> {
    Done(T),
    Failed(ComponentError),
    Panicked(String),
}

/// Run a component callback, turning a panic into a value so the rest of the
/// hub survives it
fn guard<T>(callback: impl FnOnce() -> Result<T, ComponentError>) -> Outcome<T> {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(value)) => Outcome::Done(value),
        Ok(Err(e)) => Outcome::Failed(e),
        Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub(crate) struct Hub {
    id: HubId,
    name: String,
    app: App,
    rx: Receiver<HubEnvelope>,
    slots: Vec<ComponentSlot>,
    timers: TimerQueue,
}

impl Hub {
    pub(crate) fn new(id: HubId, name: String, app: App, rx: Receiver<HubEnvelope>) -> Self {
        Self {
            id,
            name,
            app,
            rx,
            slots: Vec::new(),
            timers: TimerQueue::new(),
        }
    }

    pub(crate) fn run(mut self) {
        tracing::debug!("Hub {} started", self.name);

        loop {
            let envelope = match self.timers.next_deadline() {
                Some(deadline) => match self.rx.recv_deadline(deadline) {
                    Ok(envelope) => Some(envelope),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.rx.recv() {
                    Ok(envelope) => Some(envelope),
                    Err(_) => break,
                },
            };

            match envelope {
                Some(HubEnvelope::Deliver(message)) => self.deliver(&message),
                Some(HubEnvelope::Spawn(component)) => self.spawn(component),
                Some(HubEnvelope::Call(request)) => self.serve_call(request),
                Some(HubEnvelope::Close) => break,
                None => {}
            }

            self.fire_timers();
        }

        self.stop_all();
        tracing::debug!("Hub {} finished", self.name);
    }

    fn deliver(&mut self, message: &Message) {
        let mut to_stop = Vec::new();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.lifecycle.state().is_running() || !message.is_addressed_to(&slot.name) {
                continue;
            }
            if message.is_shutdown() {
                to_stop.push(index);
                continue;
            }

            let mut ctx = Context::new(&self.app, self.id, &slot.name, &mut self.timers);
            let component = &mut slot.component;
            match guard(|| component.receive(message, &mut ctx)) {
                Outcome::Done(()) => {}
                Outcome::Failed(e) => {
                    tracing::error!(
                        "{} failed handling {}: {:#}",
                        slot.name,
                        message.description(),
                        anyhow::Error::from(e)
                    );
                    to_stop.push(index);
                }
                Outcome::Panicked(reason) => {
                    tracing::error!(
                        "{} panicked handling {}: {}",
                        slot.name,
                        message.description(),
                        reason
                    );
                    to_stop.push(index);
                }
            }
        }

        for index in to_stop.into_iter().rev() {
            self.stop_slot(index);
        }
    }

    fn spawn(&mut self, mut component: Box<dyn Component>) {
        let name = component.name().to_string();
        let mut lifecycle = LifecycleMachine::new();

        let started = {
            let mut ctx = Context::new(&self.app, self.id, &name, &mut self.timers);
            guard(|| component.start(&mut ctx))
        };

        let failed = match started {
            Outcome::Done(()) => {
                if let Err(e) = lifecycle.mark_running() {
                    tracing::error!("{} could not enter running state: {}", name, e);
                }
                tracing::info!("Component {} running on hub {}", name, self.name);
                false
            }
            Outcome::Failed(e) => {
                tracing::error!("{} failed to start: {:#}", name, anyhow::Error::from(e));
                true
            }
            Outcome::Panicked(reason) => {
                tracing::error!("{} panicked while starting: {}", name, reason);
                true
            }
        };

        self.slots.push(ComponentSlot {
            name,
            component,
            lifecycle,
        });
        if failed {
            self.stop_slot(self.slots.len() - 1);
        }
    }

    fn serve_call(&mut self, request: CallRequest) {
        let CallRequest {
            target,
            method,
            args,
            reply,
        } = request;

        let (result, panicked) = self.invoke(&target, &method, &args);
        if let Err(e) = &result {
            tracing::debug!("Call {}.{} failed: {}", target, method, e);
        }

        match reply {
            ReplyTo::Wait(tx) => {
                // The caller may have timed out and gone away
                let _ = tx.send(result);
            }
            ReplyTo::Message { caller, call_id } => {
                let reply = Message::new(MessageKind::CallReply {
                    call_id,
                    result: result.map_err(|e| e.to_string()),
                })
                .from_component(target.clone())
                .to(caller);
                self.app.broadcast(reply);
            }
        }

        if panicked {
            if let Some(index) = self.slots.iter().position(|slot| slot.name == target) {
                self.stop_slot(index);
            }
        }
    }

    /// Run an exported method; the flag is set when the component panicked
    /// and has to be stopped
    fn invoke(&mut self, target: &str, method: &str, args: &[Value]) -> (CallResult, bool) {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| slot.name == target && slot.lifecycle.state().is_running())
        else {
            return (Err(BusError::ComponentNotFound(target.to_string())), false);
        };

        if !slot.component.exports().iter().any(|m| *m == method) {
            let err = BusError::UnknownMethod {
                component: target.to_string(),
                method: method.to_string(),
            };
            return (Err(err), false);
        }

        let failed = |message: String| BusError::CallFailed {
            component: target.to_string(),
            method: method.to_string(),
            message,
        };
        let mut ctx = Context::new(&self.app, self.id, &slot.name, &mut self.timers);
        let component = &mut slot.component;
        match guard(|| component.call(method, args, &mut ctx)) {
            Outcome::Done(value) => (Ok(value), false),
            Outcome::Failed(e) => (Err(failed(e.to_string())), false),
            Outcome::Panicked(reason) => {
                tracing::error!("{} panicked in {}: {}", target, method, reason);
                (Err(failed(format!("component panicked: {}", reason))), true)
            }
        }
    }

    fn fire_timers(&mut self) {
        let due = self.timers.pop_due(Instant::now());
        for (name, token) in due {
            let Some(index) = self
                .slots
                .iter()
                .position(|slot| slot.name == name && slot.lifecycle.state().is_running())
            else {
                continue;
            };

            let outcome = {
                let slot = &mut self.slots[index];
                let mut ctx = Context::new(&self.app, self.id, &slot.name, &mut self.timers);
                let component = &mut slot.component;
                guard(|| component.on_timer(token, &mut ctx))
            };
            match outcome {
                Outcome::Done(()) => {}
                Outcome::Failed(e) => {
                    tracing::error!("{} failed in timer: {:#}", name, anyhow::Error::from(e));
                    self.stop_slot(index);
                }
                Outcome::Panicked(reason) => {
                    tracing::error!("{} panicked in timer: {}", name, reason);
                    self.stop_slot(index);
                }
            }
        }
    }

    /// Run the shutdown sequence of one component and announce it
    fn stop_slot(&mut self, index: usize) {
        let mut slot = self.slots.remove(index);
        if let Err(e) = slot.lifecycle.begin_shutdown() {
            tracing::warn!("{} shutdown: {}", slot.name, e);
        }

        {
            let mut ctx = Context::new(&self.app, self.id, &slot.name, &mut self.timers);
            let component = &mut slot.component;
            let stopped = guard(|| {
                component.stop(&mut ctx);
                Ok(())
            });
            if let Outcome::Panicked(reason) = stopped {
                tracing::error!("{} panicked while stopping: {}", slot.name, reason);
            }
        }

        if slot.lifecycle.mark_stopped().is_err() {
            slot.lifecycle.force_stop();
        }
        self.timers.cancel_for(&slot.name);
        self.app.forget(&slot.name);

        match slot.lifecycle.uptime() {
            Some(uptime) => tracing::info!("Component {} stopped after {:.1?}", slot.name, uptime),
            None => tracing::info!("Component {} stopped", slot.name),
        }
        self.app.broadcast(
            Message::new(MessageKind::ComponentStopped {
                name: slot.name.clone(),
            })
            .from_component(slot.name),
        );
    }

    fn stop_all(&mut self) {
        while !self.slots.is_empty() {
            self.stop_slot(self.slots.len() - 1);
        }
    }
}
