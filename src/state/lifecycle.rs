/// Component lifecycle inside a hub
///
/// ```text
/// Starting ──start() ok──> Running ──Shutdown / error──> ShuttingDown ──stop()──> Stopped
///     └───────────start() failed──────────────────────────────┘
/// ```
///
/// Only `Running` components receive messages, calls and timers.
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ComponentState {
    /// Queued on the hub, `start` not finished yet
    #[default]
    Starting,

    Running { since: Instant },

    /// `stop` is cancelling owned background tasks
    ShuttingDown,

    /// Final; nothing is delivered any more
    Stopped,
}

impl ComponentState {
    pub fn is_running(&self) -> bool {
        matches!(self, ComponentState::Running { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ComponentState::Stopped)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComponentState::Starting => "starting",
            ComponentState::Running { .. } => "running",
            ComponentState::ShuttingDown => "shutting down",
            ComponentState::Stopped => "stopped",
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Component cannot go from {from} to {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

#[derive(Debug, Default)]
pub struct LifecycleMachine {
    state: ComponentState,
    uptime: Option<Duration>,
}

impl LifecycleMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ComponentState {
        self.state
    }

    /// Time spent running, known once shutdown began
    pub fn uptime(&self) -> Option<Duration> {
        match self.state {
            ComponentState::Running { since } => Some(since.elapsed()),
            _ => self.uptime,
        }
    }

    fn refuse(&self, to: ComponentState) -> TransitionError {
        TransitionError {
            from: self.state.name(),
            to: to.name(),
        }
    }

    pub fn mark_running(&mut self) -> Result<(), TransitionError> {
        let running = ComponentState::Running {
            since: Instant::now(),
        };
        match self.state {
            ComponentState::Starting => {
                self.state = running;
                Ok(())
            }
            _ => Err(self.refuse(running)),
        }
    }

    /// A component that failed to start is shut down without ever running
    pub fn begin_shutdown(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ComponentState::Running { since } => {
                self.uptime = Some(since.elapsed());
                self.state = ComponentState::ShuttingDown;
                Ok(())
            }
            ComponentState::Starting => {
                self.state = ComponentState::ShuttingDown;
                Ok(())
            }
            _ => Err(self.refuse(ComponentState::ShuttingDown)),
        }
    }

    pub fn mark_stopped(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ComponentState::ShuttingDown => {
                self.state = ComponentState::Stopped;
                Ok(())
            }
            _ => Err(self.refuse(ComponentState::Stopped)),
        }
    }

    /// Stop regardless of the current state
    pub fn force_stop(&mut self) {
        self.state = ComponentState::Stopped;
    }
}
