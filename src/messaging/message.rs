/// Message types exchanged between components
///
/// A message is either an event (something that happened, past tense) or a
/// command (a request to act, imperative). Both travel the same way: they are
/// broadcast to every hub and each component decides whether to act.
use serde_json::Value;

use crate::heart::HeartSample;
use crate::outputs::Color;
use crate::signal::excitement::ExcitementState;
use crate::signal::gyro::{Axis, Gesture};

/// Concrete message payloads
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// Stop the addressed component (all components if untargeted)
    Shutdown,

    /// A component finished its shutdown sequence
    ComponentStopped { name: String },

    /// A heart-rate sample arrived
    HeartBeat { sample: HeartSample, backlog: bool },

    /// The excitement detector changed state
    ExcitementChanged {
        state: ExcitementState,
        summary: String,
    },

    /// Raw gyroscope samples from a headband, one `[x, y, z]` per frame
    GyroSamples {
        samples: Vec<[f64; 3]>,
        timestamps: Vec<f64>,
    },

    /// Raw accelerometer samples from a headband
    AccelSamples { samples: Vec<[f64; 3]> },

    /// Head attitude in degrees
    HeadMoved { pitch: f64, roll: f64 },

    /// Rhythmic head movement detected on an axis
    HeadShaken { axis: Axis, freq: f64, power: f64 },

    /// Head gesture classified from gyro swings
    HeadYesNo {
        gesture: Gesture,
        intensity: f64,
        ts: f64,
        frames: u32,
    },

    /// Bias-corrected last gyro values and their deltas
    HeadGyro {
        x: f64,
        y: f64,
        z: f64,
        dx: f64,
        dy: f64,
        dz: f64,
    },

    /// Activate or deactivate an input or scene
    SetActive { active: bool },

    /// Switch the processing mode of a component
    SetMode { mode: String },

    /// Set the power of an output group (0.0-1.0)
    SetGroupPower { power: f32 },

    /// Change the power of an output group by a relative amount
    IncreaseGroupPower { amount: f32 },

    /// Set the colour of an output group
    SetGroupColor { color: Color },

    EmergencyStop,
    Pause,
    Resume,
    Increment { axis: u32 },
    Decrement { axis: u32 },

    /// Reply to a non-blocking exported-method call
    CallReply {
        call_id: u64,
        result: Result<Value, String>,
    },
}

/// Immutable message envelope
///
/// Built once with [`Message::new`] and the `from_component`/`to`/`in_group`
/// builders, then shared read-only between all recipients.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    kind: MessageKind,
    source: Option<String>,
    target: Option<String>,
    group: Option<u32>,
}

impl Message {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            source: None,
            target: None,
            group: None,
        }
    }

    /// Record the component that emitted this message
    pub fn from_component(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Restrict delivery to a single component
    pub fn to(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Tag the message with an output group
    pub fn in_group(mut self, group: u32) -> Self {
        self.group = Some(group);
        self
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn group(&self) -> Option<u32> {
        self.group
    }

    /// Check whether this message should reach the named component
    pub fn is_addressed_to(&self, name: &str) -> bool {
        self.target.as_deref().map_or(true, |target| target == name)
    }

    pub fn is_from(&self, name: &str) -> bool {
        self.source.as_deref() == Some(name)
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self.kind, MessageKind::Shutdown)
    }

    /// Get a human-readable description of the message
    pub fn description(&self) -> String {
        let body = match &self.kind {
            MessageKind::Shutdown => "Shutting down".to_string(),
            MessageKind::ComponentStopped { name } => format!("Component stopped: {}", name),
            MessageKind::HeartBeat { sample, backlog } => {
                if *backlog {
                    format!("Heart rate {:.0} (backlog)", sample.rate)
                } else {
                    format!("Heart rate {:.0}", sample.rate)
                }
            }
            MessageKind::ExcitementChanged { state, summary } => {
                format!("Excitement {} [{}]", state, summary)
            }
            MessageKind::GyroSamples { samples, .. } => {
                format!("Gyro samples: {}", samples.len())
            }
            MessageKind::AccelSamples { samples } => {
                format!("Accelerometer samples: {}", samples.len())
            }
            MessageKind::HeadMoved { pitch, roll } => {
                format!("Head moved (pitch={:.1}, roll={:.1})", pitch, roll)
            }
            MessageKind::HeadShaken { axis, freq, power } => {
                format!("Head shaken on {} ({:.2}Hz, {:.1}dB)", axis, freq, power)
            }
            MessageKind::HeadYesNo {
                gesture, intensity, ..
            } => format!("Head gesture {} ({:.2})", gesture, intensity),
            MessageKind::HeadGyro { x, y, z, .. } => {
                format!("Head gyro ({:.1}, {:.1}, {:.1})", x, y, z)
            }
            MessageKind::SetActive { active } => format!("Set active: {}", active),
            MessageKind::SetMode { mode } => format!("Set mode: {}", mode),
            MessageKind::SetGroupPower { power } => format!("Set power: {:.2}", power),
            MessageKind::IncreaseGroupPower { amount } => {
                format!("Increase power: {:+.2}", amount)
            }
            MessageKind::SetGroupColor { color } => format!("Set color: {}", color),
            MessageKind::EmergencyStop => "Emergency stop".to_string(),
            MessageKind::Pause => "Pause".to_string(),
            MessageKind::Resume => "Resume".to_string(),
            MessageKind::Increment { axis } => format!("Increment axis {}", axis),
            MessageKind::Decrement { axis } => format!("Decrement axis {}", axis),
            MessageKind::CallReply { call_id, result } => match result {
                Ok(_) => format!("Reply to call {}", call_id),
                Err(e) => format!("Call {} failed: {}", call_id, e),
            },
        };

        match self.group {
            Some(group) => format!("{} (group {})", body, group),
            None => body,
        }
    }
}

impl From<MessageKind> for Message {
    fn from(kind: MessageKind) -> Self {
        Message::new(kind)
    }
}
