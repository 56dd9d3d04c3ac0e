/// Scenes
///
/// A scene maps head events to commands for a single output group. Every
/// scene starts inactive and ignores input until it receives
/// `SetActive { active: true }` addressed to it (or broadcast).
///
/// ```text
/// HeadGyro ─────> HeadStop ───> SetGroupPower ──────┐
/// HeadYesNo ────> Consent ────> IncreaseGroupPower ─┼─> OutputComponent(group)
/// HeadMoved ─┬──> HeadTilt ───> SetGroupPower ──────┤
/// HeadYesNo ─┴──> ColorDance ─> SetGroupColor ──────┘
/// ```
use crate::messaging::{Message, MessageKind};
use crate::outputs::Color;

pub mod color_dance;
pub mod consent;
pub mod headstop;
pub mod tilt;

pub use color_dance::ColorDance;
pub use consent::Consent;
pub use headstop::HeadStop;
pub use tilt::{HeadTilt, TiltMode};

/// Activation and group shared by every scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneBase {
    active: bool,
    group: u32,
}

impl SceneBase {
    pub fn new(group: u32) -> Self {
        Self {
            active: false,
            group,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    /// Apply a `SetActive` addressed to `name`, returning the new state when
    /// it changed
    pub fn update_active(&mut self, name: &str, message: &Message) -> Option<bool> {
        match message.kind() {
            MessageKind::SetActive { active }
                if message.is_addressed_to(name) && *active != self.active =>
            {
                self.active = *active;
                tracing::info!("Scene {} {}", name, if *active { "activated" } else { "paused" });
                Some(*active)
            }
            _ => None,
        }
    }

    pub fn set_power(&self, power: f32) -> Message {
        Message::new(MessageKind::SetGroupPower { power }).in_group(self.group)
    }

    pub fn increase_power(&self, amount: f32) -> Message {
        Message::new(MessageKind::IncreaseGroupPower { amount }).in_group(self.group)
    }

    pub fn set_color(&self, color: Color) -> Message {
        Message::new(MessageKind::SetGroupColor { color }).in_group(self.group)
    }
}
