/// Head attitude component
use serde_json::{json, Value};

use crate::error::ComponentError;
use crate::messaging::{Message, MessageKind};
use crate::runtime::{Component, Context};
use crate::signal::accel;

/// Posts `HeadMoved` with the attitude of each accelerometer batch
pub struct HeadPosition {
    name: String,
    active: bool,
}

impl HeadPosition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: false,
        }
    }
}

impl Component for HeadPosition {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self, message: &Message, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        match message.kind() {
            MessageKind::SetActive { active } if message.is_addressed_to(&self.name) => {
                self.active = *active;
            }
            MessageKind::AccelSamples { samples } if self.active => {
                if let Some([x, y, z]) = accel::mean(samples) {
                    let (roll, pitch) = accel::roll_pitch(x, y, z);
                    ctx.send(MessageKind::HeadMoved { pitch, roll });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["is_active"]
    }

    fn call(&mut self, method: &str, _args: &[Value], _ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        match method {
            "is_active" => Ok(json!(self.active)),
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }
}
