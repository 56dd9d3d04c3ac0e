/// Power follows how much the head is moving: keep still to stop
use serde_json::{json, Value};

use crate::error::ComponentError;
use crate::messaging::{Message, MessageKind};
use crate::runtime::{Component, Context};

use super::SceneBase;

/// Resting noise per axis, in degrees per second
const REST_DPS: [f64; 3] = [3.0, 2.5, 1.8];

/// Combined excess angular speed giving full power
const FULL_POWER_DPS: f64 = 20.0;

/// Power for a bias-corrected gyro reading
pub fn movement_power(x: f64, y: f64, z: f64) -> f32 {
    let excess: f64 = [x, y, z]
        .iter()
        .zip(REST_DPS)
        .map(|(value, rest)| value.abs() - rest)
        .sum();
    (excess / FULL_POWER_DPS).clamp(0.0, 1.0) as f32
}

pub struct HeadStop {
    name: String,
    base: SceneBase,
    last_power: f32,
}

impl HeadStop {
    pub fn new(name: impl Into<String>, group: u32) -> Self {
        Self {
            name: name.into(),
            base: SceneBase::new(group),
            last_power: 0.0,
        }
    }
}

impl Component for HeadStop {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self, message: &Message, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        if self.base.update_active(&self.name, message).is_some() || !self.base.is_active() {
            return Ok(());
        }

        if let MessageKind::HeadGyro { x, y, z, .. } = message.kind() {
            let power = movement_power(*x, *y, *z);
            if power != self.last_power {
                self.last_power = power;
                ctx.send_message(self.base.set_power(power));
            }
        }
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["is_active", "group", "power"]
    }

    fn call(&mut self, method: &str, _args: &[Value], _ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        match method {
            "is_active" => Ok(json!(self.base.is_active())),
            "group" => Ok(json!(self.base.group())),
            "power" => Ok(json!(self.last_power)),
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }
}
