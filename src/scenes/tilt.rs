/// Power follows head pitch relative to where it was on activation
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ComponentError;
use crate::messaging::{Message, MessageKind};
use crate::runtime::{Component, Context};

use super::SceneBase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiltMode {
    /// Zero when centred, rising either way
    CenterZero,
    /// Half when centred, looking up increases
    CenterMiddleIncreaseUp,
    /// Half when centred, looking down increases
    CenterMiddleIncreaseDown,
    /// Full when centred, falling either way
    CenterMax,
}

impl TiltMode {
    /// Power for a pitch offset from the reference, over a control angle
    pub fn power(&self, pitch_offset: f64, control_angle: f64) -> f32 {
        let scaled = pitch_offset * 2.0 / control_angle;
        let power = match self {
            TiltMode::CenterZero => scaled.abs(),
            TiltMode::CenterMiddleIncreaseUp => 0.5 - scaled,
            TiltMode::CenterMiddleIncreaseDown => 0.5 + scaled,
            TiltMode::CenterMax => 1.0 - scaled.abs(),
        };
        power.clamp(0.0, 1.0) as f32
    }
}

pub struct HeadTilt {
    name: String,
    base: SceneBase,
    mode: TiltMode,
    control_angle: f64,
    reference_pitch: Option<f64>,
}

impl HeadTilt {
    pub fn new(name: impl Into<String>, group: u32) -> Self {
        Self {
            name: name.into(),
            base: SceneBase::new(group),
            mode: TiltMode::CenterZero,
            control_angle: 60.0,
            reference_pitch: None,
        }
    }
}

impl Component for HeadTilt {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self, message: &Message, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        if self.base.update_active(&self.name, message).is_some() || !self.base.is_active() {
            return Ok(());
        }

        if let MessageKind::HeadMoved { pitch, .. } = message.kind() {
            let reference = *self.reference_pitch.get_or_insert(*pitch);
            let power = self.mode.power(reference - pitch, self.control_angle);
            ctx.send_message(self.base.set_power(power));
        }
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["is_active", "group", "mode", "set_mode", "set_control_angle", "recenter"]
    }

    fn call(&mut self, method: &str, args: &[Value], _ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        match method {
            "is_active" => Ok(json!(self.base.is_active())),
            "group" => Ok(json!(self.base.group())),
            "mode" => Ok(json!(self.mode)),
            "set_mode" => {
                let mode = args
                    .first()
                    .cloned()
                    .ok_or_else(|| ComponentError::invalid_argument(method, "expected a mode"))?;
                self.mode = serde_json::from_value(mode)
                    .map_err(|e| ComponentError::invalid_argument(method, e.to_string()))?;
                Ok(json!(self.mode))
            }
            "set_control_angle" => {
                let angle = args
                    .first()
                    .and_then(Value::as_f64)
                    .filter(|angle| *angle > 0.0)
                    .ok_or_else(|| ComponentError::invalid_argument(method, "expected a positive angle"))?;
                self.control_angle = angle;
                Ok(json!(angle))
            }
            "recenter" => {
                self.reference_pitch = None;
                Ok(Value::Null)
            }
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }
}
