/// Head movement painted as colour
///
/// Each channel goes through its own low-pass filter so the colour follows
/// the head smoothly instead of flickering at the headband frame rate.
use serde_json::{json, Value};

use crate::error::ComponentError;
use crate::messaging::{Message, MessageKind};
use crate::outputs::Color;
use crate::runtime::{Component, Context};
use crate::signal::{Biquad, Gesture};

use super::SceneBase;

const INPUT_RATE: f64 = 52.0;
const CUTOFF: f64 = 10.0;
const MAX_ANGLE: f64 = 40.0;
const MAX_DPS: f64 = 200.0;

/// Squared fraction of `max` reached by `value`
fn norm(value: f64, max: f64) -> f64 {
    (value.abs() / max).powi(2)
}

pub struct ColorDance {
    name: String,
    base: SceneBase,
    filters: [Biquad; 3],
}

impl ColorDance {
    pub fn new(name: impl Into<String>, group: u32) -> Self {
        Self {
            name: name.into(),
            base: SceneBase::new(group),
            filters: std::array::from_fn(|_| Biquad::butterworth_lowpass(INPUT_RATE, CUTOFF)),
        }
    }

    fn filtered(&mut self, red: f64, green: f64, blue: f64) -> Color {
        let [r, g, b] = &mut self.filters;
        Color::new(
            r.process(red) as f32,
            g.process(green) as f32,
            b.process(blue) as f32,
        )
    }

    /// Next colour for a head event, None for other messages
    pub fn color_for(&mut self, kind: &MessageKind) -> Option<Color> {
        match kind {
            MessageKind::HeadYesNo {
                gesture, intensity, ..
            } => {
                let value = intensity * intensity;
                let (red, green) = match gesture {
                    Gesture::Meh => (value, value / 3.0),
                    Gesture::Yes => (0.0, value),
                    Gesture::No => (value, 0.0),
                };
                Some(self.filtered(red, green, 0.0))
            }
            MessageKind::HeadMoved { pitch, roll } => {
                let [r, g, b] = &mut self.filters;
                let blue = b.process(norm(*pitch, MAX_ANGLE));
                let green = g.process(norm(*roll, MAX_ANGLE));
                let red = r.process(1.0 - blue.max(green));
                Some(Color::new(red as f32, green as f32, blue as f32))
            }
            MessageKind::HeadGyro { x, y, z, .. } => {
                Some(self.filtered(norm(*x, MAX_DPS), norm(*y, MAX_DPS), norm(*z, MAX_DPS)))
            }
            _ => None,
        }
    }
}

impl Component for ColorDance {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self, message: &Message, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        if let Some(active) = self.base.update_active(&self.name, message) {
            if active {
                self.filters.iter_mut().for_each(Biquad::reset);
            }
            return Ok(());
        }
        if !self.base.is_active() {
            return Ok(());
        }

        if let Some(color) = self.color_for(message.kind()) {
            ctx.send_message(self.base.set_color(color));
        }
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["is_active", "group"]
    }

    fn call(&mut self, method: &str, _args: &[Value], _ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        match method {
            "is_active" => Ok(json!(self.base.is_active())),
            "group" => Ok(json!(self.base.group())),
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }
}
