/// Outputs
///
/// An output is a device or synth driven by the bus. Instead of a class
/// hierarchy, each output exposes the capabilities it has (`PowerSink`,
/// `ColorSink`) and `OutputComponent` routes group messages to them.
///
/// ```text
/// SetGroupPower ─┐
/// SetGroupColor ─┼─> OutputComponent (group filter, clamp) ─> Output
/// EmergencyStop ─┘                                            ├── PowerSink
///                                                             └── ColorSink
/// ```
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::ComponentError;
use crate::messaging::{Message, MessageKind};
use crate::runtime::{Component, Context};

pub mod realtime;

pub use realtime::{PowerReader, RealtimePower, SharedPower};

/// RGB colour with channels in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        red: 0.0,
        green: 0.0,
        blue: 0.0,
    };

    /// Build a colour, clamping every channel
    pub fn new(red: f32, green: f32, blue: f32) -> Self {
        Self {
            red: red.clamp(0.0, 1.0),
            green: green.clamp(0.0, 1.0),
            blue: blue.clamp(0.0, 1.0),
        }
    }

    pub fn to_rgb8(&self) -> [u8; 3] {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [channel(self.red), channel(self.green), channel(self.blue)]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.to_rgb8();
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

pub trait PowerSink: Send {
    /// Set power in [0, 1]
    fn set_power(&mut self, power: f32);

    fn power(&self) -> f32;
}

pub trait ColorSink: Send {
    fn set_color(&mut self, color: Color);

    fn color(&self) -> Color;
}

/// A driven device, exposing its capabilities
pub trait Output: Send {
    fn description(&self) -> &str;

    fn power_sink(&mut self) -> Option<&mut dyn PowerSink> {
        None
    }

    fn color_sink(&mut self) -> Option<&mut dyn ColorSink> {
        None
    }
}

/// User-facing control an output needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Power,
    Color,
}

/// Controls to build for an output, from the capabilities it implements
pub fn controls_for(output: &mut dyn Output) -> Vec<Control> {
    let mut controls = Vec::new();
    if output.power_sink().is_some() {
        controls.push(Control::Power);
    }
    if output.color_sink().is_some() {
        controls.push(Control::Color);
    }
    controls
}

/// Software output that only keeps its state
#[derive(Debug, Clone, Default)]
pub struct VirtualOutput {
    description: String,
    power: f32,
    color: Color,
}

impl VirtualOutput {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }
}

impl PowerSink for VirtualOutput {
    fn set_power(&mut self, power: f32) {
        self.power = power;
    }

    fn power(&self) -> f32 {
        self.power
    }
}

impl ColorSink for VirtualOutput {
    fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    fn color(&self) -> Color {
        self.color
    }
}

impl Output for VirtualOutput {
    fn description(&self) -> &str {
        &self.description
    }

    fn power_sink(&mut self) -> Option<&mut dyn PowerSink> {
        Some(self)
    }

    fn color_sink(&mut self) -> Option<&mut dyn ColorSink> {
        Some(self)
    }
}

/// Bus adapter for an [`Output`] listening to one group
pub struct OutputComponent {
    name: String,
    group: u32,
    output: Box<dyn Output>,
    paused_power: Option<f32>,
}

impl OutputComponent {
    pub fn new(name: impl Into<String>, group: u32, output: Box<dyn Output>) -> Self {
        Self {
            name: name.into(),
            group,
            output,
            paused_power: None,
        }
    }

    fn apply_power(&mut self, power: f32) {
        let power = power.clamp(0.0, 1.0);
        if let Some(sink) = self.output.power_sink() {
            if sink.power() != power {
                tracing::debug!("{} power {:.2}", self.name, power);
            }
            sink.set_power(power);
        }
    }

    fn current_power(&mut self) -> f32 {
        self.output.power_sink().map_or(0.0, |sink| sink.power())
    }
}

impl Component for OutputComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self, message: &Message, _ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        let in_group = message.group() == Some(self.group);

        match message.kind() {
            MessageKind::EmergencyStop => {
                tracing::warn!("{}: emergency stop", self.name);
                self.paused_power = None;
                self.apply_power(0.0);
                if let Some(sink) = self.output.color_sink() {
                    sink.set_color(Color::BLACK);
                }
            }
            MessageKind::SetGroupPower { power } if in_group => {
                if self.paused_power.is_some() {
                    self.paused_power = Some(power.clamp(0.0, 1.0));
                } else {
                    self.apply_power(*power);
                }
            }
            MessageKind::IncreaseGroupPower { amount } if in_group => match self.paused_power {
                Some(paused) => self.paused_power = Some((paused + amount).clamp(0.0, 1.0)),
                None => {
                    let power = self.current_power() + amount;
                    self.apply_power(power);
                }
            },
            MessageKind::SetGroupColor { color } if in_group => {
                if let Some(sink) = self.output.color_sink() {
                    sink.set_color(Color::new(color.red, color.green, color.blue));
                }
            }
            MessageKind::Pause if self.paused_power.is_none() => {
                self.paused_power = Some(self.current_power());
                self.apply_power(0.0);
            }
            MessageKind::Resume => {
                if let Some(power) = self.paused_power.take() {
                    self.apply_power(power);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["description", "controls", "power", "set_power", "color"]
    }

    fn call(&mut self, method: &str, args: &[Value], _ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        match method {
            "description" => Ok(json!(self.output.description())),
            "controls" => Ok(json!(controls_for(self.output.as_mut()))),
            "power" => Ok(json!(self.current_power())),
            "set_power" => {
                let power = args
                    .first()
                    .and_then(Value::as_f64)
                    .ok_or_else(|| ComponentError::invalid_argument(method, "expected a number"))?;
                self.apply_power(power as f32);
                Ok(json!(self.current_power()))
            }
            "color" => match self.output.color_sink() {
                Some(sink) => Ok(json!(sink.color())),
                None => Ok(Value::Null),
            },
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }

    fn stop(&mut self, _ctx: &mut Context<'_>) {
        self.apply_power(0.0);
    }
}
