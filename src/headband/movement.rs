/// Head movement component
///
/// Runs the selected gyro detector over incoming `GyroSamples` and posts the
/// events it produces. Switching mode rebuilds the detector; stored axis
/// biases are reused so a mode switch does not recalibrate.
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::GyroConfig;
use crate::error::ComponentError;
use crate::messaging::{Message, MessageKind};
use crate::runtime::{Component, Context};
use crate::signal::CalibrationStore;

use super::detector::{detector_for, DetectionContext, Detector, MODES};

pub const DEFAULT_MODE: &str = "shake";

pub struct HeadMovement {
    name: String,
    config: GyroConfig,
    store: Arc<dyn CalibrationStore>,
    active: bool,
    detector: Box<dyn Detector>,
}

impl HeadMovement {
    pub fn new(
        name: impl Into<String>,
        mode: &str,
        config: GyroConfig,
        store: Arc<dyn CalibrationStore>,
    ) -> Result<Self, ComponentError> {
        let detector = detector_for(mode, &config, &store)?;
        Ok(Self {
            name: name.into(),
            config,
            store,
            active: false,
            detector,
        })
    }

    pub fn mode(&self) -> &'static str {
        self.detector.name()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Replace the detector, keeping the current one if `mode` is unknown
    pub fn set_mode(&mut self, mode: &str) -> Result<(), ComponentError> {
        if mode == self.detector.name() {
            return Ok(());
        }
        self.detector = detector_for(mode, &self.config, &self.store)?;
        tracing::info!("{}: switched to {} mode", self.name, mode);
        Ok(())
    }
}

impl Component for HeadMovement {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self, message: &Message, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        match message.kind() {
            MessageKind::SetActive { active } if message.is_addressed_to(&self.name) => {
                self.active = *active;
            }
            MessageKind::SetMode { mode } if message.is_addressed_to(&self.name) => {
                if let Err(e) = self.set_mode(mode) {
                    tracing::error!("{}: {:#}", self.name, anyhow::Error::from(e));
                }
            }
            MessageKind::GyroSamples {
                samples,
                timestamps,
            } if self.active => {
                let context = DetectionContext::new(samples, timestamps);
                if let Some(event) = self.detector.detect(&context) {
                    ctx.send(event);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["is_active", "mode", "modes", "set_mode"]
    }

    fn call(&mut self, method: &str, args: &[Value], _ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        match method {
            "is_active" => Ok(json!(self.active)),
            "mode" => Ok(json!(self.mode())),
            "modes" => Ok(json!(MODES.iter().map(|(mode, _)| *mode).collect::<Vec<_>>())),
            "set_mode" => {
                let mode = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| ComponentError::invalid_argument(method, "expected a mode name"))?;
                self.set_mode(mode)?;
                Ok(json!(self.mode()))
            }
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }
}
