/// pulsebus: a component bus for biofeedback inputs and outputs
///
/// ```text
/// heart ──────> HeartMonitor ──> HeartBeat ──> ExcitementMonitor ──> ExcitementChanged
/// headband ───> HeadMovement / HeadPosition ──> Head* events ──> scenes
/// scenes ─────> Set/IncreaseGroupPower, SetGroupColor ──> OutputComponent ──> Output
/// controller ─> ControllerBridge ──> App::call ──> exported methods
/// ```
pub mod bridge;
pub mod config;
pub mod error;
pub mod headband;
pub mod heart;
pub mod messaging;
pub mod outputs;
pub mod runtime;
pub mod scenes;
pub mod signal;
pub mod state;

use std::sync::Arc;

use crate::headband::{HeadMovement, HeadPosition};
use crate::heart::ExcitementMonitor;
use crate::runtime::{Component, ComponentRegistry};
use crate::scenes::{ColorDance, Consent, HeadStop, HeadTilt};
use crate::signal::{CalibrationStore, FileStore};

/// Output group driven by the built-in scenes
pub const DEFAULT_GROUP: u32 = 1;

/// Registry with every component kind that needs only the configuration
pub fn builtin_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();

    registry.register("excitement", "Heart-rate excitement detector", |name, config| {
        Ok(Box::new(ExcitementMonitor::new(name, &config.excitement)) as Box<dyn Component>)
    });
    registry.register("head-movement", "Headband gyro gestures", |name, config| {
        let store: Arc<dyn CalibrationStore> = Arc::new(FileStore::new(config.gyro.calibration_dir.clone()));
        let movement = HeadMovement::new(name, headband::movement::DEFAULT_MODE, config.gyro.clone(), store)?;
        Ok(Box::new(movement) as Box<dyn Component>)
    });
    registry.register("head-position", "Headband attitude", |name, _config| {
        Ok(Box::new(HeadPosition::new(name)) as Box<dyn Component>)
    });
    registry.register("head-stop", "Keep still to stop", |name, _config| {
        Ok(Box::new(HeadStop::new(name, DEFAULT_GROUP)) as Box<dyn Component>)
    });
    registry.register("head-tilt", "Power follows head pitch", |name, _config| {
        Ok(Box::new(HeadTilt::new(name, DEFAULT_GROUP)) as Box<dyn Component>)
    });
    registry.register("consent", "Nod for more, shake for less", |name, _config| {
        Ok(Box::new(Consent::new(name, DEFAULT_GROUP)) as Box<dyn Component>)
    });
    registry.register("color-dance", "Head movement as colour", |name, _config| {
        Ok(Box::new(ColorDance::new(name, DEFAULT_GROUP)) as Box<dyn Component>)
    });

    registry
}
