/// Power level shared with realtime callbacks
///
/// An audio callback must never wait on a hub, so the last commanded power is
/// published through a lock-free cell. Readers may see a slightly stale
/// value.
use crossbeam_utils::atomic::AtomicCell;
use std::sync::Arc;

use super::{Output, PowerSink};

#[derive(Debug, Clone, Default)]
pub struct SharedPower {
    cell: Arc<AtomicCell<f32>>,
}

impl SharedPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, power: f32) {
        self.cell.store(power);
    }

    pub fn load(&self) -> f32 {
        self.cell.load()
    }

    /// Read-only handle for a realtime thread
    pub fn reader(&self) -> PowerReader {
        PowerReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PowerReader {
    cell: Arc<AtomicCell<f32>>,
}

impl PowerReader {
    pub fn get(&self) -> f32 {
        self.cell.load()
    }
}

/// Output whose power is consumed by a realtime callback
pub struct RealtimePower {
    description: String,
    shared: SharedPower,
}

impl RealtimePower {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            shared: SharedPower::new(),
        }
    }

    pub fn reader(&self) -> PowerReader {
        self.shared.reader()
    }
}

impl PowerSink for RealtimePower {
    fn set_power(&mut self, power: f32) {
        self.shared.store(power);
    }

    fn power(&self) -> f32 {
        self.shared.load()
    }
}

impl Output for RealtimePower {
    fn description(&self) -> &str {
        &self.description
    }

    fn power_sink(&mut self) -> Option<&mut dyn PowerSink> {
        Some(self)
    }
}
