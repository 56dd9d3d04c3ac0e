/// Gyroscope axis analysis
///
/// Every axis variant starts with a bias calibration phase: raw samples are
/// collected without producing output, then their mean is subtracted from
/// everything that follows. The bias is persisted so later runs skip the
/// collection.
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use super::calibration::CalibrationStore;

/// Headband gyro axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Head gesture produced by swinging around this axis
    pub fn gesture(&self) -> Gesture {
        match self {
            Axis::X => Gesture::Meh,
            Axis::Y => Gesture::Yes,
            Axis::Z => Gesture::No,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gesture {
    Yes,
    No,
    Meh,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::Yes => "yes",
            Gesture::No => "no",
            Gesture::Meh => "meh",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collect-then-subtract bias removal for one axis
pub struct BiasCalibration {
    axis: Axis,
    required: usize,
    collected: Vec<f64>,
    bias: Option<f64>,
    store: Arc<dyn CalibrationStore>,
}

impl BiasCalibration {
    /// Load a stored bias if there is one; otherwise start collecting
    pub fn new(axis: Axis, required: usize, store: Arc<dyn CalibrationStore>) -> Self {
        let bias = match store.load(axis.name()) {
            Ok(bias) => bias,
            Err(e) => {
                tracing::warn!("Recalibrating gyro axis {}: {:#}", axis, anyhow::Error::from(e));
                None
            }
        };
        Self {
            axis,
            required: required.max(1),
            collected: Vec::with_capacity(required),
            bias,
            store,
        }
    }

    pub fn bias(&self) -> Option<f64> {
        self.bias
    }

    pub fn is_calibrated(&self) -> bool {
        self.bias.is_some()
    }

    /// Bias-corrected value, or None while still collecting
    pub fn correct(&mut self, raw: f64) -> Option<f64> {
        if let Some(bias) = self.bias {
            return Some(raw - bias);
        }
        if self.collected.len() < self.required {
            self.collected.push(raw);
            return None;
        }

        let bias = self.collected.iter().sum::<f64>() / self.collected.len() as f64;
        self.collected = Vec::new();
        self.bias = Some(bias);
        tracing::info!("Gyro axis {} calibrated, bias {:.4}", self.axis, bias);
        if let Err(e) = self.store.save(self.axis.name(), bias) {
            tracing::error!("{:#}", anyhow::Error::from(e));
        }
        Some(raw - bias)
    }
}

/// Periodic Hamming window (`sym=False`)
pub fn hamming(len: usize) -> Vec<f64> {
    (0..len)
        .map(|n| 0.54 - 0.46 * (2.0 * PI * n as f64 / len as f64).cos())
        .collect()
}

/// Strongest low-frequency component over a rolling window
pub struct FftAxis {
    axis: Axis,
    calibration: BiasCalibration,
    window: VecDeque<f64>,
    window_len: usize,
    sample_rate: f64,
    hamming: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl FftAxis {
    pub fn new(calibration: BiasCalibration, window_len: usize, sample_rate: f64) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_len);
        Self {
            axis: calibration.axis,
            calibration,
            window: VecDeque::with_capacity(window_len),
            window_len,
            sample_rate,
            hamming: hamming(window_len),
            fft,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn calibration(&self) -> &BiasCalibration {
        &self.calibration
    }

    pub fn add(&mut self, raw: f64) {
        if let Some(value) = self.calibration.correct(raw) {
            if self.window.len() == self.window_len {
                self.window.pop_front();
            }
            self.window.push_back(value);
        }
    }

    /// `(frequency, power)` of the strongest of the lower 32 bins, `(0, 0)`
    /// until the window is full
    pub fn value(&self) -> (f64, f64) {
        if self.window_len == 0 || self.window.len() < self.window_len {
            return (0.0, 0.0);
        }

        let mut buffer: Vec<Complex<f64>> = self
            .window
            .iter()
            .zip(&self.hamming)
            .map(|(sample, w)| Complex::new(sample * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let bins = (self.window_len / 2 + 1).min(32);
        let mut best = (0usize, f64::NEG_INFINITY);
        for (idx, bin) in buffer[..bins].iter().enumerate() {
            let power = bin.norm();
            if power > best.1 {
                best = (idx, power);
            }
        }

        let freq = best.0 as f64 * self.sample_rate / self.window_len as f64;
        (freq, best.1)
    }
}

/// Current same-signed run of angular velocity on an axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Swing {
    /// Seconds since the run started
    pub elapsed: f64,
    /// Mean angular speed over the run relative to the axis maximum, in [0, 1]
    pub intensity: f64,
    pub frames: u32,
}

/// Swing tracker used for yes/no/meh classification
pub struct SwingAxis {
    axis: Axis,
    calibration: BiasCalibration,
    sample_rate: f64,
    max_dps: f64,
    positive: Option<bool>,
    degrees: f64,
    frames: u32,
}

impl SwingAxis {
    pub fn new(calibration: BiasCalibration, sample_rate: f64, max_dps: f64) -> Self {
        Self {
            axis: calibration.axis,
            calibration,
            sample_rate,
            max_dps,
            positive: None,
            degrees: 0.0,
            frames: 0,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn calibration(&self) -> &BiasCalibration {
        &self.calibration
    }

    pub fn add(&mut self, raw: f64) {
        let Some(dps) = self.calibration.correct(raw) else {
            return;
        };

        let positive = dps >= 0.0;
        if self.positive != Some(positive) {
            self.positive = Some(positive);
            self.degrees = 0.0;
            self.frames = 0;
        }
        self.degrees += dps.abs() / self.sample_rate;
        self.frames += 1;
    }

    /// None until the first calibrated sample
    pub fn value(&self) -> Option<Swing> {
        if self.frames == 0 {
            return None;
        }
        let elapsed = self.frames as f64 / self.sample_rate;
        let intensity = (self.degrees / elapsed / self.max_dps).clamp(0.0, 1.0);
        Some(Swing {
            elapsed,
            intensity,
            frames: self.frames,
        })
    }
}

/// Last corrected value and its change from the previous one
pub struct LastValueAxis {
    calibration: BiasCalibration,
    last: Option<f64>,
    delta: f64,
}

impl LastValueAxis {
    pub fn new(calibration: BiasCalibration) -> Self {
        Self {
            calibration,
            last: None,
            delta: 0.0,
        }
    }

    pub fn calibration(&self) -> &BiasCalibration {
        &self.calibration
    }

    pub fn add(&mut self, raw: f64) {
        if let Some(value) = self.calibration.correct(raw) {
            self.delta = self.last.map_or(0.0, |last| value - last);
            self.last = Some(value);
        }
    }

    /// `(value, delta)` once calibrated
    pub fn value(&self) -> Option<(f64, f64)> {
        self.last.map(|value| (value, self.delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::calibration::MemoryStore;

    fn calibration(axis: Axis, required: usize, store: &Arc<MemoryStore>) -> BiasCalibration {
        let store: Arc<dyn CalibrationStore> = store.clone();
        BiasCalibration::new(axis, required, store)
    }

    #[test]
    fn test_no_output_until_calibrated() {
        let store = Arc::new(MemoryStore::new());
        let mut cal = calibration(Axis::X, 128, &store);

        for i in 0..128 {
            assert_eq!(cal.correct(i as f64), None);
        }
        // Mean of 0..128 is 63.5
        assert_eq!(cal.correct(100.0), Some(36.5));
        assert_eq!(cal.bias(), Some(63.5));
        assert_eq!(store.get("x"), Some(63.5));
        assert_eq!(cal.correct(63.5), Some(0.0));
    }

    #[test]
    fn test_stored_bias_skips_calibration() {
        let store = Arc::new(MemoryStore::new());
        store.save("y", 2.0).unwrap();

        let mut cal = calibration(Axis::Y, 128, &store);
        assert!(cal.is_calibrated());
        assert_eq!(cal.correct(5.0), Some(3.0));
    }

    #[test]
    fn test_hamming_is_periodic() {
        let w = hamming(4);
        assert!((w[0] - 0.08).abs() < 1e-12);
        assert!((w[2] - 1.0).abs() < 1e-12);
        assert!((w[1] - w[3]).abs() < 1e-12);
    }

    #[test]
    fn test_fft_finds_oscillation() {
        let store = Arc::new(MemoryStore::new());
        store.save("z", 0.0).unwrap();
        let mut axis = FftAxis::new(calibration(Axis::Z, 128, &store), 64, 52.0);
        assert_eq!(axis.value(), (0.0, 0.0));

        // 8 cycles per 64-sample window lands on bin 8
        for n in 0..64 {
            axis.add(100.0 * (2.0 * PI * 8.0 * n as f64 / 64.0).sin());
        }
        let (freq, power) = axis.value();
        assert!((freq - 8.0 * 52.0 / 64.0).abs() < 1e-9);
        assert!(power > 500.0);
    }

    #[test]
    fn test_swing_resets_on_sign_change() {
        let store = Arc::new(MemoryStore::new());
        store.save("y", 0.0).unwrap();
        let mut axis = SwingAxis::new(calibration(Axis::Y, 128, &store), 52.0, 200.0);
        assert_eq!(axis.value(), None);

        for _ in 0..26 {
            axis.add(100.0);
        }
        let swing = axis.value().unwrap();
        assert_eq!(swing.frames, 26);
        assert!((swing.elapsed - 0.5).abs() < 1e-12);
        assert!((swing.intensity - 0.5).abs() < 1e-9);

        axis.add(-400.0);
        let swing = axis.value().unwrap();
        assert_eq!(swing.frames, 1);
        assert_eq!(swing.intensity, 1.0);
    }

    #[test]
    fn test_last_value_and_delta() {
        let store = Arc::new(MemoryStore::new());
        store.save("x", 1.0).unwrap();
        let mut axis = LastValueAxis::new(calibration(Axis::X, 128, &store));

        axis.add(3.0);
        assert_eq!(axis.value(), Some((2.0, 0.0)));
        axis.add(6.0);
        assert_eq!(axis.value(), Some((5.0, 3.0)));
    }

    #[test]
    fn test_axis_gestures() {
        assert_eq!(Axis::Y.gesture(), Gesture::Yes);
        assert_eq!(Axis::Z.gesture(), Gesture::No);
        assert_eq!(Axis::X.gesture().to_string(), "meh");
    }
}
