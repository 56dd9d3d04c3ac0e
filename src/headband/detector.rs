/// Gyro detectors and common types
///
/// Defines the interface for the head-movement processing modes.
use std::sync::Arc;

use crate::config::GyroConfig;
use crate::error::ComponentError;
use crate::messaging::MessageKind;
use crate::signal::{Axis, BiasCalibration, CalibrationStore, FftAxis, LastValueAxis, SwingAxis};

/// A batch of gyro frames handed to a detector
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    /// One `[x, y, z]` reading in degrees per second per frame
    pub samples: &'a [[f64; 3]],
    /// Timestamps of the frames in seconds
    pub timestamps: &'a [f64],
}

impl<'a> DetectionContext<'a> {
    pub fn new(samples: &'a [[f64; 3]], timestamps: &'a [f64]) -> Self {
        Self {
            samples,
            timestamps,
        }
    }

    /// Timestamp of the newest frame
    pub fn last_timestamp(&self) -> f64 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }
}

/// Detector trait
///
/// Implement this trait to add a head-movement processing mode.
pub trait Detector: Send {
    /// Feed a batch and return the event to post, if any
    fn detect(&mut self, context: &DetectionContext<'_>) -> Option<MessageKind>;

    /// Mode name (for selection and logging)
    fn name(&self) -> &'static str;

    /// Check if every axis finished calibrating
    fn is_calibrated(&self) -> bool;
}

/// `(mode, description)` of every detector
pub const MODES: [(&str, &str); 3] = [
    ("shake", "Rhythmic head shaking (FFT)"),
    ("yesno", "Yes / no / meh head gestures"),
    ("raw", "Bias-corrected gyro values"),
];

/// Build the detector for `mode`
pub fn detector_for(
    mode: &str,
    config: &GyroConfig,
    store: &Arc<dyn CalibrationStore>,
) -> Result<Box<dyn Detector>, ComponentError> {
    let calibration =
        |axis: Axis| BiasCalibration::new(axis, config.calibration_samples, Arc::clone(store));

    match mode {
        "shake" => Ok(Box::new(ShakeDetector {
            axes: Axis::ALL.map(|axis| FftAxis::new(calibration(axis), config.fft_window, config.sample_rate)),
            threshold: config.shake_power_threshold,
        })),
        "yesno" => Ok(Box::new(YesNoDetector {
            axes: Axis::ALL.map(|axis| {
                SwingAxis::new(calibration(axis), config.sample_rate, config.max_dps[axis.index()])
            }),
        })),
        "raw" => Ok(Box::new(RawDetector {
            axes: Axis::ALL.map(|axis| LastValueAxis::new(calibration(axis))),
        })),
        other => Err(ComponentError::UnknownMode(other.to_string())),
    }
}

/// Reports the axis with the strongest oscillation
pub struct ShakeDetector {
    axes: [FftAxis; 3],
    threshold: f64,
}

impl Detector for ShakeDetector {
    fn detect(&mut self, context: &DetectionContext<'_>) -> Option<MessageKind> {
        for sample in context.samples {
            for (axis, value) in self.axes.iter_mut().zip(sample) {
                axis.add(*value);
            }
        }

        let mut selected: Option<(Axis, f64, f64)> = None;
        for axis in &self.axes {
            let (freq, power) = axis.value();
            if selected.map_or(true, |(_, _, best)| best < power) {
                selected = Some((axis.axis(), freq, power));
            }
        }

        let (axis, freq, power) = selected?;
        if power > self.threshold {
            Some(MessageKind::HeadShaken {
                axis,
                freq,
                power: 10.0 * (power * power).log10(),
            })
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "shake"
    }

    fn is_calibrated(&self) -> bool {
        self.axes.iter().all(|a| a.calibration().is_calibrated())
    }
}

/// Classifies the most intense swing as yes, no or meh
pub struct YesNoDetector {
    axes: [SwingAxis; 3],
}

impl Detector for YesNoDetector {
    fn detect(&mut self, context: &DetectionContext<'_>) -> Option<MessageKind> {
        for sample in context.samples {
            for (axis, value) in self.axes.iter_mut().zip(sample) {
                axis.add(*value);
            }
        }

        let (axis, swing) = self
            .axes
            .iter()
            .filter_map(|axis| axis.value().map(|swing| (axis.axis(), swing)))
            .fold(None, |best: Option<(Axis, crate::signal::Swing)>, (axis, swing)| match best {
                Some((_, top)) if top.intensity >= swing.intensity => best,
                _ => Some((axis, swing)),
            })?;

        Some(MessageKind::HeadYesNo {
            gesture: axis.gesture(),
            intensity: swing.intensity,
            ts: context.last_timestamp(),
            frames: swing.frames,
        })
    }

    fn name(&self) -> &'static str {
        "yesno"
    }

    fn is_calibrated(&self) -> bool {
        self.axes.iter().all(|a| a.calibration().is_calibrated())
    }
}

/// Passes through the last corrected values
pub struct RawDetector {
    axes: [LastValueAxis; 3],
}

impl Detector for RawDetector {
    fn detect(&mut self, context: &DetectionContext<'_>) -> Option<MessageKind> {
        for sample in context.samples {
            for (axis, value) in self.axes.iter_mut().zip(sample) {
                axis.add(*value);
            }
        }

        let [x, y, z] = [
            self.axes[0].value()?,
            self.axes[1].value()?,
            self.axes[2].value()?,
        ];
        Some(MessageKind::HeadGyro {
            x: x.0,
            y: y.0,
            z: z.0,
            dx: x.1,
            dy: y.1,
            dz: z.1,
        })
    }

    fn name(&self) -> &'static str {
        "raw"
    }

    fn is_calibrated(&self) -> bool {
        self.axes.iter().all(|a| a.calibration().is_calibrated())
    }
}
