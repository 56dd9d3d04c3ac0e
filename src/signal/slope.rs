/// Slope accumulators
///
/// A [`Slope`] is a contiguous run of samples during which one threshold
/// condition held. [`Slopes`] starts, extends and finally commits or discards
/// them as the condition toggles.
use crate::heart::HeartSample;
use crate::heart::sample::NANOS_PER_SECOND;

#[derive(Debug, Clone, PartialEq)]
pub struct Slope {
    samples: Vec<HeartSample>,
    pub min_slope: f64,
    pub max_slope: f64,
    pub last_slope: f64,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl Slope {
    pub fn new(samples: &[HeartSample], slope: f64) -> Self {
        let mut result = Self {
            samples: Vec::with_capacity(samples.len()),
            min_slope: slope,
            max_slope: slope,
            last_slope: slope,
            min_rate: f64::INFINITY,
            max_rate: f64::NEG_INFINITY,
        };
        result.append(samples);
        result
    }

    /// Append the samples newer than the last one kept and track extrema
    pub fn extend(&mut self, samples: &[HeartSample], slope: f64) {
        self.append(samples);
        self.min_slope = self.min_slope.min(slope);
        self.max_slope = self.max_slope.max(slope);
        self.last_slope = slope;
    }

    fn append(&mut self, samples: &[HeartSample]) {
        for sample in samples {
            if let Some(last) = self.samples.last() {
                if sample.time <= last.time {
                    continue;
                }
            }
            self.min_rate = self.min_rate.min(sample.rate);
            self.max_rate = self.max_rate.max(sample.rate);
            self.samples.push(sample.clone());
        }
    }

    pub fn samples(&self) -> &[HeartSample] {
        &self.samples
    }

    pub fn first(&self) -> Option<&HeartSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&HeartSample> {
        self.samples.last()
    }

    /// Seconds between the first and the last sample
    pub fn duration(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => (last.time - first.time) as f64 / NANOS_PER_SECOND,
            _ => 0.0,
        }
    }

    pub fn height(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.max_rate - self.min_rate
        }
    }

    pub fn mid_rate(&self) -> f64 {
        (self.min_rate + self.max_rate) / 2.0
    }
}

/// Outcome of [`Slopes::check`]; the discriminant indexes status glyphs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopeCheck {
    Inactive = 0,
    Started = 1,
    Extended = 2,
    Committed = 3,
}

impl SlopeCheck {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Accumulator for one threshold condition
#[derive(Debug, Clone)]
pub struct Slopes {
    slopes: Vec<Slope>,
    current: Option<Slope>,
    min_duration: f64,
    min_height: f64,
}

impl Slopes {
    pub fn new(min_duration: f64, min_height: f64) -> Self {
        Self {
            slopes: Vec::new(),
            current: None,
            min_duration,
            min_height,
        }
    }

    /// Feed the current window.
    ///
    /// When `above` turns false the running slope is committed only if it
    /// lasted longer than the minimum duration and rose higher than the
    /// minimum height; otherwise it is dropped.
    pub fn check(&mut self, window: &[HeartSample], slope: f64, above: bool) -> SlopeCheck {
        if above {
            return match self.current.as_mut() {
                Some(current) => {
                    current.extend(window, slope);
                    SlopeCheck::Extended
                }
                None => {
                    self.current = Some(Slope::new(window, slope));
                    SlopeCheck::Started
                }
            };
        }

        match self.current.take() {
            Some(current)
                if current.duration() > self.min_duration && current.height() > self.min_height =>
            {
                self.slopes.push(current);
                SlopeCheck::Committed
            }
            _ => SlopeCheck::Inactive,
        }
    }

    /// Committed slopes, oldest first
    pub fn committed(&self) -> &[Slope] {
        &self.slopes
    }

    pub fn last_committed(&self) -> Option<&Slope> {
        self.slopes.last()
    }

    pub fn current(&self) -> Option<&Slope> {
        self.current.as_ref()
    }
}
