/// Sliding regression window over heart-rate history
use std::fmt;

use crate::config::ExcitementConfig;
use crate::heart::sample::NANOS_PER_SECOND;
use crate::heart::HeartSample;

use super::slope::Slopes;

/// Least-squares fit of `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

/// Ordinary least squares; None with fewer than two points or no spread in x
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<Regression> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut sxx, mut sxy) = (0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some(Regression {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Population variance
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64
}

/// Which accumulator a slope belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopeKind {
    Climb,
    Fall,
    Coast,
}

impl SlopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlopeKind::Climb => "climb",
            SlopeKind::Fall => "fall",
            SlopeKind::Coast => "coast",
        }
    }
}

impl fmt::Display for SlopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const CLIMB_GLYPHS: [char; 4] = ['.', '↑', '↗', '⇥'];
const FALL_GLYPHS: [char; 4] = ['.', '↓', '↘', '⇥'];
const COAST_GLYPHS: [char; 4] = ['.', '↦', '-', '↤'];

/// Regression window feeding the climb, fall and coast accumulators
#[derive(Debug, Clone)]
pub struct Window {
    width_seconds: f64,
    climb_slope: f64,
    fall_slope: f64,
    coast_slope: f64,
    coast_variance: f64,
    pub climbs: Slopes,
    pub falls: Slopes,
    pub coasts: Slopes,
    pub last_slope: f64,
    pub last_variance: f64,
    pub slope_climbing: bool,
    summary: String,
}

impl Window {
    pub fn new(config: &ExcitementConfig) -> Self {
        Self {
            width_seconds: config.window_seconds,
            climb_slope: config.climb_slope,
            fall_slope: config.fall_slope,
            coast_slope: config.coast_slope,
            coast_variance: config.coast_variance,
            climbs: Slopes::new(config.climb_min_duration, config.climb_min_height),
            falls: Slopes::new(config.fall_min_duration, config.fall_min_height),
            coasts: Slopes::new(config.coast_min_duration, config.coast_min_height),
            last_slope: 0.0,
            last_variance: 0.0,
            slope_climbing: false,
            summary: " ".to_string(),
        }
    }

    pub fn width_seconds(&self) -> f64 {
        self.width_seconds
    }

    /// Status glyphs of the last update
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Update the accumulators from the samples within the window width of
    /// the newest one. Returns false if there was not enough data.
    pub fn sample(&mut self, history: &[HeartSample]) -> bool {
        let Some(last) = history.last() else {
            return false;
        };
        let last_time = last.time;
        let threshold = last_time as f64 - self.width_seconds * NANOS_PER_SECOND;
        let window: Vec<HeartSample> = history
            .iter()
            .filter(|s| s.time as f64 >= threshold)
            .cloned()
            .collect();
        if window.len() <= 1 {
            return false;
        }

        let xs: Vec<f64> = window
            .iter()
            .map(|s| (s.time - last_time) as f64 / NANOS_PER_SECOND)
            .collect();
        let ys: Vec<f64> = window.iter().map(|s| s.rate).collect();
        let Some(regression) = linear_regression(&xs, &ys) else {
            return false;
        };
        let slope = regression.slope;
        let variance = variance(&ys);

        let c = self.climbs.check(&window, slope, slope > self.climb_slope);
        let f = self.falls.check(&window, slope, slope < -self.fall_slope);
        let flat = variance < self.coast_variance
            || (slope < self.coast_slope && slope > -self.coast_slope);
        let q = self.coasts.check(&window, slope, flat);

        self.slope_climbing = slope > 0.0 && slope >= self.last_slope;

        let mut summary = String::with_capacity(16);
        summary.push(CLIMB_GLYPHS[c.index()]);
        summary.push(FALL_GLYPHS[f.index()]);
        summary.push(COAST_GLYPHS[q.index()]);
        summary.push(if self.slope_climbing { '↺' } else { ' ' });
        self.summary = summary;

        self.last_slope = slope;
        self.last_variance = variance;
        true
    }

    /// The active accumulator that started most recently
    ///
    /// Ties go to climb, then coast, then fall.
    pub fn current_slope(&self) -> Option<SlopeKind> {
        let candidates = [
            (SlopeKind::Climb, self.climbs.current()),
            (SlopeKind::Coast, self.coasts.current()),
            (SlopeKind::Fall, self.falls.current()),
        ];

        let mut best: Option<(SlopeKind, i64)> = None;
        for (kind, slope) in candidates {
            let Some(start) = slope.and_then(|s| s.first()).map(|s| s.time) else {
                continue;
            };
            if best.map_or(true, |(_, time)| time < start) {
                best = Some((kind, start));
            }
        }
        best.map(|(kind, _)| kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: f64, rate: f64) -> HeartSample {
        HeartSample::new((seconds * NANOS_PER_SECOND) as i64, rate)
    }

    #[test]
    fn test_regression_of_a_line() {
        let reg = linear_regression(&[-2.0, -1.0, 0.0], &[57.0, 55.0, 56.0]).unwrap();
        assert!((reg.slope + 0.5).abs() < 1e-12);

        let reg = linear_regression(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((reg.slope - 2.0).abs() < 1e-12);
        assert!((reg.intercept - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_regression_needs_spread() {
        assert!(linear_regression(&[1.0], &[1.0]).is_none());
        assert!(linear_regression(&[1.0, 1.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_population_variance() {
        assert_eq!(variance(&[65.0, 63.0]), 1.0);
        assert!((variance(&[57.0, 55.0, 56.0]) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(variance(&[]), 0.0);
    }

    #[test]
    fn test_window_ignores_single_sample() {
        let mut window = Window::new(&ExcitementConfig::default());
        assert!(!window.sample(&[at(0.0, 60.0)]));
        // Samples older than the window width are left out
        assert!(!window.sample(&[at(0.0, 60.0), at(30.0, 61.0)]));
    }

    #[test]
    fn test_window_classifies_climb() {
        let mut window = Window::new(&ExcitementConfig::default());
        let history: Vec<HeartSample> = (0..5).map(|i| at(i as f64, 60.0 + 2.0 * i as f64)).collect();

        assert!(window.sample(&history));
        assert!((window.last_slope - 2.0).abs() < 1e-9);
        assert!(window.slope_climbing);
        assert!(window.climbs.current().is_some());
        assert!(window.falls.current().is_none());
        assert_eq!(window.summary(), "↑..↺");
        assert_eq!(window.current_slope(), Some(SlopeKind::Climb));
    }

    #[test]
    fn test_window_classifies_flat_rate_as_coast() {
        let mut window = Window::new(&ExcitementConfig::default());
        let history: Vec<HeartSample> = (0..5).map(|i| at(i as f64, 60.0)).collect();

        assert!(window.sample(&history));
        assert_eq!(window.summary(), "..↦ ");
        assert_eq!(window.current_slope(), Some(SlopeKind::Coast));
    }
}
