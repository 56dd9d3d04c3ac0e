/// Heart-rate excitement detector
///
/// The rate is "interesting" while the regression slope keeps climbing and
/// the rate has recovered past the reference left by the last completed fall
/// or coast. A plain climb back to baseline is not enough.
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::config::ExcitementConfig;
use crate::heart::HeartSample;

use super::slope::Slope;
use super::window::{SlopeKind, Window};

/// Coarse state reported to scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExcitementState {
    Excite,
    Climb,
    Fall,
    Coast,
}

impl ExcitementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExcitementState::Excite => "excite",
            ExcitementState::Climb => "climb",
            ExcitementState::Fall => "fall",
            ExcitementState::Coast => "coast",
        }
    }
}

impl fmt::Display for ExcitementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SlopeKind> for ExcitementState {
    fn from(kind: SlopeKind) -> Self {
        match kind {
            SlopeKind::Climb => ExcitementState::Climb,
            SlopeKind::Fall => ExcitementState::Fall,
            SlopeKind::Coast => ExcitementState::Coast,
        }
    }
}

/// Span of consecutive interesting samples
#[derive(Debug, Clone, PartialEq)]
pub struct HSpan {
    pub min_sample: HeartSample,
    pub max_sample: HeartSample,
}

impl HSpan {
    pub fn new(sample: HeartSample) -> Self {
        Self {
            min_sample: sample.clone(),
            max_sample: sample,
        }
    }

    pub fn add(&mut self, sample: HeartSample) {
        self.max_sample = sample;
    }

    pub fn duration(&self) -> f64 {
        self.max_sample.seconds_since(&self.min_sample)
    }
}

/// Rate a climb has to recover past, from the most recent completed fall or
/// coast. `coast_offset` only applies when no fall has been seen.
pub fn recovery_threshold(last_fall: Option<&Slope>, last_coast: Option<&Slope>, coast_offset: f64) -> Option<f64> {
    match (last_fall, last_coast) {
        (None, None) => None,
        (None, Some(coast)) => Some(coast.mid_rate() + coast_offset),
        (Some(fall), None) => Some(fall.min_rate),
        (Some(fall), Some(coast)) => {
            let fall_end = fall.last().map(|s| s.time);
            let coast_end = coast.last().map(|s| s.time);
            if coast_end < fall_end {
                Some(fall.min_rate)
            } else {
                Some(coast.mid_rate())
            }
        }
    }
}

fn has_recovered(config: &ExcitementConfig, threshold: f64, cur_rate: f64, prev_rate: f64) -> bool {
    let rising = !config.require_rising_rate || cur_rate > prev_rate;
    rising && cur_rate >= threshold
}

pub struct Excitement {
    config: ExcitementConfig,
    history: VecDeque<HeartSample>,
    window: Window,
    hspans: Vec<HSpan>,
    current_hspan: Option<HSpan>,
    interesting: bool,
    summary: String,
}

impl Excitement {
    pub fn new(config: &ExcitementConfig) -> Self {
        Self {
            config: config.clone(),
            history: VecDeque::with_capacity(config.history_len),
            window: Window::new(config),
            hspans: Vec::new(),
            current_hspan: None,
            interesting: false,
            summary: String::new(),
        }
    }

    /// Feed the next sample and return the resulting state
    pub fn process(&mut self, sample: HeartSample) -> ExcitementState {
        if self.history.len() == self.config.history_len.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(sample);
        self.check_history();
        self.state()
    }

    fn check_history(&mut self) {
        if self.history.len() < 2 {
            return;
        }
        let samples: Vec<HeartSample> = self.history.iter().cloned().collect();
        self.window.sample(&samples);
        let mut summary = self.window.summary().to_string();

        let cur_rate = samples[samples.len() - 1].rate;
        let prev_rate = samples[samples.len() - 2].rate;

        self.interesting = false;
        if self.window.slope_climbing && self.window.falls.current().is_none() {
            let threshold = recovery_threshold(
                self.window.falls.last_committed(),
                self.window.coasts.last_committed(),
                self.config.coast_threshold_offset,
            );
            if let Some(threshold) = threshold {
                self.interesting = has_recovered(&self.config, threshold, cur_rate, prev_rate);
            }
        }

        let newest = samples[samples.len() - 1].clone();
        if self.interesting {
            summary.push('!');
            match self.current_hspan.as_mut() {
                Some(span) => span.add(newest),
                None => self.current_hspan = Some(HSpan::new(newest)),
            }
        } else if let Some(span) = self.current_hspan.take() {
            tracing::debug!(
                "Excitement span closed: {:.0} -> {:.0} over {:.1}s",
                span.min_sample.rate,
                span.max_sample.rate,
                span.duration()
            );
            self.hspans.push(span);
        }
        self.summary = summary;
    }

    pub fn state(&self) -> ExcitementState {
        if self.interesting {
            ExcitementState::Excite
        } else {
            self.current_slope()
                .map(ExcitementState::from)
                .unwrap_or(ExcitementState::Coast)
        }
    }

    /// The active slope that started most recently, if any
    pub fn current_slope(&self) -> Option<SlopeKind> {
        self.window.current_slope()
    }

    pub fn is_interesting(&self) -> bool {
        self.interesting
    }

    pub fn last_rate(&self) -> f64 {
        self.history.back().map_or(0.0, |s| s.rate)
    }

    pub fn last_slope(&self) -> f64 {
        self.window.last_slope
    }

    pub fn slope_climbing(&self) -> bool {
        self.window.slope_climbing
    }

    pub fn climbing(&self) -> bool {
        self.window.climbs.current().is_some()
    }

    pub fn falling(&self) -> bool {
        self.window.falls.current().is_some()
    }

    pub fn coasting(&self) -> bool {
        self.window.coasts.current().is_some()
    }

    /// Status glyphs: climb, fall, coast, slope climbing, then `!` when
    /// interesting
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Completed spans of interesting samples
    pub fn hspans(&self) -> &[HSpan] {
        &self.hspans
    }

    pub fn current_hspan(&self) -> Option<&HSpan> {
        self.current_hspan.as_ref()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// One-line status used by the `heart` command
    pub fn status_line(&self) -> String {
        let rates: Vec<String> = self.history.iter().map(|s| format!("{:3.0}", s.rate)).collect();
        format!(
            "History [{}] {}s: {:+.4}: {} {}",
            rates.join(", "),
            self.window.width_seconds(),
            self.last_slope(),
            self.summary,
            self.state()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heart::sample::NANOS_PER_SECOND;

    fn at(seconds: f64, rate: f64) -> HeartSample {
        HeartSample::new((seconds * NANOS_PER_SECOND) as i64, rate)
    }

    fn narrow_window() -> ExcitementConfig {
        ExcitementConfig {
            window_seconds: 2.0,
            ..ExcitementConfig::default()
        }
    }

    #[test]
    fn test_needs_two_samples() {
        let mut excitement = Excitement::new(&ExcitementConfig::default());
        assert_eq!(excitement.process(at(0.0, 60.0)), ExcitementState::Coast);
        assert_eq!(excitement.summary(), "");
        assert_eq!(excitement.last_rate(), 60.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut excitement = Excitement::new(&ExcitementConfig::default());
        for i in 0..50 {
            excitement.process(at(i as f64, 60.0));
        }
        assert!(excitement.status_line().matches(',').count() == 19);
    }

    #[test]
    fn test_excite_after_recovering_past_fall_minimum() {
        let mut excitement = Excitement::new(&narrow_window());

        // Fall from 65 to 55 at 2 bpm/s
        for (i, rate) in [65.0, 63.0, 61.0, 59.0, 57.0, 55.0].into_iter().enumerate() {
            excitement.process(at(i as f64, rate));
        }
        assert!(excitement.falling());
        assert_eq!(excitement.state(), ExcitementState::Fall);

        // Still falling over the window [57, 55, 56]
        excitement.process(at(6.0, 56.0));
        assert!(!excitement.is_interesting());

        // Climb: the fall commits with min_rate 55 and 58 is past it
        assert_eq!(excitement.process(at(7.0, 58.0)), ExcitementState::Excite);
        let fall = excitement.window().falls.last_committed().unwrap();
        assert_eq!(fall.min_rate, 55.0);
        assert!(excitement.summary().ends_with('!'));

        assert_eq!(excitement.process(at(8.0, 61.0)), ExcitementState::Excite);
        assert_eq!(excitement.current_hspan().unwrap().max_sample.rate, 61.0);

        // Slope stops growing: the span is closed
        assert_ne!(excitement.process(at(9.0, 61.0)), ExcitementState::Excite);
        assert_eq!(excitement.hspans().len(), 1);
        let span = &excitement.hspans()[0];
        assert_eq!(span.min_sample.rate, 58.0);
        assert_eq!(span.max_sample.rate, 61.0);
        assert_eq!(span.duration(), 1.0);
    }

    #[test]
    fn test_plain_climb_is_not_exciting() {
        let mut excitement = Excitement::new(&ExcitementConfig::default());
        for i in 0..8 {
            excitement.process(at(i as f64, 60.0 + 3.0 * i as f64));
        }
        assert!(excitement.climbing());
        assert!(!excitement.is_interesting());
        assert_eq!(excitement.state(), ExcitementState::Climb);
    }

    fn slope(points: &[(f64, f64)]) -> Slope {
        let samples: Vec<HeartSample> = points.iter().map(|(t, r)| at(*t, *r)).collect();
        Slope::new(&samples, 0.0)
    }

    #[test]
    fn test_threshold_without_references() {
        assert_eq!(recovery_threshold(None, None, 1.0), None);
    }

    #[test]
    fn test_threshold_from_coast_only() {
        let coast = slope(&[(0.0, 60.0), (4.0, 60.5), (8.0, 60.2)]);
        assert_eq!(coast.mid_rate(), 60.25);

        let offset = ExcitementConfig::default().coast_threshold_offset;
        assert_eq!(recovery_threshold(None, Some(&coast), offset), Some(61.25));
        assert_eq!(recovery_threshold(None, Some(&coast), 0.0), Some(60.25));

        // Climbing back to 60.6 after a dip does not clear the default reference
        let config = ExcitementConfig::default();
        assert!(!has_recovered(&config, 61.25, 60.6, 56.0));
        assert!(has_recovered(&config, 61.25, 61.5, 60.6));
    }

    #[test]
    fn test_threshold_from_fall_only() {
        let fall = slope(&[(0.0, 70.0), (3.0, 64.0), (6.0, 58.0)]);
        assert_eq!(recovery_threshold(Some(&fall), None, 1.0), Some(58.0));
    }

    #[test]
    fn test_most_recent_reference_wins() {
        let early_coast = slope(&[(0.0, 80.0), (8.0, 80.0)]);
        let late_fall = slope(&[(10.0, 76.0), (16.0, 66.0)]);
        assert_eq!(recovery_threshold(Some(&late_fall), Some(&early_coast), 1.0), Some(66.0));

        let early_fall = slope(&[(0.0, 76.0), (6.0, 66.0)]);
        let late_coast = slope(&[(8.0, 70.0), (16.0, 72.0)]);
        // The offset is not applied when a fall exists
        assert_eq!(recovery_threshold(Some(&early_fall), Some(&late_coast), 1.0), Some(71.0));

        // Ending together: the coast is taken
        let fall = slope(&[(0.0, 76.0), (8.0, 66.0)]);
        let coast = slope(&[(2.0, 70.0), (8.0, 70.0)]);
        assert_eq!(recovery_threshold(Some(&fall), Some(&coast), 1.0), Some(70.0));
    }

    #[test]
    fn test_rising_rate_requirement() {
        let strict = ExcitementConfig::default();
        assert!(strict.require_rising_rate);
        assert!(!has_recovered(&strict, 60.0, 62.0, 62.0));
        assert!(!has_recovered(&strict, 60.0, 61.0, 63.0));
        assert!(has_recovered(&strict, 60.0, 63.0, 61.0));

        let relaxed = ExcitementConfig {
            require_rising_rate: false,
            ..ExcitementConfig::default()
        };
        assert!(has_recovered(&relaxed, 60.0, 62.0, 62.0));
        assert!(has_recovered(&relaxed, 60.0, 61.0, 63.0));
        assert!(!has_recovered(&relaxed, 60.0, 59.0, 58.0));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ExcitementState::Excite.to_string(), "excite");
        assert_eq!(
            serde_json::to_value(ExcitementState::Coast).unwrap(),
            serde_json::json!("coast")
        );
    }
}
