/// Nod to ask for more, shake to ask for less
///
/// Yes gestures raise the group power, no and meh lower it. Consecutive
/// gestures of the same kind form a streak: the longer a yes streak lasts,
/// the faster power rises. While decay is enabled, power slowly drops again
/// every 500 ms after the last gesture.
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::ComponentError;
use crate::messaging::{Message, MessageKind};
use crate::runtime::{Component, Context, TimerId};
use crate::signal::Gesture;

use super::SceneBase;

const DECAY_INTERVAL: Duration = Duration::from_millis(500);
const DECAY_STEP: f32 = 0.02;
const DECAY_TIMER: u64 = 1;

/// Gestures weaker than this are ignored
const MIN_INTENSITY: f64 = 0.1;

/// Gap in seconds that ends a streak
const STREAK_GAP: f64 = 0.3;

/// Headband frames per second
const FRAME_RATE: f64 = 52.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Streak {
    gesture: Gesture,
    start: f64,
    last: f64,
}

/// Seconds it takes to go from zero to full power at maximum intensity
fn time_to_max(gesture: Gesture) -> f64 {
    match gesture {
        Gesture::Meh => 10.0,
        Gesture::No => 2.0,
        Gesture::Yes => 5.0,
    }
}

pub struct Consent {
    name: String,
    base: SceneBase,
    decay: bool,
    instant_no: bool,
    streak: Option<Streak>,
    timer: Option<TimerId>,
}

impl Consent {
    pub fn new(name: impl Into<String>, group: u32) -> Self {
        Self {
            name: name.into(),
            base: SceneBase::new(group),
            decay: true,
            instant_no: false,
            streak: None,
            timer: None,
        }
    }

    /// Power change for a gesture, or None if it should be ignored
    fn power_change(&mut self, gesture: Gesture, intensity: f64, ts: f64, frames: u32) -> Option<f32> {
        if intensity < MIN_INTENSITY {
            return None;
        }

        let streak = match self.streak {
            Some(streak) if streak.gesture == gesture && ts - streak.last <= STREAK_GAP => Streak {
                last: ts,
                ..streak
            },
            _ => Streak {
                gesture,
                start: ts,
                last: ts,
            },
        };
        self.streak = Some(streak);
        let in_streak = (ts - streak.start).round();

        if gesture == Gesture::No && self.instant_no && intensity < 0.3 {
            return None;
        }

        let mut value = intensity / FRAME_RATE * frames as f64 / time_to_max(gesture);
        if value <= 0.001 {
            return None;
        }

        match gesture {
            Gesture::Meh => Some(-value as f32),
            Gesture::No if self.instant_no => Some(-1.0),
            Gesture::No => Some(-value as f32),
            Gesture::Yes => {
                if in_streak > 0.0 {
                    value *= in_streak + 1.0;
                }
                Some(value as f32)
            }
        }
    }

    fn reset_decay(&mut self, ctx: &mut Context<'_>) {
        if let Some(timer) = self.timer.take() {
            ctx.cancel_timeout(timer);
        }
        if self.decay {
            self.timer = Some(ctx.set_timeout(DECAY_INTERVAL, DECAY_TIMER));
        }
    }

    fn cancel_decay(&mut self, ctx: &mut Context<'_>) {
        if let Some(timer) = self.timer.take() {
            ctx.cancel_timeout(timer);
        }
    }
}

impl Component for Consent {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self, message: &Message, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        if let Some(active) = self.base.update_active(&self.name, message) {
            if !active {
                self.cancel_decay(ctx);
            }
            return Ok(());
        }
        if !self.base.is_active() {
            return Ok(());
        }

        if let MessageKind::HeadYesNo {
            gesture,
            intensity,
            ts,
            frames,
        } = message.kind()
        {
            if let Some(amount) = self.power_change(*gesture, *intensity, *ts, *frames) {
                ctx.send_message(self.base.increase_power(amount));
                self.reset_decay(ctx);
            }
        }
        Ok(())
    }

    fn on_timer(&mut self, token: u64, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        if token == DECAY_TIMER && self.base.is_active() {
            ctx.send_message(self.base.increase_power(-DECAY_STEP));
            self.timer = Some(ctx.set_timeout(DECAY_INTERVAL, DECAY_TIMER));
        }
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["is_active", "group", "set_decay", "set_instant_no"]
    }

    fn call(&mut self, method: &str, args: &[Value], ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        let flag = || {
            args.first()
                .and_then(Value::as_bool)
                .ok_or_else(|| ComponentError::invalid_argument(method, "expected a boolean"))
        };
        match method {
            "is_active" => Ok(json!(self.base.is_active())),
            "group" => Ok(json!(self.base.group())),
            "set_decay" => {
                self.decay = flag()?;
                if !self.decay {
                    self.cancel_decay(ctx);
                }
                Ok(json!(self.decay))
            }
            "set_instant_no" => {
                self.instant_no = flag()?;
                Ok(json!(self.instant_no))
            }
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }

    fn stop(&mut self, ctx: &mut Context<'_>) {
        self.cancel_decay(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: Option<f32>, expected: f32) {
        let actual = actual.expect("expected a power change");
        assert!((actual - expected).abs() < 1e-6, "{actual} != {expected}");
    }

    #[test]
    fn test_weak_gestures_are_ignored() {
        let mut consent = Consent::new("consent", 1);
        assert_eq!(consent.power_change(Gesture::Yes, 0.05, 0.0, 52), None);
        assert!(consent.streak.is_none());
    }

    #[test]
    fn test_single_gestures() {
        let mut consent = Consent::new("consent", 1);
        // 0.5 / 52 * 52 / 5
        approx(consent.power_change(Gesture::Yes, 0.5, 0.0, 52), 0.1);
        // 0.5 / 52 * 52 / 2, new streak
        approx(consent.power_change(Gesture::No, 0.5, 0.1, 52), -0.25);
        approx(consent.power_change(Gesture::Meh, 1.0, 5.0, 52), -0.1);
    }

    #[test]
    fn test_yes_streak_accelerates() {
        let mut consent = Consent::new("consent", 1);
        let mut ts = 0.0;
        let mut last = None;
        while ts < 2.0 {
            last = consent.power_change(Gesture::Yes, 0.5, ts, 52);
            ts += 0.25;
        }
        // Streak started at 0, last gesture at 1.75: in_streak = 2
        approx(last, 0.3);

        // A gap longer than 0.3s starts over
        approx(consent.power_change(Gesture::Yes, 0.5, 3.0, 52), 0.1);
    }

    #[test]
    fn test_instant_no() {
        let mut consent = Consent::new("consent", 1);
        consent.instant_no = true;
        assert_eq!(consent.power_change(Gesture::No, 0.2, 0.0, 52), None);
        approx(consent.power_change(Gesture::No, 0.5, 1.0, 52), -1.0);
    }
}
