//! Short-window drawdown detection with alert cooldown

use chrono::{DateTime, Duration, Utc};

use super::PriceSample;
use crate::shared::utils::calculate_drop_percent;

/// Minimum spacing between two alerts
pub const ALERT_COOLDOWN_SECS: i64 = 300;

/// A qualifying drop inside the trailing window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownEvent {
    pub highest: f64,
    pub lowest: f64,
    /// Price of the last sample inside the window
    pub current: f64,
    pub drop_percent: f64,
    pub window_minutes: u64,
    pub detected_at: DateTime<Utc>,
}

/// Alert bookkeeping carried between evaluations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawdownState {
    pub last_alert_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawdownVerdict {
    /// Not enough data, or the drop is below threshold
    Quiet,
    /// The drop qualified but an alert fired less than the cooldown ago; the event is dropped
    Suppressed { drop_percent: f64 },
    Triggered(DrawdownEvent),
}

impl DrawdownVerdict {
    pub fn is_triggered(&self) -> bool {
        matches!(self, DrawdownVerdict::Triggered(_))
    }

    pub fn event(&self) -> Option<&DrawdownEvent> {
        match self {
            DrawdownVerdict::Triggered(event) => Some(event),
            _ => None,
        }
    }
}

/// Peak-to-trough drawdown detector over a trailing time window
#[derive(Debug, Clone)]
pub struct DrawdownDetector {
    threshold_percent: f64,
    window_minutes: u64,
    cooldown: Duration,
}

impl DrawdownDetector {
    pub fn new(threshold_percent: f64, window_minutes: u64) -> Self {
        Self {
            threshold_percent,
            window_minutes,
            cooldown: Duration::seconds(ALERT_COOLDOWN_SECS),
        }
    }

    /// Evaluate the samples stamped at or after `now - window`.
    ///
    /// `history` must be in chronological order. Updates `state` only when an
    /// alert is triggered.
    pub fn evaluate(
        &self,
        history: &[PriceSample],
        now: DateTime<Utc>,
        state: &mut DrawdownState,
    ) -> DrawdownVerdict {
        if history.len() < 2 {
            return DrawdownVerdict::Quiet;
        }

        let window_start = now - Duration::minutes(self.window_minutes as i64);
        let first_in_window = history.partition_point(|s| s.timestamp < window_start);
        let window = &history[first_in_window..];
        if window.len() < 2 {
            return DrawdownVerdict::Quiet;
        }

        let (lowest, highest) = window.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.price), hi.max(s.price))
        });
        let current = window[window.len() - 1].price;
        let drop_percent = calculate_drop_percent(highest, lowest);

        if drop_percent < self.threshold_percent {
            return DrawdownVerdict::Quiet;
        }

        if let Some(last) = state.last_alert_time {
            if now - last < self.cooldown {
                return DrawdownVerdict::Suppressed { drop_percent };
            }
        }

        state.last_alert_time = Some(now);
        DrawdownVerdict::Triggered(DrawdownEvent {
            highest,
            lowest,
            current,
            drop_percent,
            window_minutes: self.window_minutes,
            detected_at: now,
        })
    }
}
