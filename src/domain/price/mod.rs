//! Price domain - sampling, history and drawdown analysis

mod drawdown;
mod history;
mod moving_average;
mod price_feed;

pub use drawdown::{
    DrawdownDetector, DrawdownEvent, DrawdownState, DrawdownVerdict, ALERT_COOLDOWN_SECS,
};
pub use history::HistoryStore;
pub use moving_average::MovingAverageCalculator;
pub use price_feed::{BackoffPolicy, PriceSource, RetryingFetcher};

use chrono::{DateTime, Utc};

/// One observation of the tracked instrument
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    /// Trailing simple moving average at append time, `None` until enough samples exist
    pub sma: Option<f64>,
}

impl PriceSample {
    pub fn new(timestamp: DateTime<Utc>, price: f64, sma: Option<f64>) -> Self {
        Self {
            timestamp,
            price,
            sma,
        }
    }
}
