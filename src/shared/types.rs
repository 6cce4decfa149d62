//! Common types used across the application

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::shared::errors::ConfigError;
use crate::shared::utils::default_session_file;

/// Telegram bot credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Tracker configuration, resolved once at startup and never mutated afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub ticker: String,
    pub sma_period: usize,
    pub check_interval_secs: u64,
    pub drop_threshold_percent: f64,
    pub alert_window_minutes: u64,
    pub max_retries: u32,
    pub use_system_beep: bool,
    pub telegram: Option<TelegramConfig>,
    /// Defaults to `<TICKER>_session.json` in the working directory.
    pub session_file: Option<PathBuf>,
    pub export_dir: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            ticker: "BTC-USD".to_string(),
            sma_period: 10,
            check_interval_secs: 60,
            drop_threshold_percent: 2.0,
            alert_window_minutes: 60,
            max_retries: 3,
            use_system_beep: true,
            telegram: None,
            session_file: None,
            export_dir: PathBuf::from("."),
        }
    }
}

impl TrackerConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn session_path(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| default_session_file(&self.ticker))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticker.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "ticker",
                reason: "must not be empty".to_string(),
            });
        }
        if self.sma_period < 1 {
            return Err(ConfigError::Invalid {
                field: "sma_period",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.check_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "check_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.drop_threshold_percent.is_finite() || self.drop_threshold_percent <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "price_drop_threshold",
                reason: format!("must be a positive percentage, got {}", self.drop_threshold_percent),
            });
        }
        if self.alert_window_minutes == 0 {
            return Err(ConfigError::Invalid {
                field: "alert_window_minutes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_retries < 1 {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
