use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::shared::errors::ConfigError;
use crate::shared::types::{TelegramConfig, TrackerConfig};

pub const DEFAULT_CONFIG_FILE: &str = "price_tracker_config.toml";

/// Environment variables and the config key each one overrides
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("TRACKER_TICKER", "ticker"),
    ("TRACKER_CHECK_INTERVAL", "check_interval"),
    ("TRACKER_THRESHOLD", "price_drop_threshold"),
    ("TRACKER_SMA_PERIOD", "sma_period"),
    ("TRACKER_ALERT_WINDOW", "alert_window_minutes"),
    ("TRACKER_MAX_RETRIES", "max_retries"),
    ("TELEGRAM_BOT_TOKEN", "telegram_bot_token"),
    ("TELEGRAM_CHAT_ID", "telegram_chat_id"),
];

/// One layer of configuration. Unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub ticker: Option<String>,
    pub sma_period: Option<usize>,
    pub check_interval: Option<u64>,
    pub price_drop_threshold: Option<f64>,
    pub alert_window_minutes: Option<u64>,
    pub max_retries: Option<u32>,
    pub use_system_beep: Option<bool>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub session_file: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
}

impl ConfigLayer {
    /// Overlay `other` on top of `self`
    pub fn merge(&mut self, other: ConfigLayer) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            ticker,
            sma_period,
            check_interval,
            price_drop_threshold,
            alert_window_minutes,
            max_retries,
            use_system_beep,
            telegram_bot_token,
            telegram_chat_id,
            session_file,
            export_dir
        );
    }

    fn into_config(self) -> TrackerConfig {
        let defaults = TrackerConfig::default();
        let telegram = match (self.telegram_bot_token, self.telegram_chat_id) {
            (Some(bot_token), Some(chat_id)) if !bot_token.is_empty() && !chat_id.is_empty() => {
                Some(TelegramConfig { bot_token, chat_id })
            }
            (Some(_), None) => {
                warn!("Telegram bot token provided without a chat ID, Telegram alerts disabled");
                None
            }
            _ => None,
        };

        TrackerConfig {
            ticker: self.ticker.unwrap_or(defaults.ticker),
            sma_period: self.sma_period.unwrap_or(defaults.sma_period),
            check_interval_secs: self.check_interval.unwrap_or(defaults.check_interval_secs),
            drop_threshold_percent: self
                .price_drop_threshold
                .unwrap_or(defaults.drop_threshold_percent),
            alert_window_minutes: self
                .alert_window_minutes
                .unwrap_or(defaults.alert_window_minutes),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            use_system_beep: self.use_system_beep.unwrap_or(defaults.use_system_beep),
            telegram,
            session_file: self.session_file,
            export_dir: self.export_dir.unwrap_or(defaults.export_dir),
        }
    }
}

/// Resolves [`TrackerConfig`] from its layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the tracker configuration: defaults, then the config file, then
    /// process environment, then `overrides`.
    pub fn load_config(
        path: Option<&Path>,
        overrides: ConfigLayer,
    ) -> Result<TrackerConfig, ConfigError> {
        Self::resolve(path, |key| std::env::var(key).ok(), overrides)
    }

    pub fn resolve<F>(
        path: Option<&Path>,
        env: F,
        overrides: ConfigLayer,
    ) -> Result<TrackerConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut layer = ConfigLayer::default();

        if path.exists() {
            match Self::read_file(path) {
                Ok(file_layer) => {
                    info!("✓ Loaded config from {}", path.display());
                    layer.merge(file_layer);
                }
                Err(e) => warn!("Could not load config file: {}", e),
            }
        }

        layer.merge(Self::env_layer(env));
        layer.merge(overrides);

        let config = layer.into_config();
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file; `.json` files are read as JSON, everything else as TOML
    pub fn read_file(path: &Path) -> Result<ConfigLayer, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let parsed = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| ConfigError::Parse {
            path: path.display().to_string(),
            reason,
        })
    }

    fn env_layer<F>(env: F) -> ConfigLayer
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layer = ConfigLayer::default();

        for (var, key) in ENV_OVERRIDES {
            let Some(value) = env(var).filter(|v| !v.is_empty()) else {
                continue;
            };

            let applied = match *key {
                "ticker" => {
                    layer.ticker = Some(value);
                    true
                }
                "check_interval" => set_parsed(&mut layer.check_interval, &value),
                "price_drop_threshold" => set_parsed(&mut layer.price_drop_threshold, &value),
                "sma_period" => set_parsed(&mut layer.sma_period, &value),
                "alert_window_minutes" => set_parsed(&mut layer.alert_window_minutes, &value),
                "max_retries" => set_parsed(&mut layer.max_retries, &value),
                "telegram_bot_token" => {
                    layer.telegram_bot_token = Some(value);
                    true
                }
                "telegram_chat_id" => {
                    layer.telegram_chat_id = Some(value);
                    true
                }
                _ => false,
            };

            if applied {
                info!("✓ Loaded {} from environment variable", key);
            } else {
                warn!("Ignoring unparseable value for {}", var);
            }
        }

        layer
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut Option<T>, raw: &str) -> bool {
    match raw.trim().parse() {
        Ok(v) => {
            *slot = Some(v);
            true
        }
        Err(_) => false,
    }
}
