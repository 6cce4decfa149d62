//! Application services and use cases

use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::application::tracker::{TrackingLoop, TrackingReport};
use crate::domain::alert::AlertDispatcher;
use crate::domain::price::HistoryStore;
use crate::infrastructure::notifications::{system_audio_channel, TelegramChannel};
use crate::infrastructure::persistence::{CsvExporter, SessionStore};
use crate::infrastructure::price_source::YahooFinanceSource;
use crate::shared::errors::AppError;
use crate::shared::types::TrackerConfig;

/// What the session file currently holds
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub ticker: String,
    pub path: PathBuf,
    pub samples: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub last_price: Option<f64>,
    pub last_sma: Option<f64>,
    pub price_range: Option<(f64, f64)>,
}

/// Builds tracker components from a resolved [`TrackerConfig`]
pub struct TrackerService {
    config: TrackerConfig,
}

impl TrackerService {
    pub fn new(config: &TrackerConfig) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// Register every channel the configuration enables
    pub fn build_dispatcher(&self) -> Result<AlertDispatcher, AppError> {
        let mut dispatcher =
            AlertDispatcher::new(&self.config.ticker, self.config.drop_threshold_percent);

        if self.config.use_system_beep {
            dispatcher = dispatcher.with_audio(system_audio_channel());
        }

        if let Some(telegram) = &self.config.telegram {
            let channel = TelegramChannel::new(telegram.bot_token.clone())?;
            dispatcher = dispatcher.with_message_channel(telegram.chat_id.clone(), Box::new(channel));
            info!("✓ Telegram notifications enabled");
        }

        Ok(dispatcher)
    }

    /// Track the configured ticker against Yahoo Finance until stopped
    pub async fn start_tracking(
        &self,
        duration: Option<Duration>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<TrackingReport, AppError> {
        let source = YahooFinanceSource::new()?;
        let dispatcher = self.build_dispatcher()?;

        let mut tracker = TrackingLoop::new(self.config.clone(), source, dispatcher)
            .with_duration_limit(duration);

        Ok(tracker.run(shutdown).await)
    }

    /// Write the saved session to CSV without tracking
    pub fn export_session(&self) -> Result<Option<PathBuf>, AppError> {
        let store = SessionStore::new(self.config.session_path());
        let samples = match store.load_for(&self.config.ticker)? {
            Some(snapshot) => snapshot.samples,
            None => Vec::new(),
        };

        let exporter = CsvExporter::new(self.config.export_dir.clone());
        Ok(exporter.export(&self.config.ticker, &samples, Local::now())?)
    }

    /// `None` when no session has been saved for this ticker yet
    pub fn session_status(&self) -> Result<Option<SessionStatus>, AppError> {
        let store = SessionStore::new(self.config.session_path());
        let snapshot = match store.load_for(&self.config.ticker)? {
            Some(snapshot) => snapshot,
            None => return Ok(None),
        };

        let mut history = HistoryStore::new(self.config.sma_period);
        history.restore(snapshot.samples);
        let samples = history.samples();
        let last = history.last();

        Ok(Some(SessionStatus {
            ticker: self.config.ticker.clone(),
            path: store.path().to_path_buf(),
            samples: samples.len(),
            first_timestamp: samples.first().map(|s| s.timestamp),
            last_timestamp: last.map(|s| s.timestamp),
            last_price: last.map(|s| s.price),
            last_sma: last.and_then(|s| s.sma),
            price_range: history.price_range(),
        }))
    }
}
