//! The tracking loop: fetch, record, evaluate, alert, persist

use chrono::{DateTime, Local, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::alert::AlertDispatcher;
use crate::domain::price::{
    BackoffPolicy, DrawdownDetector, DrawdownState, DrawdownVerdict, HistoryStore, PriceSource,
    RetryingFetcher,
};
use crate::infrastructure::persistence::{CsvExporter, SessionStore};
use crate::shared::errors::PersistenceError;
use crate::shared::types::TrackerConfig;
use crate::shared::utils::format_optional_price;

/// Successful checks between two session checkpoints
pub const CHECKPOINT_EVERY: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    DurationElapsed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped(StopReason),
    /// A cycle panicked; holds the panic message
    Failed(String),
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Stopped(_) | LoopState::Failed(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingSummary {
    /// Cycles started, including skipped ones
    pub checks: u64,
    pub alerts: u64,
    pub data_points: usize,
    /// `(lowest, highest)` over the whole history
    pub price_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingReport {
    pub final_state: LoopState,
    pub summary: TrackingSummary,
    pub export_path: Option<PathBuf>,
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Single-instrument tracker.
///
/// Owns the history and alert state exclusively; one cycle runs to completion
/// before the next starts. Cancellation is observed between cycles and during
/// the inter-cycle sleep, never in the middle of a fetch.
pub struct TrackingLoop<S> {
    config: TrackerConfig,
    fetcher: RetryingFetcher<S>,
    history: HistoryStore,
    detector: DrawdownDetector,
    drawdown_state: DrawdownState,
    dispatcher: AlertDispatcher,
    session: SessionStore,
    exporter: CsvExporter,
    state: LoopState,
    duration_limit: Option<Duration>,
    clock: Clock,
    restored: bool,
    checks: u64,
    successful_checks: u64,
    alerts: u64,
}

impl<S: PriceSource> TrackingLoop<S> {
    pub fn new(config: TrackerConfig, source: S, dispatcher: AlertDispatcher) -> Self {
        let fetcher = RetryingFetcher::new(source, config.ticker.clone(), config.max_retries);
        let history = HistoryStore::new(config.sma_period);
        let detector =
            DrawdownDetector::new(config.drop_threshold_percent, config.alert_window_minutes);
        let session = SessionStore::new(config.session_path());
        let exporter = CsvExporter::new(config.export_dir.clone());

        Self {
            config,
            fetcher,
            history,
            detector,
            drawdown_state: DrawdownState::default(),
            dispatcher,
            session,
            exporter,
            state: LoopState::Idle,
            duration_limit: None,
            clock: Box::new(Utc::now),
            restored: false,
            checks: 0,
            successful_checks: 0,
            alerts: 0,
        }
    }

    /// Stop cleanly once `limit` has elapsed since `run` started
    pub fn with_duration_limit(mut self, limit: Option<Duration>) -> Self {
        self.duration_limit = limit;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.fetcher = self.fetcher.with_backoff(backoff);
        self
    }

    /// Source of the timestamps given to new samples
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Load the persisted session into the history. Any failure leaves the
    /// history empty. Returns the number of restored samples.
    pub fn restore_session(&mut self) -> usize {
        self.restored = true;

        match self.session.load_for(&self.config.ticker) {
            Ok(Some(snapshot)) => {
                let count = snapshot.samples.len();
                self.history.restore(snapshot.samples);
                info!("✓ Loaded {} previous records", count);
                count
            }
            Ok(None) => 0,
            Err(PersistenceError::TickerMismatch { expected, found }) => {
                warn!(
                    "Session file {} belongs to {}, not {}; starting fresh",
                    self.session.path().display(),
                    found,
                    expected
                );
                0
            }
            Err(e) => {
                warn!("Could not load previous session: {}", e);
                0
            }
        }
    }

    /// Drive the loop until cancellation or the duration limit.
    ///
    /// A panic inside a cycle ends the loop as [`LoopState::Failed`]. Either way
    /// it finishes with a checkpoint and a summary; the CSV export only happens
    /// on a clean stop.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> TrackingReport {
        if self.state != LoopState::Idle {
            warn!("Tracking loop already finished ({:?})", self.state);
            return self.report(None);
        }

        if !self.restored {
            self.restore_session();
        }

        self.state = LoopState::Running;
        let started = Instant::now();
        info!(
            "Starting price tracking for {} (interval {}s, threshold {}%)",
            self.config.ticker, self.config.check_interval_secs, self.config.drop_threshold_percent
        );

        let final_state = loop {
            if *shutdown.borrow() {
                break LoopState::Stopped(StopReason::Cancelled);
            }
            if let Some(limit) = self.duration_limit {
                if started.elapsed() >= limit {
                    info!("Duration limit reached");
                    break LoopState::Stopped(StopReason::DurationElapsed);
                }
            }

            if let Err(payload) = AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                let reason = panic_message(&*payload);
                error!("Unexpected error, stopping tracker: {}", reason);
                break LoopState::Failed(reason);
            }

            let mut pause = self.config.check_interval();
            if let Some(limit) = self.duration_limit {
                pause = pause.min(limit.saturating_sub(started.elapsed()));
            }

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancelled(&mut shutdown) => {}
            }
        };

        if matches!(final_state, LoopState::Stopped(StopReason::Cancelled)) {
            info!("Stopping tracker...");
        }
        self.state = final_state;
        self.finish()
    }

    /// One check. A fetch that exhausts its retries skips the cycle.
    async fn run_cycle(&mut self) {
        self.checks += 1;

        let price = match self.fetcher.fetch().await {
            Ok(price) => price,
            Err(e) => {
                warn!("Skipping check #{}, no price available: {}", self.checks, e);
                return;
            }
        };

        let sample = self.history.append(price, (self.clock)());
        self.successful_checks += 1;

        info!(
            "{} Price: ${:.2} | SMA: {} | Records: {}",
            self.config.ticker,
            sample.price,
            format_optional_price(sample.sma),
            self.history.len()
        );

        match self
            .detector
            .evaluate(self.history.samples(), sample.timestamp, &mut self.drawdown_state)
        {
            DrawdownVerdict::Triggered(event) => {
                self.alerts += 1;
                let report = self.dispatcher.dispatch(&event).await;
                debug!(
                    delivered = report.delivered(),
                    failed = report.failed(),
                    "Alert dispatched"
                );
            }
            DrawdownVerdict::Suppressed { drop_percent } => {
                debug!("Drop of {:.2}% within cooldown, alert suppressed", drop_percent);
            }
            DrawdownVerdict::Quiet => {}
        }

        if self.successful_checks % CHECKPOINT_EVERY == 0 {
            self.checkpoint();
        }
    }

    fn checkpoint(&self) -> bool {
        match self.session.save(&self.config.ticker, self.history.samples()) {
            Ok(()) => {
                debug!("Checkpoint written to {}", self.session.path().display());
                true
            }
            Err(e) => {
                error!("Failed to save session: {}", e);
                false
            }
        }
    }

    fn finish(&mut self) -> TrackingReport {
        if self.checkpoint() {
            info!("✓ Session saved to {}", self.session.path().display());
        }

        let export_path = match self.state {
            LoopState::Stopped(_) => {
                match self
                    .exporter
                    .export(&self.config.ticker, self.history.samples(), Local::now())
                {
                    Ok(path) => path,
                    Err(e) => {
                        error!("Failed to export price history: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };

        let report = self.report(export_path);
        log_summary(&report.summary);
        report
    }

    fn report(&self, export_path: Option<PathBuf>) -> TrackingReport {
        TrackingReport {
            final_state: self.state.clone(),
            summary: TrackingSummary {
                checks: self.checks,
                alerts: self.alerts,
                data_points: self.history.len(),
                price_range: self.history.price_range(),
            },
            export_path,
        }
    }
}

fn log_summary(summary: &TrackingSummary) {
    info!("==================================================");
    info!("TRACKING SUMMARY");
    info!("Total checks: {}", summary.checks);
    info!("Alerts triggered: {}", summary.alerts);
    info!("Data points: {}", summary.data_points);
    if let Some((lowest, highest)) = summary.price_range {
        info!("Price range: ${:.2} - ${:.2}", lowest, highest);
    }
    info!("==================================================");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Resolves once the flag is raised. A dropped sender means nobody can cancel.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
