//! CLI commands and handlers

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::application::services::TrackerService;
use crate::application::tracker::LoopState;
use crate::shared::config::ConfigLayer;
use crate::shared::types::TrackerConfig;
use crate::shared::utils::format_optional_price;

#[derive(Parser, Debug)]
#[command(name = "price-tracker")]
#[command(version, about = "Track a ticker, keep a moving average and alert on sharp drops")]
pub struct Cli {
    /// Config file (TOML, or JSON with a .json extension)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Append logs to this file
    #[arg(long, global = true, default_value = "price_tracker.log")]
    pub log_file: PathBuf,

    /// Log to stderr only
    #[arg(long, global = true)]
    pub no_log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Track the price until interrupted
    Track(TrackArgs),

    /// Export the saved session to CSV
    Export(SessionArgs),

    /// Summarize the saved session
    Status(SessionArgs),
}

#[derive(Args, Debug, Default)]
pub struct TrackArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Seconds between checks
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Moving average period in samples
    #[arg(long)]
    pub sma_period: Option<usize>,

    /// Drop percentage that triggers an alert
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Drawdown window in minutes
    #[arg(short, long)]
    pub window: Option<u64>,

    /// Fetch attempts per check
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Stop after this many seconds
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Disable the audio alert
    #[arg(long)]
    pub no_beep: bool,
}

#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Ticker symbol, e.g. BTC-USD or AAPL
    #[arg(short, long)]
    pub ticker: Option<String>,

    /// Session file, defaults to <TICKER>_session.json
    #[arg(long)]
    pub session_file: Option<PathBuf>,

    /// Directory for CSV exports
    #[arg(long)]
    pub export_dir: Option<PathBuf>,
}

impl SessionArgs {
    fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            ticker: self.ticker.clone(),
            session_file: self.session_file.clone(),
            export_dir: self.export_dir.clone(),
            ..ConfigLayer::default()
        }
    }
}

impl Commands {
    /// Command-line values that take precedence over file and environment
    pub fn overrides(&self) -> ConfigLayer {
        match self {
            Commands::Track(args) => {
                let mut layer = args.session.overrides();
                layer.merge(ConfigLayer {
                    check_interval: args.interval,
                    sma_period: args.sma_period,
                    price_drop_threshold: args.threshold,
                    alert_window_minutes: args.window,
                    max_retries: args.max_retries,
                    use_system_beep: args.no_beep.then_some(false),
                    ..ConfigLayer::default()
                });
                layer
            }
            Commands::Export(args) | Commands::Status(args) => args.overrides(),
        }
    }
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(
        command: Commands,
        config: TrackerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        match command {
            Commands::Track(args) => {
                Self::execute_track_command(args.duration, config, shutdown).await
            }
            Commands::Export(_) => Self::execute_export_command(config),
            Commands::Status(_) => Self::execute_status_command(config),
        }
    }

    async fn execute_track_command(
        duration: Option<u64>,
        config: TrackerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let service = TrackerService::new(&config).context("Invalid tracker configuration")?;

        info!("🚀 Price tracker for {}", config.ticker);
        info!("   Check interval: {}s", config.check_interval_secs);
        info!("   SMA period: {}", config.sma_period);
        info!("   Drop threshold: {}%", config.drop_threshold_percent);
        info!("   Alert window: {} minutes", config.alert_window_minutes);
        info!("   Max retries: {}", config.max_retries);
        info!("   Session file: {}", config.session_path().display());
        if let Some(secs) = duration {
            info!("⏱️  Tracking will stop after {} seconds", secs);
        }

        let report = service
            .start_tracking(duration.map(Duration::from_secs), shutdown)
            .await
            .context("Failed to start tracking")?;

        match report.final_state {
            LoopState::Failed(reason) => {
                bail!("Tracking stopped after an unexpected failure: {}", reason)
            }
            _ => Ok(()),
        }
    }

    fn execute_export_command(config: TrackerConfig) -> Result<()> {
        let service = TrackerService::new(&config).context("Invalid tracker configuration")?;
        match service
            .export_session()
            .with_context(|| format!("Failed to export {}", config.session_path().display()))?
        {
            Some(path) => info!("✅ Exported {} history to {}", config.ticker, path.display()),
            None => warn!("Nothing exported for {}", config.ticker),
        }
        Ok(())
    }

    fn execute_status_command(config: TrackerConfig) -> Result<()> {
        let service = TrackerService::new(&config).context("Invalid tracker configuration")?;
        let status = match service
            .session_status()
            .with_context(|| format!("Failed to read {}", config.session_path().display()))?
        {
            Some(status) => status,
            None => {
                info!("No saved session for {}", config.ticker);
                return Ok(());
            }
        };

        info!("📊 Session {}:", status.path.display());
        info!("   Ticker: {}", status.ticker);
        info!("   Records: {}", status.samples);
        if let (Some(first), Some(last)) = (status.first_timestamp, status.last_timestamp) {
            info!("   From {} to {}", first.to_rfc3339(), last.to_rfc3339());
        }
        info!("   Last price: {}", format_optional_price(status.last_price));
        info!("   Last SMA: {}", format_optional_price(status.last_sma));
        if let Some((lowest, highest)) = status.price_range {
            info!("   Price range: ${:.2} - ${:.2}", lowest, highest);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "price-tracker",
            "track",
            "--ticker",
            "AAPL",
            "--interval",
            "30",
            "--threshold",
            "1.5",
            "--no-beep",
            "--session-file",
            "aapl.json",
        ])
        .unwrap();

        let layer = cli.command.overrides();
        assert_eq!(layer.ticker.as_deref(), Some("AAPL"));
        assert_eq!(layer.check_interval, Some(30));
        assert_eq!(layer.price_drop_threshold, Some(1.5));
        assert_eq!(layer.use_system_beep, Some(false));
        assert_eq!(layer.session_file, Some(PathBuf::from("aapl.json")));
        assert_eq!(layer.sma_period, None);
    }

    #[test]
    fn test_beep_is_left_to_config_without_flag() {
        let cli = Cli::try_parse_from(["price-tracker", "track"]).unwrap();
        assert_eq!(cli.command.overrides(), ConfigLayer::default());
        assert_eq!(cli.log_file, PathBuf::from("price_tracker.log"));
        assert!(!cli.no_log_file);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "price-tracker",
            "status",
            "--config",
            "tracker.json",
            "--no-log-file",
            "--export-dir",
            "out",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("tracker.json")));
        assert!(cli.no_log_file);
        assert!(matches!(cli.command, Commands::Status(_)));
        assert_eq!(cli.command.overrides().export_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_duration_is_not_a_config_value() {
        let cli = Cli::try_parse_from(["price-tracker", "track", "--duration", "600"]).unwrap();
        match &cli.command {
            Commands::Track(args) => assert_eq!(args.duration, Some(600)),
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.command.overrides(), ConfigLayer::default());
    }
}
