//! Utility functions and helpers

use chrono::{DateTime, Local};
use std::path::PathBuf;

/// Peak-to-trough decline as a percentage of the peak
pub fn calculate_drop_percent(highest: f64, lowest: f64) -> f64 {
    if highest > 0.0 {
        ((highest - lowest) / highest) * 100.0
    } else {
        0.0
    }
}

/// Format an optional price as `$x.xx` or `--`
pub fn format_optional_price(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("${:.2}", v),
        None => "--".to_string(),
    }
}

pub fn default_session_file(ticker: &str) -> PathBuf {
    PathBuf::from(format!("{}_session.json", ticker))
}

pub fn export_file_name(ticker: &str, at: DateTime<Local>) -> String {
    format!("{}_price_history_{}.csv", ticker, at.format("%Y%m%d_%H%M%S"))
}
