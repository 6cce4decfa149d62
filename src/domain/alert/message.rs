use chrono::{DateTime, TimeZone};
use std::fmt::Display;

use crate::domain::price::DrawdownEvent;

/// Fixed alert template shared by the log and every message channel
pub fn format_alert_message<Tz>(
    ticker: &str,
    threshold_percent: f64,
    event: &DrawdownEvent,
    at: DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "🚨 PRICE DROP ALERT - {}\n\
         Drop detected: {:.2}% (threshold: {}%)\n\
         Highest: ${:.2}\n\
         Lowest: ${:.2}\n\
         Current: ${:.2}\n\
         Window: Last {} minutes\n\
         Time: {}",
        ticker,
        event.drop_percent,
        threshold_percent,
        event.highest,
        event.lowest,
        event.current,
        event.window_minutes,
        at.format("%Y-%m-%d %H:%M:%S"),
    )
}
