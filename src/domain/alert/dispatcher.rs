//! Fan-out of drawdown alerts to notification channels

use chrono::Local;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::{error, info, warn};

use super::channel::{AudioAlertChannel, MessageChannel};
use super::message::format_alert_message;
use crate::domain::price::DrawdownEvent;
use crate::shared::errors::NotificationError;

struct MessageRoute {
    target: String,
    channel: Box<dyn MessageChannel>,
}

/// Result of delivering one alert on one channel
#[derive(Debug)]
pub struct ChannelOutcome {
    pub channel: String,
    pub result: Result<(), NotificationError>,
}

#[derive(Debug)]
pub struct DispatchReport {
    pub message: String,
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

/// Formats drawdown events and hands them to every registered channel.
///
/// Channels are independent: one failing never stops the others. With no
/// channels registered the alert only reaches the log.
pub struct AlertDispatcher {
    ticker: String,
    threshold_percent: f64,
    audio: Vec<Box<dyn AudioAlertChannel>>,
    messages: Vec<MessageRoute>,
}

impl AlertDispatcher {
    pub fn new(ticker: impl Into<String>, threshold_percent: f64) -> Self {
        Self {
            ticker: ticker.into(),
            threshold_percent,
            audio: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn with_audio(mut self, channel: Box<dyn AudioAlertChannel>) -> Self {
        self.audio.push(channel);
        self
    }

    pub fn with_message_channel(
        mut self,
        target: impl Into<String>,
        channel: Box<dyn MessageChannel>,
    ) -> Self {
        self.messages.push(MessageRoute {
            target: target.into(),
            channel,
        });
        self
    }

    pub fn channel_count(&self) -> usize {
        self.audio.len() + self.messages.len()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.audio
            .iter()
            .map(|c| c.name().to_string())
            .chain(self.messages.iter().map(|r| r.channel.name().to_string()))
            .collect()
    }

    pub fn format(&self, event: &DrawdownEvent) -> String {
        format_alert_message(
            &self.ticker,
            self.threshold_percent,
            event,
            event.detected_at.with_timezone(&Local),
        )
    }

    /// Deliver `event` on all channels concurrently
    pub async fn dispatch(&self, event: &DrawdownEvent) -> DispatchReport {
        let message = self.format(event);
        warn!("\n{}\n", message);

        let mut deliveries: Vec<BoxFuture<'_, ChannelOutcome>> = Vec::new();

        for channel in &self.audio {
            deliveries.push(
                async move {
                    ChannelOutcome {
                        channel: channel.name().to_string(),
                        result: channel.fire().await,
                    }
                }
                .boxed(),
            );
        }

        for route in &self.messages {
            let text = message.as_str();
            deliveries.push(
                async move {
                    ChannelOutcome {
                        channel: route.channel.name().to_string(),
                        result: route.channel.send(&route.target, text).await,
                    }
                }
                .boxed(),
            );
        }

        let outcomes = join_all(deliveries).await;

        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => info!("✓ {} alert sent", outcome.channel),
                Err(e) => error!("Failed to send {} alert: {}", outcome.channel, e),
            }
        }

        DispatchReport { message, outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingChannel {
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl MessageChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, target: &str, text: &str) -> Result<(), NotificationError> {
            self.sent
                .lock()
                .unwrap()
                .push((target.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct BrokenChannel;

    #[async_trait]
    impl MessageChannel for BrokenChannel {
        fn name(&self) -> &str {
            "broken"
        }

        async fn send(&self, _target: &str, _text: &str) -> Result<(), NotificationError> {
            Err(NotificationError::Rejected("chat not found".to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct CountingBell {
        fired: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl AudioAlertChannel for CountingBell {
        async fn fire(&self) -> Result<(), NotificationError> {
            *self.fired.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn event() -> DrawdownEvent {
        DrawdownEvent {
            highest: 100.0,
            lowest: 96.0,
            current: 96.0,
            drop_percent: 4.0,
            window_minutes: 60,
            detected_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_no_channels_is_silent() {
        let dispatcher = AlertDispatcher::new("BTC-USD", 2.0);
        let report = dispatcher.dispatch(&event()).await;

        assert!(report.outcomes.is_empty());
        assert!(report.message.contains("PRICE DROP ALERT - BTC-USD"));
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_channels() {
        let recorder = RecordingChannel::default();
        let bell = CountingBell::default();
        let dispatcher = AlertDispatcher::new("ETH-USD", 2.0)
            .with_audio(Box::new(bell.clone()))
            .with_message_channel("chat-1", Box::new(BrokenChannel))
            .with_message_channel("chat-2", Box::new(recorder.clone()));

        assert_eq!(dispatcher.channel_count(), 3);
        let report = dispatcher.dispatch(&event()).await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(*bell.fired.lock().unwrap(), 1);

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "chat-2");
        assert_eq!(sent[0].1, report.message);
    }

    #[test]
    fn test_channel_names() {
        let dispatcher = AlertDispatcher::new("BTC-USD", 2.0)
            .with_audio(Box::new(CountingBell::default()))
            .with_message_channel("42", Box::new(RecordingChannel::default()));
        assert_eq!(dispatcher.channel_names(), vec!["audio", "recording"]);
    }
}
