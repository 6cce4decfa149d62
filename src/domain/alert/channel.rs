//! Notification channel interfaces

use async_trait::async_trait;

use crate::shared::errors::NotificationError;

/// Local audible alert. Platform-specific implementations are chosen when the
/// channel is constructed.
#[async_trait]
pub trait AudioAlertChannel: Send + Sync {
    fn name(&self) -> &str {
        "audio"
    }

    async fn fire(&self) -> Result<(), NotificationError>;
}

/// Text message delivery to a chat target
#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, target: &str, text: &str) -> Result<(), NotificationError>;
}
