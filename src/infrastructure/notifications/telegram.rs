use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::alert::MessageChannel;
use crate::shared::errors::NotificationError;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Bot API envelope: `ok` plus either `result` or `description`
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Sends alert text through the Telegram Bot API
pub struct TelegramChannel {
    http_client: Client,
    api_url: String,
    bot_token: String,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>) -> Result<Self, NotificationError> {
        Self::with_api_url(bot_token, TELEGRAM_API_URL)
    }

    pub fn with_api_url(
        bot_token: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Result<Self, NotificationError> {
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            api_url: api_url.into(),
            bot_token: bot_token.into(),
        })
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_url.trim_end_matches('/'),
            self.bot_token
        )
    }
}

fn check_response(body: &str) -> Result<(), NotificationError> {
    let response: ApiResponse = serde_json::from_str(body).map_err(|e| NotificationError::Delivery {
        channel: "telegram".to_string(),
        reason: format!("unexpected response: {}", e),
    })?;

    if response.ok {
        Ok(())
    } else {
        Err(NotificationError::Rejected(
            response
                .description
                .unwrap_or_else(|| "no description".to_string()),
        ))
    }
}

#[async_trait]
impl MessageChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, target: &str, text: &str) -> Result<(), NotificationError> {
        let body = self
            .http_client
            .post(self.send_message_url())
            .json(&SendMessageRequest {
                chat_id: target,
                text,
            })
            .send()
            .await?
            .text()
            .await?;

        check_response(&body)
    }
}
