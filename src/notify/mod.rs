//! Outbound message delivery
//!
//! `DeliveryChannel` is the seam between the core and Telegram. `broadcast`
//! fans a payload out to every registered destination and tolerates
//! per-destination failures: one unreachable chat never blocks the rest.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Delivers one rendered payload to one destination.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, destination: &str, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Telegram Bot API channel (sendMessage, HTML parse mode).
pub struct TelegramChannel {
    http: reqwest::Client,
    bot_token: String,
}

impl TelegramChannel {
    pub fn new(bot_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
        }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn deliver(&self, destination: &str, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let request = SendMessageRequest {
            chat_id: destination,
            text,
            parse_mode: "HTML",
        };

        self.http
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

/// Deliver `text` to every destination, logging and skipping failures.
/// Returns `(delivered, failed)` counts.
pub async fn broadcast(
    channel: &dyn DeliveryChannel,
    destinations: &[String],
    text: &str,
) -> (usize, usize) {
    let mut delivered = 0;
    let mut failed = 0;

    for destination in destinations {
        match channel.deliver(destination, text).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!(destination = %destination, "delivery failed: {e}");
            }
        }
    }

    (delivered, failed)
}
