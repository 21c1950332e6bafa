//! Telegram Bot API transport
//!
//! Long-polls `getUpdates` for group messages and channel posts. The bot
//! needs privacy mode disabled to see ordinary group messages.

use super::{Forwarder, InboundMessage, MessageSource};
use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<TelegramUpdate>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
    channel_post: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    from: Option<TelegramUser>,
    chat: TelegramChat,
    /// Unix seconds
    date: i64,
    text: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramUpdate {
    /// Text-bearing message or channel post, if any
    pub(crate) fn into_inbound(self) -> Option<InboundMessage> {
        let msg = self.message.or(self.channel_post)?;
        let text = msg.text.or(msg.caption)?;
        Some(InboundMessage {
            chat_id: msg.chat.id,
            sender_id: msg.from.map(|u| u.id),
            text,
            date: DateTime::from_timestamp(msg.date, 0).unwrap_or_else(Utc::now),
        })
    }
}

/// Group/channel listener over the Bot API
pub struct TelegramBotSource {
    http: Client,
    bot_token: String,
    poll_timeout_secs: u64,
}

impl TelegramBotSource {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        // Long polling holds the request open for poll_timeout_secs
        let http = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()?;

        Ok(Self {
            http,
            bot_token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    async fn poll_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let url = format!("{}/bot{}/getUpdates", API_BASE, self.bot_token);
        let response: GetUpdatesResponse = self
            .http
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout_secs.to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(BotError::Api(format!(
                "getUpdates failed: {}",
                response.description.unwrap_or_default()
            )));
        }
        Ok(response.result)
    }
}

#[async_trait]
impl MessageSource for TelegramBotSource {
    fn name(&self) -> &str {
        "telegram_bot"
    }

    async fn run(&self, tx: mpsc::Sender<InboundMessage>) -> Result<()> {
        tracing::info!("Telegram Bot source starting");

        let mut offset: i64 = 0;
        loop {
            let updates = match self.poll_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!("Telegram API error: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(msg) = update.into_inbound() else {
                    continue;
                };
                if tx.send(msg).await.is_err() {
                    tracing::warn!("Message channel closed, stopping Telegram source");
                    return Ok(());
                }
            }
        }
    }
}

/// Sends forwarded copies to one chat via `sendMessage`
pub struct TelegramForwarder {
    http: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramForwarder {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: Client::new(),
            bot_token,
            chat_id,
        }
    }
}

#[async_trait]
impl Forwarder for TelegramForwarder {
    async fn forward(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", API_BASE, self.bot_token);
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
        };

        let resp = self.http.post(&url).json(&request).send().await?;
        if !resp.status().is_success() {
            return Err(BotError::Api(format!("sendMessage returned {}", resp.status())));
        }
        Ok(())
    }
}
