//! Line-per-message source for replaying chat logs locally

use super::{InboundMessage, MessageSource};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Reads stdin; every non-empty line is one message from `chat_id`
pub struct StdinSource {
    chat_id: i64,
}

impl StdinSource {
    pub fn new(chat_id: i64) -> Self {
        Self { chat_id }
    }
}

#[async_trait]
impl MessageSource for StdinSource {
    fn name(&self) -> &str {
        "stdin"
    }

    async fn run(&self, tx: mpsc::Sender<InboundMessage>) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let msg = InboundMessage {
                chat_id: self.chat_id,
                sender_id: None,
                text: text.to_string(),
                date: Utc::now(),
            };
            if tx.send(msg).await.is_err() {
                break;
            }
        }
        tracing::info!("stdin closed");
        Ok(())
    }
}
