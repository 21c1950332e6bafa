//! Message ingestion
//!
//! Sources push `InboundMessage`s into a channel; `IngestHandler` filters
//! them, classifies tokens and drives the tracker.

pub mod stdin;
pub mod telegram;


use crate::classifier::extract_tokens;
use crate::config::FilterConfig;
use crate::error::Result;
use crate::tracker::TokenTracker;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// One chat message as delivered by a transport
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub sender_id: Option<i64>,
    pub text: String,
    pub date: DateTime<Utc>,
}

/// Transport feeding messages into the handler
#[async_trait]
pub trait MessageSource: Send + Sync {
    fn name(&self) -> &str;

    /// Push messages into `tx` until the transport ends or `tx` closes
    async fn run(&self, tx: mpsc::Sender<InboundMessage>) -> Result<()>;
}

/// Destination for forwarded copies and discovery dumps
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, text: &str) -> Result<()>;
}

/// What the handler did with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Logged for discovery, not classified
    Discovery,
    /// Chat or sender not allowed
    Filtered,
    NoTokens,
    Processed {
        candidates: Vec<String>,
        /// Candidates that became the active token
        tracked: Vec<String>,
    },
}

pub struct IngestHandler {
    tracker: Arc<TokenTracker>,
    filter: FilterConfig,
    forwarder: Option<Arc<dyn Forwarder>>,
}

impl IngestHandler {
    pub fn new(tracker: Arc<TokenTracker>, filter: FilterConfig) -> Self {
        Self {
            tracker,
            filter,
            forwarder: None,
        }
    }

    pub fn with_forwarder(mut self, forwarder: Arc<dyn Forwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Process one message
    pub async fn handle(&self, msg: &InboundMessage) -> Result<HandleOutcome> {
        if self.filter.discovery_mode {
            info!(
                chat_id = msg.chat_id,
                sender_id = ?msg.sender_id,
                text = %msg.text,
                "Discovery message"
            );
            if let Some(forwarder) = &self.forwarder {
                forwarder.forward(&describe("Discovery message", msg)).await?;
            }
            return Ok(HandleOutcome::Discovery);
        }

        if !self.filter.allows(msg.chat_id, msg.sender_id) {
            debug!(chat_id = msg.chat_id, sender_id = ?msg.sender_id, "Message filtered");
            return Ok(HandleOutcome::Filtered);
        }

        let candidates = extract_tokens(&msg.text);
        if candidates.is_empty() {
            return Ok(HandleOutcome::NoTokens);
        }

        info!(
            chat_id = msg.chat_id,
            sender_id = ?msg.sender_id,
            tokens = %candidates.join(", "),
            "Token message"
        );

        let tracked = self.tracker.ingest(&candidates, msg.date).await;

        if self.filter.forward_to_saved {
            match &self.forwarder {
                Some(forwarder) => {
                    if let Err(e) = forwarder.forward(&describe("Group message", msg)).await {
                        warn!(chat_id = msg.chat_id, "Failed to forward message: {}", e);
                    }
                }
                None => debug!("Forwarding enabled but no forwarder configured"),
            }
        }

        Ok(HandleOutcome::Processed { candidates, tracked })
    }

    /// Drain `rx`. A failing message is logged and skipped.
    pub async fn run(&self, mut rx: mpsc::Receiver<InboundMessage>) {
        let mut handled = 0u64;
        while let Some(msg) = rx.recv().await {
            handled += 1;
            match self.handle(&msg).await {
                Ok(outcome) => debug!(?outcome, "Message handled"),
                Err(e) if e.is_transient() => {
                    warn!(chat_id = msg.chat_id, "Handler error: {}", e)
                }
                Err(e) => error!(chat_id = msg.chat_id, "Handler error: {}", e),
            }
        }
        info!(handled, "Message channel closed");
    }
}

fn describe(title: &str, msg: &InboundMessage) -> String {
    let sender = msg
        .sender_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "{}\nchat_id: {}\nsender_id: {}\ntext: {}",
        title, msg.chat_id, sender, msg.text
    )
}
