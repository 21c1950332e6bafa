//! Market-cap monitor
//!
//! Background loop that re-prices the active token on a fixed interval.


use crate::client::MarketCapFetcher;
use crate::tracker::TokenTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one monitor cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is being tracked
    Idle,
    FetchFailed,
    /// The API had no pair or no market cap for the token
    NoMarketCap,
    /// The active token changed while the fetch was in flight
    Superseded,
    Applied,
}

/// Periodic market-cap refresher for the active entry
pub struct MarketCapMonitor {
    tracker: Arc<TokenTracker>,
    fetcher: Arc<dyn MarketCapFetcher>,
    interval: Duration,
}

impl MarketCapMonitor {
    pub fn new(tracker: Arc<TokenTracker>, interval: Duration) -> Self {
        let fetcher = tracker.fetcher();
        Self {
            tracker,
            fetcher,
            interval,
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Cancellation is only observed while sleeping, so an in-flight cycle
    /// always finishes its update.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Market cap monitor started");

        let mut cycles = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(cycles, "Market cap monitor stopped");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            cycles += 1;
            let outcome = self.tick().await;
            debug!(cycle = cycles, ?outcome, "Monitor cycle finished");
        }
    }

    /// One cycle: snapshot the token, fetch unlocked, compare-and-apply
    pub async fn tick(&self) -> TickOutcome {
        let Some(token) = self.tracker.active_token().await else {
            return TickOutcome::Idle;
        };

        let quote = match self.fetcher.fetch(&token).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(token = %token, "Market cap fetch failed: {}", e);
                return TickOutcome::FetchFailed;
            }
        };

        if quote.market_cap.is_none() {
            debug!(token = %token, "No market cap available");
            return TickOutcome::NoMarketCap;
        }

        if self.tracker.apply_observation(&token, quote).await {
            TickOutcome::Applied
        } else {
            TickOutcome::Superseded
        }
    }
}
