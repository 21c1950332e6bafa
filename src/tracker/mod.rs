//! Active token tracking
//!
//! `TokenTracker` owns the single active entry and its files. Callers reach
//! the entry only through the tracker, which serializes every mutation on one
//! state lock:
//!
//! ```text
//! ingest: track (archive + create) → fetch (unlocked) → refresh_initial (relock, recheck)
//! monitor: active_token → fetch (unlocked) → apply_observation (relock, recheck)
//! ```
//!
//! Network fetches never run under the state lock. Anything applied after a
//! fetch is compare-and-apply on the token id, so a slow answer for a token
//! that has since been replaced is dropped.

pub mod entry;
pub mod store;

#[cfg(test)]
mod tests;

pub use entry::{format_percent, percent_change, TokenEntry, REACHED_THRESHOLD_PCT};
pub use store::{migrate_current, migrate_entry, EntryStore};

use crate::client::{MarketCapFetcher, MarketCapQuote};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

struct TrackerState {
    active: Option<TokenEntry>,
    store: EntryStore,
}

impl TrackerState {
    /// Write the active entry; failures leave memory authoritative
    fn persist(&self) {
        let Some(entry) = &self.active else {
            return;
        };
        if let Err(e) = self.store.save_current(entry) {
            error!(
                token = %entry.token,
                path = %self.store.current_path().display(),
                "Failed to persist current entry: {}",
                e
            );
        }
    }
}

/// Owner of the active entry
pub struct TokenTracker {
    state: Mutex<TrackerState>,
    /// Held for a whole inbound message so multi-token messages apply in order
    ingest_lock: Mutex<()>,
    fetcher: Arc<dyn MarketCapFetcher>,
}

impl TokenTracker {
    pub fn new(
        store: EntryStore,
        fetcher: Arc<dyn MarketCapFetcher>,
        active: Option<TokenEntry>,
    ) -> Self {
        Self {
            state: Mutex::new(TrackerState { active, store }),
            ingest_lock: Mutex::new(()),
            fetcher,
        }
    }

    /// Build from whatever the store has on disk.
    ///
    /// The restored entry is migrated, gets its initial market cap if it never
    /// had one, and is written back once in the current layout.
    pub async fn restore(store: EntryStore, fetcher: Arc<dyn MarketCapFetcher>) -> Self {
        let active = store.load_current();
        let tracker = Self::new(store, fetcher, active);

        let Some(token) = tracker.active_token().await else {
            return tracker;
        };
        info!(token = %token, "Restored active token");

        let needs_initial = tracker
            .snapshot()
            .await
            .is_some_and(|entry| !entry.has_initial());
        if !(needs_initial && tracker.refresh_initial(&token).await) {
            tracker.state.lock().await.persist();
        }
        tracker
    }

    /// Track the last configured static token when nothing is active
    pub async fn seed_static(&self, tokens: &[String]) -> bool {
        let Some(token) = tokens.last() else {
            return false;
        };
        if self.active_token().await.is_some() {
            return false;
        }

        info!(token = %token, "Seeding static token");
        self.ingest(std::slice::from_ref(token), Utc::now()).await;
        true
    }

    pub fn fetcher(&self) -> Arc<dyn MarketCapFetcher> {
        self.fetcher.clone()
    }

    pub async fn active_token(&self) -> Option<String> {
        self.state.lock().await.active.as_ref().map(|e| e.token.clone())
    }

    pub async fn snapshot(&self) -> Option<TokenEntry> {
        self.state.lock().await.active.clone()
    }

    pub async fn history(&self) -> Result<Vec<TokenEntry>> {
        self.state.lock().await.store.load_history()
    }

    /// Archived entries still waiting for a successful history write
    pub async fn pending_history(&self) -> usize {
        self.state.lock().await.store.pending_history()
    }

    /// Make `token` the active entry.
    ///
    /// Returns `false` if it already is. Otherwise the previous entry is
    /// archived as-is and replaced by a fresh one.
    pub async fn track(&self, token: &str, posted_at: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().await;

        if state.active.as_ref().is_some_and(|e| e.token == token) {
            return false;
        }

        if let Some(previous) = state.active.take() {
            match state.store.append_history(&previous) {
                Ok(()) => info!(
                    token = %previous.token,
                    highest_pct = previous.highest_percent_increase,
                    reached_50 = previous.reached_50,
                    "Archived token"
                ),
                Err(e) => error!(
                    token = %previous.token,
                    pending = state.store.pending_history(),
                    "Failed to append history: {}",
                    e
                ),
            }
        }

        state.active = Some(TokenEntry::new(token, posted_at));
        state.persist();
        info!(token, "Tracking new token");
        true
    }

    /// First market-cap fetch for a just-created entry.
    ///
    /// Applies only if `token` is still active and still has no initial
    /// market cap. A failed fetch is left for the monitor to fill in.
    pub async fn refresh_initial(&self, token: &str) -> bool {
        let quote = match self.fetcher.fetch(token).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(token, "Initial market cap fetch failed: {}", e);
                return false;
            }
        };
        let Some(market_cap) = quote.market_cap else {
            debug!(token, "No market cap yet");
            return false;
        };

        let mut state = self.state.lock().await;
        let applied = match state.active.as_mut() {
            Some(entry) if entry.token == token && !entry.has_initial() => {
                entry.set_initial(market_cap, quote.pair_url, Utc::now());
                true
            }
            _ => false,
        };

        if applied {
            state.persist();
            info!(token, market_cap, "Initial market cap");
        } else {
            debug!(token, "Initial market cap no longer needed");
        }
        applied
    }

    /// Fold a monitor observation into the active entry.
    ///
    /// No-op if `token` is no longer active or the quote has no market cap.
    pub async fn apply_observation(&self, token: &str, quote: MarketCapQuote) -> bool {
        let Some(market_cap) = quote.market_cap else {
            return false;
        };

        let mut state = self.state.lock().await;
        match state.active.as_mut() {
            Some(entry) if entry.token == token => {
                entry.observe(market_cap, quote.pair_url, Utc::now());
                debug!(
                    token,
                    market_cap,
                    change = %entry.current_percentage,
                    highest_pct = entry.highest_percent_increase,
                    "Market cap updated"
                );
            }
            _ => {
                debug!(token, "Dropping observation for replaced token");
                return false;
            }
        }

        state.persist();
        true
    }

    /// Run every candidate from one message through the lifecycle, in order.
    ///
    /// Returns the tokens that became active.
    pub async fn ingest(&self, tokens: &[String], posted_at: DateTime<Utc>) -> Vec<String> {
        let _guard = self.ingest_lock.lock().await;

        let mut tracked = Vec::new();
        for token in tokens {
            if !self.track(token, posted_at).await {
                continue;
            }
            self.refresh_initial(token).await;
            tracked.push(token.clone());
        }
        tracked
    }
}
