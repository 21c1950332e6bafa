//! Test doubles shared by the module tests

use crate::client::{MarketCapFetcher, MarketCapQuote};
use crate::error::{BotError, Result};
use crate::tracker::{EntryStore, TokenTracker};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Fetcher answering from a fixed table and recording every call
#[derive(Default)]
pub struct StubFetcher {
    quotes: Mutex<HashMap<String, MarketCapQuote>>,
    calls: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl StubFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, token: &str, market_cap: f64) {
        let url = format!("https://dexscreener.com/pair/{}", token);
        self.quotes
            .lock()
            .unwrap()
            .insert(token.to_string(), MarketCapQuote::new(market_cap, Some(url)));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketCapFetcher for StubFetcher {
    async fn fetch(&self, token: &str) -> Result<MarketCapQuote> {
        self.calls.lock().unwrap().push(token.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::Api("stub failure".to_string()));
        }
        Ok(self
            .quotes
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .unwrap_or_default())
    }
}

/// Fetcher that parks until released, to line up races deterministically
pub struct GatedFetcher {
    quote: MarketCapQuote,
    pub started: Notify,
    pub release: Notify,
}

impl GatedFetcher {
    pub fn new(market_cap: f64) -> Arc<Self> {
        Arc::new(Self {
            quote: MarketCapQuote::new(market_cap, None),
            started: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl MarketCapFetcher for GatedFetcher {
    async fn fetch(&self, _token: &str) -> Result<MarketCapQuote> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.quote.clone())
    }
}

pub fn store_in(dir: &Path) -> EntryStore {
    EntryStore::new(dir.join("current.json"), dir.join("history.json"))
}

pub fn tracker_in(dir: &Path, fetcher: Arc<dyn MarketCapFetcher>) -> Arc<TokenTracker> {
    Arc::new(TokenTracker::new(store_in(dir), fetcher, None))
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
