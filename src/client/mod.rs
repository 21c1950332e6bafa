//! Market data clients

pub mod dexscreener;


pub use dexscreener::{pair_market_cap, select_best_pair, DexScreenerClient};

use crate::error::Result;
use async_trait::async_trait;

/// Market cap observed for a token, with the venue it came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketCapQuote {
    pub market_cap: Option<f64>,
    pub pair_url: Option<String>,
}

impl MarketCapQuote {
    pub fn new(market_cap: f64, pair_url: Option<String>) -> Self {
        Self {
            market_cap: Some(market_cap),
            pair_url,
        }
    }

    /// No pair or no usable market cap
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Source of market-cap observations.
///
/// Implementations do network I/O and must never be called while the
/// tracker's state lock is held.
#[async_trait]
pub trait MarketCapFetcher: Send + Sync {
    async fn fetch(&self, token: &str) -> Result<MarketCapQuote>;
}
