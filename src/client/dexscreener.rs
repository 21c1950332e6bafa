//! DexScreener API client
//!
//! Looks a token up by contract address or by free-text search and reports
//! the market cap of its most liquid trading pair.

use super::{MarketCapFetcher, MarketCapQuote};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; TokenBot/1.0)";

/// DexScreener client
#[derive(Clone)]
pub struct DexScreenerClient {
    http: Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Pairs listed for an exact contract address
    pub async fn pairs_by_address(&self, address: &str) -> Result<Vec<Value>> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, address);
        self.get_pairs(self.http.get(&url)).await
    }

    /// Pairs matching a ticker or any other search term
    pub async fn pairs_by_search(&self, query: &str) -> Result<Vec<Value>> {
        let url = format!("{}/latest/dex/search", self.base_url);
        self.get_pairs(self.http.get(&url).query(&[("q", query)])).await
    }

    async fn get_pairs(&self, req: reqwest::RequestBuilder) -> Result<Vec<Value>> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BotError::Api(format!("DexScreener returned {}", status)));
        }

        let body: Value = resp.json().await?;
        Ok(pairs_from_response(body))
    }
}

#[async_trait]
impl MarketCapFetcher for DexScreenerClient {
    async fn fetch(&self, token: &str) -> Result<MarketCapQuote> {
        let pairs = if token.starts_with("0x") {
            self.pairs_by_address(token).await?
        } else {
            self.pairs_by_search(token).await?
        };

        let quote = quote_from_pairs(&pairs);
        debug!(
            token,
            pairs = pairs.len(),
            market_cap = ?quote.market_cap,
            "DexScreener lookup"
        );
        Ok(quote)
    }
}

/// `pairs` array of a response; `null` or missing means no pairs
pub(crate) fn pairs_from_response(body: Value) -> Vec<Value> {
    match body {
        Value::Object(mut map) => match map.remove("pairs") {
            Some(Value::Array(pairs)) => pairs,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Market cap and URL of the most liquid pair
pub(crate) fn quote_from_pairs(pairs: &[Value]) -> MarketCapQuote {
    match select_best_pair(pairs) {
        Some(pair) => MarketCapQuote {
            market_cap: pair_market_cap(pair),
            pair_url: pair.get("url").and_then(Value::as_str).map(str::to_string),
        },
        None => MarketCapQuote::empty(),
    }
}

/// Pair with the highest USD liquidity; first seen wins ties
pub fn select_best_pair(pairs: &[Value]) -> Option<&Value> {
    let mut best: Option<(&Value, f64)> = None;
    for pair in pairs {
        let liquidity = pair
            .get("liquidity")
            .and_then(|l| l.get("usd"))
            .and_then(as_number)
            .unwrap_or(0.0);
        match best {
            Some((_, best_liquidity)) if liquidity <= best_liquidity => {}
            _ => best = Some((pair, liquidity)),
        }
    }
    best.map(|(pair, _)| pair)
}

/// `marketCap`, falling back to `fdv`
pub fn pair_market_cap(pair: &Value) -> Option<f64> {
    pair.get("marketCap")
        .and_then(as_number)
        .or_else(|| pair.get("fdv").and_then(as_number))
}

/// JSON number, or a string holding one
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
