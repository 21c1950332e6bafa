//! Token Watch
//!
//! Watches chat messages for token calls, tracks the most recent one and
//! follows its market cap until the next call replaces it.
//!
//! ## Architecture
//!
//! ```text
//! Source (TG/stdin) → IngestHandler → Classifier → TokenTracker ←→ EntryStore (JSON)
//!                                                      ↑
//!                       MarketCapMonitor → DexScreener ┘
//! ```

pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod ingester;
pub mod monitor;
pub mod tracker;

#[cfg(test)]
mod testing;
