//! Token classifier
//!
//! Pulls candidate token identifiers out of free-form chat text:
//! EVM contract addresses, `$TICKER` mentions and base58 mint addresses.

use once_cell::sync::Lazy;
use regex::Regex;


static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0x[a-fA-F0-9]{40}").expect("valid address regex"));

static TICKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z0-9]{2,10})").expect("valid ticker regex"));

// base58 alphabet, no 0 O I l
static BASE58_MINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[1-9A-HJ-NP-Za-km-z]{32,50}\b").expect("valid mint regex")
});

/// Shape of a matched identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TokenKind {
    Address,
    Ticker,
    Mint,
}

/// A classified token with its position in the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch {
    pub kind: TokenKind,
    pub value: String,
    pub start: usize,
}

/// Every pattern match in `text`, ordered by position.
///
/// Matches from different patterns are not deduplicated.
pub fn classify(text: &str) -> Vec<TokenMatch> {
    let mut matches: Vec<TokenMatch> = Vec::new();

    matches.extend(ADDRESS_RE.find_iter(text).map(|m| TokenMatch {
        kind: TokenKind::Address,
        value: m.as_str().to_string(),
        start: m.start(),
    }));

    matches.extend(TICKER_RE.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let ticker = caps.get(1)?;
        Some(TokenMatch {
            kind: TokenKind::Ticker,
            value: ticker.as_str().to_string(),
            start: whole.start(),
        })
    }));

    matches.extend(BASE58_MINT_RE.find_iter(text).map(|m| TokenMatch {
        kind: TokenKind::Mint,
        value: m.as_str().to_string(),
        start: m.start(),
    }));

    matches.sort_by_key(|m| (m.start, m.kind));
    matches
}

/// Candidate token keys in the order they appear in `text`
pub fn extract_tokens(text: &str) -> Vec<String> {
    classify(text).into_iter().map(|m| m.value).collect()
}
