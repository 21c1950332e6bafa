//! Active entry record and its market-cap arithmetic

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `highest_percent_increase` at or above this sets `reached_50`
pub const REACHED_THRESHOLD_PCT: f64 = 50.0;

/// The token currently being tracked.
///
/// Also the shape of every history record: a superseded entry is archived
/// exactly as it looked when it was replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub time_posted: DateTime<Utc>,
    pub initial_market_cap: Option<f64>,
    pub highest_market_cap: Option<f64>,
    pub current_market_cap: Option<f64>,
    /// Signed, two decimals: `"+12.50%"`
    pub current_percentage: String,
    pub highest_percent_increase: f64,
    pub reached_50: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub pair_url: Option<String>,
}

impl TokenEntry {
    /// Fresh entry with no market data yet
    pub fn new(token: impl Into<String>, time_posted: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            time_posted,
            initial_market_cap: None,
            highest_market_cap: None,
            current_market_cap: None,
            current_percentage: format_percent(0.0),
            highest_percent_increase: 0.0,
            reached_50: false,
            last_checked: None,
            pair_url: None,
        }
    }

    pub fn has_initial(&self) -> bool {
        self.initial_market_cap.is_some()
    }

    /// First successful fetch after creation. Resets every derived field.
    pub fn set_initial(&mut self, market_cap: f64, pair_url: Option<String>, now: DateTime<Utc>) {
        self.initial_market_cap = Some(market_cap);
        self.highest_market_cap = Some(market_cap);
        self.current_market_cap = Some(market_cap);
        self.current_percentage = format_percent(0.0);
        self.highest_percent_increase = 0.0;
        self.reached_50 = false;
        self.last_checked = Some(now);
        if pair_url.is_some() {
            self.pair_url = pair_url;
        }
    }

    /// Fold one market-cap observation into the entry
    pub fn observe(&mut self, market_cap: f64, pair_url: Option<String>, now: DateTime<Utc>) {
        let initial = *self.initial_market_cap.get_or_insert(market_cap);

        let highest = match self.highest_market_cap {
            Some(h) if h >= market_cap => h,
            Some(_) => market_cap,
            None => initial.max(market_cap),
        };
        self.highest_market_cap = Some(highest);
        self.current_market_cap = Some(market_cap);

        self.current_percentage = format_percent(percent_change(market_cap, initial));

        let highest_pct = percent_change(highest, initial);
        self.highest_percent_increase = self.highest_percent_increase.max(highest_pct);
        self.reached_50 = self.highest_percent_increase >= REACHED_THRESHOLD_PCT;

        self.last_checked = Some(now);
        if pair_url.is_some() {
            self.pair_url = pair_url;
        }
    }
}

/// Percentage change from `initial` to `value`, rounded to 4 places.
///
/// A zero baseline yields 0 rather than dividing by zero.
pub fn percent_change(value: f64, initial: f64) -> f64 {
    if initial == 0.0 {
        return 0.0;
    }
    round4((value - initial) / initial * 100.0)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// `+1.23%` / `-4.50%`
pub fn format_percent(value: f64) -> String {
    // avoid "-0.00%"
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{:+.2}%", value)
}
