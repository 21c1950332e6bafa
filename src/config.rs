//! Configuration
//!
//! Priority (highest to lowest):
//! 1. Environment variables (TOKEN_WATCH_*, `__` separates sections)
//! 2. TOML config file (optional)
//! 3. Defaults

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub trading: TradingConfig,
    /// Tokens to track at startup when nothing was restored (last one wins)
    #[serde(default)]
    pub static_tokens: Vec<String>,
}

/// Which messages reach the classifier
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    /// Allowed conversation ids
    #[serde(default)]
    pub group_ids: Vec<i64>,
    /// Allowed senders; empty allows everyone in an allowed group
    #[serde(default)]
    pub user_ids: Vec<i64>,
    /// Log and forward every message instead of classifying
    #[serde(default)]
    pub discovery_mode: bool,
    /// Forward a copy of every allowed message
    #[serde(default)]
    pub forward_to_saved: bool,
}

impl FilterConfig {
    pub fn allows(&self, chat_id: i64, sender_id: Option<i64>) -> bool {
        if !self.group_ids.contains(&chat_id) {
            return false;
        }
        if self.user_ids.is_empty() {
            return true;
        }
        sender_id.is_some_and(|id| self.user_ids.contains(&id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_current_path")]
    pub current_path: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            current_path: default_current_path(),
            history_path: default_history_path(),
        }
    }
}

impl StorageConfig {
    pub fn current_path(&self) -> PathBuf {
        expand(&self.current_path)
    }

    pub fn history_path(&self) -> PathBuf {
        expand(&self.history_path)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Telegram Bot API message source
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat that receives forwarded copies and discovery dumps
    pub forward_chat_id: Option<String>,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

/// On-chain trading parameters. Validated at startup, not used by the tracker.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub rpc_url: String,
    #[serde(default)]
    pub router_address: String,
    #[serde(default)]
    pub weth_address: String,
    /// 200 = 2.00%
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_max_buy_amount_eth")]
    pub max_buy_amount_eth: f64,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            private_key: String::new(),
            rpc_url: String::new(),
            router_address: String::new(),
            weth_address: String::new(),
            slippage_bps: default_slippage_bps(),
            gas_limit: default_gas_limit(),
            max_buy_amount_eth: default_max_buy_amount_eth(),
            chain_id: default_chain_id(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_api_base_url() -> String {
    "https://api.dexscreener.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_current_path() -> String {
    "token_results.json".to_string()
}

fn default_history_path() -> String {
    "token_history.json".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_slippage_bps() -> u32 {
    200
}

fn default_gas_limit() -> u64 {
    300_000
}

fn default_max_buy_amount_eth() -> f64 {
    0.01
}

fn default_chain_id() -> u64 {
    1
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Load from an optional TOML file plus the environment, then validate
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("TOKEN_WATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("filter.group_ids")
                    .with_list_parse_key("filter.user_ids")
                    .with_list_parse_key("static_tokens"),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.filter.discovery_mode && self.filter.group_ids.is_empty() {
            return Err(ConfigError::Message(
                "filter.group_ids must contain at least one group id".to_string(),
            ));
        }

        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::Message(
                "monitor.interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.trading.enabled {
            let required = [
                ("trading.private_key", &self.trading.private_key),
                ("trading.rpc_url", &self.trading.rpc_url),
                ("trading.router_address", &self.trading.router_address),
                ("trading.weth_address", &self.trading.weth_address),
            ];
            for (name, value) in required {
                if value.is_empty() {
                    return Err(ConfigError::Message(format!(
                        "{} is required when trading is enabled",
                        name
                    )));
                }
            }
        }

        Ok(())
    }
}
