//! Application configuration.
//!
//! Everything is read from environment variables (a `.env` file is loaded
//! first by the binary). Command-line flags override individual values.

use rate_monitor_core::{Chain, Thresholds, UnknownChain, UsdValue};
use rate_monitor_feeds::{RetryPolicy, DEFAULT_FLUID_API_URL, DEFAULT_JUPLEND_API_URL};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/state.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing BOT_TOKEN or CHAT_ID")]
    MissingTelegram,
    #[error("Invalid FLUID_CHAINS entry: {0}")]
    UnknownChain(#[from] UnknownChain),
    #[error("{0} is not served by the Fluid API")]
    NotFluidChain(Chain),
}

/// Telegram destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

/// JupLend vault source, enabled by `JUP_API_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupLendSettings {
    pub api_key: String,
    pub url: String,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Telegram delivery; required unless running dry.
    pub telegram: Option<TelegramSettings>,
    /// SQLite URL for snapshot state and alert history.
    pub database_url: String,
    pub fluid_api_url: String,
    /// Fluid chains to poll.
    pub chains: Vec<Chain>,
    pub juplend: Option<JupLendSettings>,
    /// Seconds between monitor cycles.
    pub poll_interval_secs: u64,
    /// Milliseconds between two outgoing messages.
    pub message_gap_ms: u64,
    /// Days of alert history kept in the database.
    pub history_retention_days: i64,
    /// Retries after a transient fetch error.
    pub fetch_max_retries: u32,
    /// First backoff step in milliseconds; doubles per retry.
    pub fetch_retry_base_ms: u64,
    pub thresholds: Thresholds,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: None,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            fluid_api_url: DEFAULT_FLUID_API_URL.to_string(),
            chains: Chain::fluid().to_vec(),
            juplend: None,
            poll_interval_secs: 3600,
            message_gap_ms: 3000,
            history_retention_days: 30,
            fetch_max_retries: 3,
            fetch_retry_base_ms: 1000,
            thresholds: Thresholds::default(),
        }
    }
}

impl AppConfig {
    /// Create config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let telegram = match (text("BOT_TOKEN"), text("CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramSettings { bot_token, chat_id }),
            _ => None,
        };

        let juplend = text("JUP_API_KEY").map(|api_key| JupLendSettings {
            api_key,
            url: text("JUPLEND_API_URL").unwrap_or_else(|| DEFAULT_JUPLEND_API_URL.to_string()),
        });

        let chains = match text("FLUID_CHAINS") {
            Some(list) => parse_chains(&list)?,
            None => defaults.chains,
        };

        let d = &defaults.thresholds;
        let number = |key: &str| text(key).and_then(|v| positive_number(&v));
        let thresholds = Thresholds {
            rate_change_percent: number("RATE_CHANGE_THRESHOLD").unwrap_or(d.rate_change_percent),
            tvl_change_percent: number("TVL_CHANGE_THRESHOLD").unwrap_or(d.tvl_change_percent),
            reward_rate_change_percent: number("REWARD_RATE_CHANGE_THRESHOLD")
                .unwrap_or(d.reward_rate_change_percent),
            // Given in percent
            utilization_warning_bps: number("UTILIZATION_WARNING_THRESHOLD")
                .map(|pct| (pct * 100.0).round() as u32)
                .unwrap_or(d.utilization_warning_bps),
            min_rate_for_alert_bps: number("MIN_RATE_FOR_ALERT")
                .map(|bps| bps.round() as i64)
                .unwrap_or(d.min_rate_for_alert_bps),
            min_tvl_usd: number("MIN_TVL_USD")
                .map(UsdValue::from_f64)
                .unwrap_or(d.min_tvl_usd),
            min_tvl_change_usd: number("MIN_TVL_CHANGE_USD")
                .map(UsdValue::from_f64)
                .unwrap_or(d.min_tvl_change_usd),
            whale_activity_percent: number("WHALE_ACTIVITY_THRESHOLD")
                .unwrap_or(d.whale_activity_percent),
        };

        Ok(Self {
            telegram,
            database_url: text("DATABASE_URL").unwrap_or(defaults.database_url),
            fluid_api_url: text("FLUID_API_URL").unwrap_or(defaults.fluid_api_url),
            chains,
            juplend,
            poll_interval_secs: number("POLL_INTERVAL_SECS")
                .map(|s| s as u64)
                .filter(|s| *s > 0)
                .unwrap_or(defaults.poll_interval_secs),
            message_gap_ms: text("MESSAGE_GAP_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.message_gap_ms),
            history_retention_days: number("HISTORY_RETENTION_DAYS")
                .map(|d| d as i64)
                .filter(|d| *d > 0)
                .unwrap_or(defaults.history_retention_days),
            // Zero disables retries
            fetch_max_retries: text("FETCH_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fetch_max_retries),
            fetch_retry_base_ms: number("FETCH_RETRY_BASE_MS")
                .map(|ms| ms as u64)
                .unwrap_or(defaults.fetch_retry_base_ms),
            thresholds,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn message_gap(&self) -> Duration {
        Duration::from_millis(self.message_gap_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.fetch_max_retries,
            Duration::from_millis(self.fetch_retry_base_ms),
        )
    }

    /// Telegram settings, or an error when they are not configured.
    pub fn require_telegram(&self) -> Result<&TelegramSettings, ConfigError> {
        self.telegram.as_ref().ok_or(ConfigError::MissingTelegram)
    }
}

/// A missing, unparsable, zero or negative value means "use the default".
fn positive_number(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Parse a comma-separated chain list (names or numeric IDs).
fn parse_chains(list: &str) -> Result<Vec<Chain>, ConfigError> {
    let mut chains = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let chain: Chain = item.parse()?;
        if !chain.is_evm() {
            return Err(ConfigError::NotFluidChain(chain));
        }
        if !chains.contains(&chain) {
            chains.push(chain);
        }
    }
    Ok(chains)
}
