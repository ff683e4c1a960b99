//! JupLend (Solana) vault fetcher.
//!
//! Vaults are normalized into liquidity instruments so they flow through the
//! same comparison as Fluid liquidity tokens. Requires an API key.

use crate::error::FeedError;
use crate::retry::{with_retry, RetryPolicy};
use crate::wire::{usd_amount, LooseNumber};
use compact_str::{format_compact, CompactString};
use rate_monitor_core::{Chain, ChainSnapshot, LiquidityInstrument, UsdValue};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Default vaults endpoint.
pub const DEFAULT_JUPLEND_API_URL: &str = "https://api.jup.ag/lend/v1/borrow/vaults";

/// Chain name JupLend data is reported under.
pub const JUPLEND_CHAIN: &str = "JupLend";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VaultsResponse {
    List(Vec<RawVault>),
    Wrapped { data: Vec<RawVault> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVault {
    address: String,
    #[serde(default)]
    supply_token: Option<RawVaultToken>,
    #[serde(default)]
    borrow_token: Option<RawVaultToken>,
    #[serde(default)]
    supply_rate: LooseNumber,
    #[serde(default)]
    borrow_rate: LooseNumber,
    #[serde(default)]
    total_supply: LooseNumber,
    #[serde(default)]
    total_borrow: LooseNumber,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVaultToken {
    #[serde(default)]
    ui_symbol: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    decimals: LooseNumber,
    #[serde(default)]
    price: LooseNumber,
}

impl RawVaultToken {
    fn display_symbol(&self) -> &str {
        self.ui_symbol
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.symbol.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("?")
    }

    /// USD value of a raw amount of this token.
    fn usd(&self, raw_amount: f64) -> f64 {
        usd_amount(self.price.as_f64(), raw_amount, self.decimals.as_decimals().unwrap_or(0))
    }
}

fn symbol_of(token: &Option<RawVaultToken>) -> &str {
    token.as_ref().map(RawVaultToken::display_symbol).unwrap_or("?")
}

/// Borrowed USD over supplied USD in bps, zero without supply.
fn vault_utilization_bps(supply_usd: f64, borrow_usd: f64) -> u32 {
    if supply_usd <= 0.0 {
        return 0;
    }
    let bps = (borrow_usd / supply_usd * 10_000.0).round();
    if bps.is_finite() {
        bps.clamp(0.0, u32::MAX as f64) as u32
    } else {
        0
    }
}

/// Parse a vaults response body into liquidity instruments.
pub fn parse_vaults(body: &str) -> Result<Vec<LiquidityInstrument>, FeedError> {
    let vaults = match serde_json::from_str::<VaultsResponse>(body)? {
        VaultsResponse::List(vaults) | VaultsResponse::Wrapped { data: vaults } => vaults,
    };

    Ok(vaults
        .into_iter()
        .map(|v| {
            let supply_usd = v
                .supply_token
                .as_ref()
                .map(|t| t.usd(v.total_supply.as_f64()))
                .unwrap_or(0.0);
            let borrow_usd = v
                .borrow_token
                .as_ref()
                .map(|t| t.usd(v.total_borrow.as_f64()))
                .unwrap_or(0.0);

            LiquidityInstrument {
                chain: CompactString::const_new(JUPLEND_CHAIN),
                address: v.address.into(),
                symbol: format_compact!(
                    "{}/{}",
                    symbol_of(&v.supply_token),
                    symbol_of(&v.borrow_token)
                ),
                supply_rate_bps: v.supply_rate.as_i64(),
                borrow_rate_bps: v.borrow_rate.as_i64(),
                total_supply_usd: UsdValue::from_f64(supply_usd),
                total_borrow_usd: UsdValue::from_f64(borrow_usd),
                utilization_bps: vault_utilization_bps(supply_usd, borrow_usd),
            }
        })
        .collect())
}

/// JupLend vaults fetcher.
pub struct JupLendFetcher {
    client: reqwest::Client,
    url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl JupLendFetcher {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get_text(&self) -> Result<String, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::from_status(status.as_u16(), self.url.as_str()));
        }
        Ok(response.text().await?)
    }

    /// Fetch all vaults as a chain snapshot named [`JUPLEND_CHAIN`].
    pub async fn fetch(&self) -> Result<ChainSnapshot, FeedError> {
        let body = with_retry(&self.retry, JUPLEND_CHAIN, || self.get_text()).await?;
        let liquidity = parse_vaults(&body)?;
        info!("[{}] Fetched {} vaults.", JUPLEND_CHAIN, liquidity.len());

        let mut snapshot = ChainSnapshot::new(JUPLEND_CHAIN, Chain::Solana.id_string());
        snapshot.liquidity = liquidity;
        Ok(snapshot)
    }
}
