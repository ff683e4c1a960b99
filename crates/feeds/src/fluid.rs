//! Fluid protocol REST fetcher.
//!
//! Two endpoints per chain:
//! - `GET {base}/v2/lending/{chainId}/tokens` returns `{"data": [...]}` of fTokens
//! - `GET {base}/{chainId}/liquidity/tokens` returns a bare array of liquidity tokens

use crate::error::FeedError;
use crate::retry::{with_retry, RetryPolicy};
use crate::wire::{decimals_or_default, usd_amount, LooseNumber};
use compact_str::CompactString;
use futures_util::future::join_all;
use rate_monitor_core::{
    Chain, ChainSnapshot, LendingInstrument, LiquidityInstrument, RewardEntry, UsdValue,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default public API base.
pub const DEFAULT_FLUID_API_URL: &str = "https://api.fluid.instadapp.io";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct LendingResponse {
    #[serde(default)]
    data: Vec<RawLendingToken>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLendingToken {
    #[serde(default)]
    symbol: Option<String>,
    address: String,
    #[serde(default)]
    decimals: LooseNumber,
    #[serde(default)]
    asset: Option<RawAsset>,
    #[serde(default)]
    supply_rate: LooseNumber,
    #[serde(default)]
    rewards_rate: LooseNumber,
    #[serde(default)]
    total_rate: LooseNumber,
    #[serde(default)]
    total_assets: LooseNumber,
    #[serde(default)]
    rewards: Option<Vec<RawReward>>,
}

#[derive(Debug, Deserialize)]
struct RawAsset {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    price: LooseNumber,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReward {
    #[serde(default)]
    token: Option<RawRewardToken>,
    #[serde(default)]
    rate: LooseNumber,
    #[serde(default)]
    end_time: LooseNumber,
}

#[derive(Debug, Deserialize)]
struct RawRewardToken {
    #[serde(default)]
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLiquidityToken {
    #[serde(default)]
    symbol: Option<String>,
    address: String,
    #[serde(default)]
    decimals: LooseNumber,
    #[serde(default)]
    price: LooseNumber,
    #[serde(default)]
    supply_rate: LooseNumber,
    #[serde(default)]
    borrow_rate: LooseNumber,
    #[serde(default)]
    total_supply: LooseNumber,
    #[serde(default)]
    total_borrow: LooseNumber,
    #[serde(default)]
    last_stored_utilization: LooseNumber,
}

fn symbol_or_unknown(symbol: Option<String>) -> CompactString {
    symbol
        .filter(|s| !s.is_empty())
        .map(CompactString::from)
        .unwrap_or_else(|| CompactString::const_new("?"))
}

/// Parse a lending tokens response body for `chain`.
pub fn parse_lending_tokens(chain: Chain, body: &str) -> Result<Vec<LendingInstrument>, FeedError> {
    let response: LendingResponse = serde_json::from_str(body)?;
    let chain_name = CompactString::const_new(chain.as_str());
    let chain_id = CompactString::from(chain.id_string());

    Ok(response
        .data
        .into_iter()
        .map(|t| {
            let decimals = decimals_or_default(&t.decimals);
            let (asset_symbol, price) = match t.asset {
                Some(asset) => (symbol_or_unknown(asset.symbol), asset.price.as_f64()),
                None => (symbol_or_unknown(None), 0.0),
            };
            let rewards = t
                .rewards
                .unwrap_or_default()
                .into_iter()
                .map(|r| RewardEntry {
                    token_symbol: symbol_or_unknown(r.token.and_then(|tok| tok.symbol)),
                    rate_bps: r.rate.as_i64(),
                    end_time: r.end_time.as_opt_i64(),
                })
                .collect();

            LendingInstrument {
                chain: chain_name.clone(),
                chain_id: chain_id.clone(),
                address: t.address.into(),
                symbol: symbol_or_unknown(t.symbol),
                asset_symbol,
                supply_rate_bps: t.supply_rate.as_i64(),
                rewards_rate_bps: t.rewards_rate.as_i64(),
                total_rate_bps: t.total_rate.as_i64(),
                total_assets_usd: UsdValue::from_f64(usd_amount(
                    price,
                    t.total_assets.as_f64(),
                    decimals,
                )),
                rewards,
            }
        })
        .collect())
}

/// Parse a liquidity tokens response body for `chain`.
pub fn parse_liquidity_tokens(
    chain: Chain,
    body: &str,
) -> Result<Vec<LiquidityInstrument>, FeedError> {
    let tokens: Vec<RawLiquidityToken> = serde_json::from_str(body)?;
    let chain_name = CompactString::const_new(chain.as_str());

    Ok(tokens
        .into_iter()
        .map(|t| {
            let decimals = decimals_or_default(&t.decimals);
            let price = t.price.as_f64();
            LiquidityInstrument {
                chain: chain_name.clone(),
                address: t.address.into(),
                symbol: symbol_or_unknown(t.symbol),
                supply_rate_bps: t.supply_rate.as_i64(),
                borrow_rate_bps: t.borrow_rate.as_i64(),
                total_supply_usd: UsdValue::from_f64(usd_amount(
                    price,
                    t.total_supply.as_f64(),
                    decimals,
                )),
                total_borrow_usd: UsdValue::from_f64(usd_amount(
                    price,
                    t.total_borrow.as_f64(),
                    decimals,
                )),
                utilization_bps: t.last_stored_utilization.as_i64().clamp(0, u32::MAX as i64)
                    as u32,
            }
        })
        .collect())
}

/// Fluid REST fetcher for a fixed set of chains.
pub struct FluidFetcher {
    client: reqwest::Client,
    base_url: String,
    chains: Vec<Chain>,
    retry: RetryPolicy,
}

impl FluidFetcher {
    pub fn new(base_url: impl Into<String>, chains: Vec<Chain>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chains,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn lending_url(&self, chain: Chain) -> String {
        format!("{}/v2/lending/{}/tokens", self.base_url, chain.id_string())
    }

    pub fn liquidity_url(&self, chain: Chain) -> String {
        format!("{}/{}/liquidity/tokens", self.base_url, chain.id_string())
    }

    async fn get_text(&self, url: &str) -> Result<String, FeedError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::from_status(status.as_u16(), url));
        }
        Ok(response.text().await?)
    }

    async fn get_with_retry(&self, url: &str) -> Result<String, FeedError> {
        with_retry(&self.retry, url, || self.get_text(url)).await
    }

    pub async fn fetch_lending(&self, chain: Chain) -> Result<Vec<LendingInstrument>, FeedError> {
        let body = self.get_with_retry(&self.lending_url(chain)).await?;
        parse_lending_tokens(chain, &body)
    }

    pub async fn fetch_liquidity(
        &self,
        chain: Chain,
    ) -> Result<Vec<LiquidityInstrument>, FeedError> {
        let body = self.get_with_retry(&self.liquidity_url(chain)).await?;
        parse_liquidity_tokens(chain, &body)
    }

    /// Fetch both lists for one chain. A failed list is logged and left empty.
    pub async fn fetch_chain(&self, chain: Chain) -> ChainSnapshot {
        let (lending, liquidity) =
            tokio::join!(self.fetch_lending(chain), self.fetch_liquidity(chain));

        let mut snapshot = ChainSnapshot::new(chain.as_str(), chain.id_string());
        match lending {
            Ok(items) => snapshot.lending = items,
            Err(e) => error!("[{}] Lending fetch failed: {}", chain, e),
        }
        match liquidity {
            Ok(items) => snapshot.liquidity = items,
            Err(e) => error!("[{}] Liquidity fetch failed: {}", chain, e),
        }
        debug!(
            "[{}] fetched {} lending, {} liquidity",
            chain,
            snapshot.lending.len(),
            snapshot.liquidity.len()
        );
        snapshot
    }

    /// Fetch every configured chain concurrently, in configuration order.
    /// Chains that returned nothing are omitted.
    pub async fn fetch_all_chains(&self) -> Vec<ChainSnapshot> {
        let results = join_all(self.chains.iter().map(|&chain| self.fetch_chain(chain))).await;
        results
            .into_iter()
            .filter(|snapshot| {
                if snapshot.is_empty() {
                    warn!("[{}] No data returned.", snapshot.name);
                    false
                } else {
                    true
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LENDING_BODY: &str = r#"{
        "data": [
            {
                "symbol": "fUSDC",
                "name": "Fluid USDC",
                "address": "0x9Fb7b4477576Fe5B32be4C1843aFB1e55F251B33",
                "decimals": 6,
                "asset": { "symbol": "USDC", "price": "1.0" },
                "supplyRate": "412",
                "rewardsRate": "150",
                "totalRate": "562",
                "totalAssets": "125000000000000",
                "rewards": [
                    { "token": { "symbol": "FLUID" }, "rate": "150", "endTime": 1767225600 }
                ]
            },
            {
                "address": "0x1111111111111111111111111111111111111111",
                "supplyRate": 0
            }
        ]
    }"#;

    const LIQUIDITY_BODY: &str = r#"[
        {
            "symbol": "WETH",
            "address": "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            "decimals": "18",
            "price": "2500",
            "supplyRate": "180",
            "borrowRate": "260",
            "totalSupply": "4000000000000000000000",
            "totalBorrow": "3000000000000000000000",
            "lastStoredUtilization": "7500"
        }
    ]"#;

    #[test]
    fn test_parse_lending_tokens() {
        let tokens = parse_lending_tokens(Chain::Ethereum, LENDING_BODY).unwrap();
        assert_eq!(tokens.len(), 2);

        let usdc = &tokens[0];
        assert_eq!(usdc.chain, "Ethereum");
        assert_eq!(usdc.chain_id, "1");
        assert_eq!(usdc.symbol, "fUSDC");
        assert_eq!(usdc.asset_symbol, "USDC");
        assert_eq!(usdc.supply_rate_bps, 412);
        assert_eq!(usdc.rewards_rate_bps, 150);
        assert_eq!(usdc.total_rate_bps, 562);
        assert_eq!(usdc.total_assets_usd, UsdValue::from_dollars(125_000_000));
        assert_eq!(
            usdc.rewards,
            vec![RewardEntry {
                token_symbol: "FLUID".into(),
                rate_bps: 150,
                end_time: Some(1_767_225_600),
            }]
        );
    }

    #[test]
    fn test_parse_lending_defaults_missing_fields() {
        let tokens = parse_lending_tokens(Chain::Base, LENDING_BODY).unwrap();
        let bare = &tokens[1];
        assert_eq!(bare.chain_id, "8453");
        assert_eq!(bare.symbol, "?");
        assert_eq!(bare.asset_symbol, "?");
        assert_eq!(bare.total_rate_bps, 0);
        assert_eq!(bare.total_assets_usd, UsdValue::ZERO);
        assert!(bare.rewards.is_empty());
    }

    #[test]
    fn test_parse_liquidity_tokens() {
        let tokens = parse_liquidity_tokens(Chain::Arbitrum, LIQUIDITY_BODY).unwrap();
        assert_eq!(tokens.len(), 1);
        let weth = &tokens[0];
        assert_eq!(weth.chain, "Arbitrum");
        assert_eq!(weth.supply_rate_bps, 180);
        assert_eq!(weth.borrow_rate_bps, 260);
        assert_eq!(weth.total_supply_usd, UsdValue::from_dollars(10_000_000));
        assert_eq!(weth.total_borrow_usd, UsdValue::from_dollars(7_500_000));
        assert_eq!(weth.utilization_bps, 7_500);
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(matches!(
            parse_liquidity_tokens(Chain::Polygon, r#"{"data": []}"#),
            Err(FeedError::ParseError(_))
        ));
        assert!(parse_lending_tokens(Chain::Polygon, "not json").is_err());
    }

    #[test]
    fn test_empty_lending_data() {
        assert!(parse_lending_tokens(Chain::Polygon, r#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn test_endpoint_urls() {
        let fetcher =
            FluidFetcher::new("https://api.fluid.instadapp.io/", Chain::fluid().to_vec()).unwrap();
        assert_eq!(
            fetcher.lending_url(Chain::Base),
            "https://api.fluid.instadapp.io/v2/lending/8453/tokens"
        );
        assert_eq!(
            fetcher.liquidity_url(Chain::Polygon),
            "https://api.fluid.instadapp.io/137/liquidity/tokens"
        );
        assert_eq!(fetcher.chains().len(), 4);
    }

    #[test]
    fn test_retry_policy_override() {
        let fetcher = FluidFetcher::new(DEFAULT_FLUID_API_URL, vec![Chain::Base]).unwrap();
        assert_eq!(fetcher.retry, RetryPolicy::default());

        let policy = RetryPolicy::new(5, Duration::from_millis(250));
        let fetcher = fetcher.with_retry_policy(policy.clone());
        assert_eq!(fetcher.retry, policy);
    }
}
