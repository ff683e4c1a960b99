//! Market state snapshots.
//!
//! A [`Snapshot`] is produced once per poll cycle and never mutated after
//! it is handed to the comparer. Instruments are identified by `address`
//! only; symbols can repeat or change between cycles.

use crate::rate::UsdValue;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Instrument family, used to tag alerts and to scope address identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentKind {
    Lending,
    Liquidity,
}

impl InstrumentKind {
    /// Short tag used in rendered alerts.
    pub fn tag(self) -> &'static str {
        match self {
            InstrumentKind::Lending => "LEND",
            InstrumentKind::Liquidity => "LIQ",
        }
    }
}

/// One reward program attached to a lending instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEntry {
    pub token_symbol: CompactString,
    pub rate_bps: i64,
    /// Unix seconds when the program ends, if announced.
    #[serde(default)]
    pub end_time: Option<i64>,
}

/// Lending market (supply-only receipt token, e.g. an fToken).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingInstrument {
    pub chain: CompactString,
    pub chain_id: CompactString,
    pub address: CompactString,
    pub symbol: CompactString,
    /// Symbol of the underlying asset.
    pub asset_symbol: CompactString,
    pub supply_rate_bps: i64,
    pub rewards_rate_bps: i64,
    /// Reported independently by the source; not guaranteed to equal supply + rewards.
    pub total_rate_bps: i64,
    pub total_assets_usd: UsdValue,
    #[serde(default)]
    pub rewards: Vec<RewardEntry>,
}

impl LendingInstrument {
    /// Reward entry for a token symbol, if present.
    pub fn reward(&self, token_symbol: &str) -> Option<&RewardEntry> {
        self.rewards.iter().find(|r| r.token_symbol == token_symbol)
    }
}

/// Liquidity market with both supply and borrow sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityInstrument {
    pub chain: CompactString,
    pub address: CompactString,
    pub symbol: CompactString,
    pub supply_rate_bps: i64,
    pub borrow_rate_bps: i64,
    pub total_supply_usd: UsdValue,
    pub total_borrow_usd: UsdValue,
    /// 10000 = 100%.
    pub utilization_bps: u32,
}

impl LiquidityInstrument {
    /// Whether any rate is non-zero.
    pub fn has_activity(&self) -> bool {
        self.supply_rate_bps != 0 || self.borrow_rate_bps != 0
    }
}

/// Market state of a single chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub name: CompactString,
    pub chain_id: CompactString,
    #[serde(default)]
    pub lending: Vec<LendingInstrument>,
    #[serde(default)]
    pub liquidity: Vec<LiquidityInstrument>,
}

impl ChainSnapshot {
    pub fn new(name: impl Into<CompactString>, chain_id: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            chain_id: chain_id.into(),
            lending: Vec::new(),
            liquidity: Vec::new(),
        }
    }

    /// Lending instrument with this address.
    pub fn find_lending(&self, address: &str) -> Option<&LendingInstrument> {
        self.lending.iter().find(|i| i.address == address)
    }

    /// Liquidity instrument with this address.
    pub fn find_liquidity(&self, address: &str) -> Option<&LiquidityInstrument> {
        self.liquidity.iter().find(|i| i.address == address)
    }

    /// True when the chain returned no instruments at all.
    pub fn is_empty(&self) -> bool {
        self.lending.is_empty() && self.liquidity.is_empty()
    }
}

/// Market state across all chains, in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    chains: Vec<ChainSnapshot>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chain, replacing an existing chain of the same name in place.
    pub fn insert(&mut self, chain: ChainSnapshot) {
        match self.chains.iter_mut().find(|c| c.name == chain.name) {
            Some(existing) => *existing = chain,
            None => self.chains.push(chain),
        }
    }

    /// Builder-style [`Snapshot::insert`].
    pub fn with_chain(mut self, chain: ChainSnapshot) -> Self {
        self.insert(chain);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ChainSnapshot> {
        self.chains.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainSnapshot> {
        self.chains.iter()
    }

    /// Chain names in order.
    pub fn chain_names(&self) -> impl Iterator<Item = &str> {
        self.chains.iter().map(|c| c.name.as_str())
    }

    /// True when no chain is present (the "first run" sentinel).
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Total (lending, liquidity) instrument counts.
    pub fn instrument_counts(&self) -> (usize, usize) {
        self.chains.iter().fold((0, 0), |(lend, liq), c| {
            (lend + c.lending.len(), liq + c.liquidity.len())
        })
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a ChainSnapshot;
    type IntoIter = std::slice::Iter<'a, ChainSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.chains.iter()
    }
}

impl FromIterator<ChainSnapshot> for Snapshot {
    fn from_iter<I: IntoIterator<Item = ChainSnapshot>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for chain in iter {
            snapshot.insert(chain);
        }
        snapshot
    }
}
