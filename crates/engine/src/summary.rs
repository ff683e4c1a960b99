//! Per-token liquidity deltas for the cycle log.
//!
//! Alerts only report what crosses a threshold; this is the full picture
//! of how every active liquidity market moved since the previous cycle.

use compact_str::CompactString;
use rate_monitor_core::{bps_change, bps_to_percent, utilization_percent, Snapshot};
use std::fmt;

/// One line of the cycle log.
#[derive(Debug, Clone, PartialEq)]
pub enum LiquidityReport {
    /// Chain has no previous data; none of its tokens are diffed.
    NewChain { chain: CompactString },
    /// Token has no previous counterpart on a known chain.
    NewToken {
        chain: CompactString,
        symbol: CompactString,
    },
    Moved(LiquidityMove),
}

/// Rate and utilization movement of one liquidity token.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityMove {
    pub chain: CompactString,
    pub symbol: CompactString,
    pub prev_supply_bps: i64,
    pub curr_supply_bps: i64,
    pub prev_borrow_bps: i64,
    pub curr_borrow_bps: i64,
    pub prev_utilization_bps: u32,
    pub curr_utilization_bps: u32,
}

impl LiquidityMove {
    pub fn supply_change(&self) -> f64 {
        bps_change(self.prev_supply_bps, self.curr_supply_bps)
    }

    pub fn borrow_change(&self) -> f64 {
        bps_change(self.prev_borrow_bps, self.curr_borrow_bps)
    }
}

fn change_label(change: f64) -> String {
    if change.is_finite() {
        format!("{:.1}%", change)
    } else {
        "n/a".to_string()
    }
}

impl fmt::Display for LiquidityMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: supply {}->{} ({}) | borrow {}->{} ({}) | util {:.1}%->{:.1}%",
            self.chain,
            self.symbol,
            bps_to_percent(self.prev_supply_bps),
            bps_to_percent(self.curr_supply_bps),
            change_label(self.supply_change()),
            bps_to_percent(self.prev_borrow_bps),
            bps_to_percent(self.curr_borrow_bps),
            change_label(self.borrow_change()),
            utilization_percent(self.prev_utilization_bps),
            utilization_percent(self.curr_utilization_bps),
        )
    }
}

impl fmt::Display for LiquidityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiquidityReport::NewChain { chain } => write!(f, "[{}] new chain, no previous data", chain),
            LiquidityReport::NewToken { chain, symbol } => write!(f, "[{}] new: {}", chain, symbol),
            LiquidityReport::Moved(m) => fmt::Display::fmt(m, f),
        }
    }
}

/// Report every liquidity token of `current` against `previous`.
///
/// Tokens with all rates at zero on both sides are left out.
pub fn summarize_liquidity_moves(current: &Snapshot, previous: &Snapshot) -> Vec<LiquidityReport> {
    let mut reports = Vec::new();

    for chain in current {
        let Some(prev_chain) = previous.get(&chain.name) else {
            reports.push(LiquidityReport::NewChain {
                chain: chain.name.clone(),
            });
            continue;
        };

        for token in &chain.liquidity {
            let Some(prev) = prev_chain.find_liquidity(&token.address) else {
                reports.push(LiquidityReport::NewToken {
                    chain: chain.name.clone(),
                    symbol: token.symbol.clone(),
                });
                continue;
            };
            if !prev.has_activity() && !token.has_activity() {
                continue;
            }
            reports.push(LiquidityReport::Moved(LiquidityMove {
                chain: chain.name.clone(),
                symbol: token.symbol.clone(),
                prev_supply_bps: prev.supply_rate_bps,
                curr_supply_bps: token.supply_rate_bps,
                prev_borrow_bps: prev.borrow_rate_bps,
                curr_borrow_bps: token.borrow_rate_bps,
                prev_utilization_bps: prev.utilization_bps,
                curr_utilization_bps: token.utilization_bps,
            }));
        }
    }

    reports
}
