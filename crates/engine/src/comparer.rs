//! Snapshot comparison.
//!
//! Diffs the current snapshot against the previous one and classifies every
//! qualifying difference into an [`AlertSet`]. Instruments are matched by
//! address within the same chain and instrument kind. A missing match is the
//! new-asset signal; instruments that disappeared are ignored.

use compact_str::CompactString;
use rate_monitor_core::{
    bps_change, usd_change, Alert, AlertSet, HighUtilization, InstrumentKind, LendingInstrument,
    LiquidityInstrument, NewAsset, RateChange, RateMetric, RewardChange, Snapshot, Thresholds,
    TvlMove, TvlSide, UsdValue,
};

/// Compares snapshots under a fixed threshold policy.
#[derive(Debug, Clone, Default)]
pub struct RateComparer {
    thresholds: Thresholds,
}

impl RateComparer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Classify the differences between `current` and `previous`.
    ///
    /// Pure and deterministic: alerts follow the chain order of `current`,
    /// lending before liquidity, instruments in list order.
    pub fn compare(&self, current: &Snapshot, previous: &Snapshot) -> AlertSet {
        let mut alerts = AlertSet::new();

        for chain in current {
            let prev_chain = previous.get(&chain.name);

            for instrument in &chain.lending {
                match prev_chain.and_then(|p| p.find_lending(&instrument.address)) {
                    Some(prev) => self.compare_lending(&chain.name, prev, instrument, &mut alerts),
                    None => alerts.push(Alert::NewAsset(NewAsset::Lending {
                        chain: chain.name.clone(),
                        instrument: instrument.clone(),
                    })),
                }
            }

            for instrument in &chain.liquidity {
                match prev_chain.and_then(|p| p.find_liquidity(&instrument.address)) {
                    Some(prev) => {
                        self.compare_liquidity(&chain.name, prev, instrument, &mut alerts)
                    }
                    None => alerts.push(Alert::NewAsset(NewAsset::Liquidity {
                        chain: chain.name.clone(),
                        instrument: instrument.clone(),
                    })),
                }
            }
        }

        alerts
    }

    fn compare_lending(
        &self,
        chain: &CompactString,
        prev: &LendingInstrument,
        curr: &LendingInstrument,
        alerts: &mut AlertSet,
    ) {
        let t = &self.thresholds;

        let supply_fired = self.check_rate(
            chain,
            &curr.symbol,
            InstrumentKind::Lending,
            RateMetric::SupplyRate,
            prev.supply_rate_bps,
            curr.supply_rate_bps,
            alerts,
        );

        // A total APR move is usually the same supply move seen again.
        if !supply_fired {
            self.check_rate(
                chain,
                &curr.symbol,
                InstrumentKind::Lending,
                RateMetric::TotalApr,
                prev.total_rate_bps,
                curr.total_rate_bps,
                alerts,
            );
        }

        let change = bps_change(prev.rewards_rate_bps, curr.rewards_rate_bps);
        if t.rate_move_qualifies(
            prev.rewards_rate_bps,
            curr.rewards_rate_bps,
            change,
            t.reward_rate_change_percent,
        ) {
            alerts.push(Alert::RewardChange(RewardChange {
                chain: chain.clone(),
                symbol: curr.symbol.clone(),
                reward_token: None,
                prev_bps: prev.rewards_rate_bps,
                curr_bps: curr.rewards_rate_bps,
                change_percent: change,
            }));
        }

        for reward in &curr.rewards {
            let Some(prev_reward) = prev.reward(&reward.token_symbol) else {
                continue;
            };
            let change = bps_change(prev_reward.rate_bps, reward.rate_bps);
            if t.rate_move_qualifies(
                prev_reward.rate_bps,
                reward.rate_bps,
                change,
                t.reward_rate_change_percent,
            ) {
                alerts.push(Alert::RewardChange(RewardChange {
                    chain: chain.clone(),
                    symbol: curr.symbol.clone(),
                    reward_token: Some(reward.token_symbol.clone()),
                    prev_bps: prev_reward.rate_bps,
                    curr_bps: reward.rate_bps,
                    change_percent: change,
                }));
            }
        }

        self.check_tvl(
            chain,
            &curr.symbol,
            InstrumentKind::Lending,
            TvlSide::Supply,
            prev.total_assets_usd,
            curr.total_assets_usd,
            alerts,
        );
    }

    fn compare_liquidity(
        &self,
        chain: &CompactString,
        prev: &LiquidityInstrument,
        curr: &LiquidityInstrument,
        alerts: &mut AlertSet,
    ) {
        self.check_rate(
            chain,
            &curr.symbol,
            InstrumentKind::Liquidity,
            RateMetric::SupplyRate,
            prev.supply_rate_bps,
            curr.supply_rate_bps,
            alerts,
        );
        self.check_rate(
            chain,
            &curr.symbol,
            InstrumentKind::Liquidity,
            RateMetric::BorrowRate,
            prev.borrow_rate_bps,
            curr.borrow_rate_bps,
            alerts,
        );

        self.check_tvl(
            chain,
            &curr.symbol,
            InstrumentKind::Liquidity,
            TvlSide::Supply,
            prev.total_supply_usd,
            curr.total_supply_usd,
            alerts,
        );
        self.check_tvl(
            chain,
            &curr.symbol,
            InstrumentKind::Liquidity,
            TvlSide::Borrows,
            prev.total_borrow_usd,
            curr.total_borrow_usd,
            alerts,
        );

        if self
            .thresholds
            .crossed_utilization(prev.utilization_bps, curr.utilization_bps)
        {
            alerts.push(Alert::HighUtilization(HighUtilization {
                chain: chain.clone(),
                symbol: curr.symbol.clone(),
                utilization_bps: curr.utilization_bps,
                supply_rate_bps: curr.supply_rate_bps,
                borrow_rate_bps: curr.borrow_rate_bps,
            }));
        }
    }

    /// Push a rate change if it qualifies. Returns whether it fired.
    #[allow(clippy::too_many_arguments)]
    fn check_rate(
        &self,
        chain: &CompactString,
        symbol: &CompactString,
        source: InstrumentKind,
        metric: RateMetric,
        prev_bps: i64,
        curr_bps: i64,
        alerts: &mut AlertSet,
    ) -> bool {
        let t = &self.thresholds;
        let change = bps_change(prev_bps, curr_bps);
        if !t.rate_move_qualifies(prev_bps, curr_bps, change, t.rate_change_percent) {
            return false;
        }
        alerts.push(Alert::RateChange(RateChange {
            chain: chain.clone(),
            symbol: symbol.clone(),
            source,
            metric,
            prev_bps,
            curr_bps,
            change_percent: change,
        }));
        true
    }

    /// Push a TVL change, and a whale activity copy when the move is large enough.
    #[allow(clippy::too_many_arguments)]
    fn check_tvl(
        &self,
        chain: &CompactString,
        symbol: &CompactString,
        source: InstrumentKind,
        side: TvlSide,
        prev_usd: UsdValue,
        curr_usd: UsdValue,
        alerts: &mut AlertSet,
    ) {
        let t = &self.thresholds;
        // Dust pools and near-zero baselines are not compared.
        if prev_usd <= t.min_tvl_usd {
            return;
        }
        let change = usd_change(prev_usd, curr_usd);
        if !t.tvl_move_qualifies(prev_usd, curr_usd, change) {
            return;
        }

        let movement = TvlMove {
            chain: chain.clone(),
            symbol: symbol.clone(),
            source,
            side,
            prev_usd,
            curr_usd,
            change_percent: change,
        };
        if t.is_whale_move(change) {
            alerts.push(Alert::WhaleActivity(movement.clone()));
        }
        alerts.push(Alert::TvlChange(movement));
    }
}

/// Compare two snapshots under `thresholds`.
pub fn compare(current: &Snapshot, previous: &Snapshot, thresholds: &Thresholds) -> AlertSet {
    RateComparer::new(thresholds.clone()).compare(current, previous)
}
