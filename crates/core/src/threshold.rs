//! Threshold policy consumed by the comparer.

use crate::rate::UsdValue;
use serde::{Deserialize, Serialize};

/// Alert thresholds. Percentages are relative changes; rates are basis points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum relative change of a rate to report a rate change.
    pub rate_change_percent: f64,
    /// Minimum relative change of a USD amount to report a TVL change.
    pub tvl_change_percent: f64,
    /// Minimum relative change of a reward rate.
    pub reward_rate_change_percent: f64,
    /// Utilization level that raises a warning when crossed upward.
    pub utilization_warning_bps: u32,
    /// Rate moves where both sides sit below this are noise (1bp -> 2bp is +100%).
    pub min_rate_for_alert_bps: i64,
    /// Previous USD amount must exceed this before TVL is compared at all.
    pub min_tvl_usd: UsdValue,
    /// Absolute USD move required for a TVL change.
    pub min_tvl_change_usd: UsdValue,
    /// TVL moves at or beyond this are also reported as whale activity.
    pub whale_activity_percent: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rate_change_percent: 10.0,
            tvl_change_percent: 5.0,
            reward_rate_change_percent: 10.0,
            utilization_warning_bps: 9_000,
            min_rate_for_alert_bps: 10,
            min_tvl_usd: UsdValue::from_dollars(10_000),
            min_tvl_change_usd: UsdValue::from_dollars(100_000),
            whale_activity_percent: 10.0,
        }
    }
}

impl Thresholds {
    pub fn with_rate_change_percent(mut self, percent: f64) -> Self {
        self.rate_change_percent = percent;
        self
    }

    pub fn with_tvl_change_percent(mut self, percent: f64) -> Self {
        self.tvl_change_percent = percent;
        self
    }

    pub fn with_reward_rate_change_percent(mut self, percent: f64) -> Self {
        self.reward_rate_change_percent = percent;
        self
    }

    pub fn with_utilization_warning_bps(mut self, bps: u32) -> Self {
        self.utilization_warning_bps = bps;
        self
    }

    pub fn with_min_rate_for_alert_bps(mut self, bps: i64) -> Self {
        self.min_rate_for_alert_bps = bps;
        self
    }

    pub fn with_min_tvl_usd(mut self, usd: UsdValue) -> Self {
        self.min_tvl_usd = usd;
        self
    }

    pub fn with_min_tvl_change_usd(mut self, usd: UsdValue) -> Self {
        self.min_tvl_change_usd = usd;
        self
    }

    pub fn with_whale_activity_percent(mut self, percent: f64) -> Self {
        self.whale_activity_percent = percent;
        self
    }

    /// Whether a rate move of `change` percent between `prev` and `curr` bps is reportable.
    ///
    /// Non-finite changes (zero baseline) never qualify.
    pub fn rate_move_qualifies(&self, prev: i64, curr: i64, change: f64, threshold: f64) -> bool {
        change.is_finite()
            && change.abs() >= threshold
            && prev.max(curr) >= self.min_rate_for_alert_bps
    }

    /// Whether a USD amount moved enough to report. `prev` must already be above the floor.
    pub fn tvl_move_qualifies(&self, prev: UsdValue, curr: UsdValue, change: f64) -> bool {
        change.is_finite()
            && change.abs() >= self.tvl_change_percent
            && prev.abs_diff(curr) >= self.min_tvl_change_usd
    }

    /// Whether a qualifying TVL move is also whale-sized.
    #[inline]
    pub fn is_whale_move(&self, change: f64) -> bool {
        change.abs() >= self.whale_activity_percent
    }

    /// One-shot upward crossing of the utilization warning level.
    #[inline]
    pub fn crossed_utilization(&self, prev_bps: u32, curr_bps: u32) -> bool {
        curr_bps >= self.utilization_warning_bps && prev_bps < self.utilization_warning_bps
    }
}
