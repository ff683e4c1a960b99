//! Alerts produced by comparing two snapshots.
//!
//! Alerts are plain values with no identity; they live for a single
//! comparison cycle.

use crate::rate::UsdValue;
use crate::snapshot::{InstrumentKind, LendingInstrument, LiquidityInstrument};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Which rate moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateMetric {
    SupplyRate,
    TotalApr,
    BorrowRate,
}

impl RateMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            RateMetric::SupplyRate => "Supply Rate",
            RateMetric::TotalApr => "Total APR",
            RateMetric::BorrowRate => "Borrow Rate",
        }
    }
}

impl std::fmt::Display for RateMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of a liquidity market whose USD amount moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TvlSide {
    Supply,
    Borrows,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateChange {
    pub chain: CompactString,
    pub symbol: CompactString,
    pub source: InstrumentKind,
    pub metric: RateMetric,
    pub prev_bps: i64,
    pub curr_bps: i64,
    pub change_percent: f64,
}

/// A USD amount move. Reported as a TVL change and, when large enough,
/// duplicated verbatim as whale activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvlMove {
    pub chain: CompactString,
    pub symbol: CompactString,
    pub source: InstrumentKind,
    pub side: TvlSide,
    pub prev_usd: UsdValue,
    pub curr_usd: UsdValue,
    pub change_percent: f64,
}

impl TvlMove {
    /// Symbol annotated with the side, e.g. `"USDC (borrows)"`.
    pub fn label(&self) -> String {
        match self.side {
            TvlSide::Supply => self.symbol.to_string(),
            TvlSide::Borrows => format!("{} (borrows)", self.symbol),
        }
    }

    /// Absolute USD moved.
    pub fn delta(&self) -> UsdValue {
        self.prev_usd.abs_diff(self.curr_usd)
    }

    pub fn is_inflow(&self) -> bool {
        self.change_percent > 0.0
    }
}

/// Reward rate move, either the aggregate rewards rate (`reward_token: None`)
/// or a single reward program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardChange {
    pub chain: CompactString,
    pub symbol: CompactString,
    pub reward_token: Option<CompactString>,
    pub prev_bps: i64,
    pub curr_bps: i64,
    pub change_percent: f64,
}

/// Instrument seen for the first time, carrying its current fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NewAsset {
    Lending {
        chain: CompactString,
        instrument: LendingInstrument,
    },
    Liquidity {
        chain: CompactString,
        instrument: LiquidityInstrument,
    },
}

impl NewAsset {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            NewAsset::Lending { .. } => InstrumentKind::Lending,
            NewAsset::Liquidity { .. } => InstrumentKind::Liquidity,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            NewAsset::Lending { instrument, .. } => &instrument.symbol,
            NewAsset::Liquidity { instrument, .. } => &instrument.symbol,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            NewAsset::Lending { instrument, .. } => &instrument.address,
            NewAsset::Liquidity { instrument, .. } => &instrument.address,
        }
    }
}

/// Utilization crossed the warning level this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighUtilization {
    pub chain: CompactString,
    pub symbol: CompactString,
    pub utilization_bps: u32,
    pub supply_rate_bps: i64,
    pub borrow_rate_bps: i64,
}

/// Alert category discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    RateChange,
    TvlChange,
    RewardChange,
    NewAsset,
    HighUtilization,
    WhaleActivity,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::RateChange => "rate_change",
            AlertKind::TvlChange => "tvl_change",
            AlertKind::RewardChange => "reward_change",
            AlertKind::NewAsset => "new_asset",
            AlertKind::HighUtilization => "high_utilization",
            AlertKind::WhaleActivity => "whale_activity",
        }
    }

    pub fn all() -> &'static [AlertKind] {
        &[
            AlertKind::RateChange,
            AlertKind::TvlChange,
            AlertKind::RewardChange,
            AlertKind::NewAsset,
            AlertKind::HighUtilization,
            AlertKind::WhaleActivity,
        ]
    }
}

/// One classified difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Alert {
    RateChange(RateChange),
    TvlChange(TvlMove),
    RewardChange(RewardChange),
    NewAsset(NewAsset),
    HighUtilization(HighUtilization),
    WhaleActivity(TvlMove),
}

impl Alert {
    pub fn kind(&self) -> AlertKind {
        self.view().kind()
    }

    /// Borrowed view of this alert.
    pub fn view(&self) -> AlertRef<'_> {
        match self {
            Alert::RateChange(a) => AlertRef::RateChange(a),
            Alert::TvlChange(a) => AlertRef::TvlChange(a),
            Alert::RewardChange(a) => AlertRef::RewardChange(a),
            Alert::NewAsset(a) => AlertRef::NewAsset(a),
            Alert::HighUtilization(a) => AlertRef::HighUtilization(a),
            Alert::WhaleActivity(a) => AlertRef::WhaleActivity(a),
        }
    }
}

/// Borrowed counterpart of [`Alert`], yielded by [`AlertSet::iter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertRef<'a> {
    RateChange(&'a RateChange),
    TvlChange(&'a TvlMove),
    RewardChange(&'a RewardChange),
    NewAsset(&'a NewAsset),
    HighUtilization(&'a HighUtilization),
    WhaleActivity(&'a TvlMove),
}

impl<'a> AlertRef<'a> {
    pub fn kind(&self) -> AlertKind {
        match self {
            AlertRef::RateChange(_) => AlertKind::RateChange,
            AlertRef::TvlChange(_) => AlertKind::TvlChange,
            AlertRef::RewardChange(_) => AlertKind::RewardChange,
            AlertRef::NewAsset(_) => AlertKind::NewAsset,
            AlertRef::HighUtilization(_) => AlertKind::HighUtilization,
            AlertRef::WhaleActivity(_) => AlertKind::WhaleActivity,
        }
    }

    pub fn chain(&self) -> &'a str {
        match *self {
            AlertRef::RateChange(a) => a.chain(),
            AlertRef::TvlChange(a) | AlertRef::WhaleActivity(a) => a.chain(),
            AlertRef::RewardChange(a) => a.chain(),
            AlertRef::NewAsset(a) => a.chain(),
            AlertRef::HighUtilization(a) => a.chain(),
        }
    }

    /// Instrument symbol the alert is about.
    pub fn symbol(&self) -> &'a str {
        match *self {
            AlertRef::RateChange(a) => &a.symbol,
            AlertRef::TvlChange(a) | AlertRef::WhaleActivity(a) => &a.symbol,
            AlertRef::RewardChange(a) => &a.symbol,
            AlertRef::NewAsset(a) => a.symbol(),
            AlertRef::HighUtilization(a) => &a.symbol,
        }
    }
}

/// Per-category alerts of one comparison, each in detection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSet {
    pub rate_changes: Vec<RateChange>,
    pub tvl_changes: Vec<TvlMove>,
    pub reward_changes: Vec<RewardChange>,
    pub new_assets: Vec<NewAsset>,
    pub high_utilization: Vec<HighUtilization>,
    pub whale_activity: Vec<TvlMove>,
}

impl AlertSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an alert to its category.
    pub fn push(&mut self, alert: Alert) {
        match alert {
            Alert::RateChange(a) => self.rate_changes.push(a),
            Alert::TvlChange(a) => self.tvl_changes.push(a),
            Alert::RewardChange(a) => self.reward_changes.push(a),
            Alert::NewAsset(a) => self.new_assets.push(a),
            Alert::HighUtilization(a) => self.high_utilization.push(a),
            Alert::WhaleActivity(a) => self.whale_activity.push(a),
        }
    }

    /// Number of alerts in one category.
    pub fn count(&self, kind: AlertKind) -> usize {
        match kind {
            AlertKind::RateChange => self.rate_changes.len(),
            AlertKind::TvlChange => self.tvl_changes.len(),
            AlertKind::RewardChange => self.reward_changes.len(),
            AlertKind::NewAsset => self.new_assets.len(),
            AlertKind::HighUtilization => self.high_utilization.len(),
            AlertKind::WhaleActivity => self.whale_activity.len(),
        }
    }

    /// `(kind, count)` for every category, including empty ones.
    pub fn counts(&self) -> Vec<(AlertKind, usize)> {
        AlertKind::all().iter().map(|&k| (k, self.count(k))).collect()
    }

    pub fn len(&self) -> usize {
        AlertKind::all().iter().map(|&k| self.count(k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All alerts, category by category, each category in detection order.
    pub fn iter(&self) -> impl Iterator<Item = AlertRef<'_>> {
        self.rate_changes
            .iter()
            .map(AlertRef::RateChange)
            .chain(self.tvl_changes.iter().map(AlertRef::TvlChange))
            .chain(self.reward_changes.iter().map(AlertRef::RewardChange))
            .chain(self.new_assets.iter().map(AlertRef::NewAsset))
            .chain(self.high_utilization.iter().map(AlertRef::HighUtilization))
            .chain(self.whale_activity.iter().map(AlertRef::WhaleActivity))
    }
}

impl Extend<Alert> for AlertSet {
    fn extend<I: IntoIterator<Item = Alert>>(&mut self, iter: I) {
        for alert in iter {
            self.push(alert);
        }
    }
}

/// Anything attributed to a chain.
pub trait ChainScoped {
    fn chain(&self) -> &str;
}

impl ChainScoped for RateChange {
    fn chain(&self) -> &str {
        &self.chain
    }
}

impl ChainScoped for TvlMove {
    fn chain(&self) -> &str {
        &self.chain
    }
}

impl ChainScoped for RewardChange {
    fn chain(&self) -> &str {
        &self.chain
    }
}

impl ChainScoped for NewAsset {
    fn chain(&self) -> &str {
        match self {
            NewAsset::Lending { chain, .. } | NewAsset::Liquidity { chain, .. } => chain,
        }
    }
}

impl ChainScoped for HighUtilization {
    fn chain(&self) -> &str {
        &self.chain
    }
}

impl ChainScoped for Alert {
    fn chain(&self) -> &str {
        match self {
            Alert::RateChange(a) => a.chain(),
            Alert::TvlChange(a) | Alert::WhaleActivity(a) => a.chain(),
            Alert::RewardChange(a) => a.chain(),
            Alert::NewAsset(a) => a.chain(),
            Alert::HighUtilization(a) => a.chain(),
        }
    }
}

/// Chain name with its alerts, in first-appearance order.
pub type ChainGroup<'a, T> = (&'a str, Vec<&'a T>);

/// Group alerts by chain. Chains appear in the order they are first seen
/// and each group keeps the input order.
pub fn group_by_chain<T: ChainScoped>(alerts: &[T]) -> Vec<ChainGroup<'_, T>> {
    let mut groups: Vec<ChainGroup<'_, T>> = Vec::new();
    for alert in alerts {
        let chain = alert.chain();
        match groups.iter_mut().find(|(name, _)| *name == chain) {
            Some((_, items)) => items.push(alert),
            None => groups.push((chain, vec![alert])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rate(chain: &str, symbol: &str) -> RateChange {
        RateChange {
            chain: chain.into(),
            symbol: symbol.into(),
            source: InstrumentKind::Liquidity,
            metric: RateMetric::SupplyRate,
            prev_bps: 100,
            curr_bps: 150,
            change_percent: 50.0,
        }
    }

    fn utilization(chain: &str) -> HighUtilization {
        HighUtilization {
            chain: chain.into(),
            symbol: "USDC".into(),
            utilization_bps: 9_300,
            supply_rate_bps: 500,
            borrow_rate_bps: 800,
        }
    }

    #[test]
    fn test_group_by_chain_keeps_first_seen_order() {
        let alerts = vec![
            rate("Base", "A"),
            rate("Ethereum", "B"),
            rate("Base", "C"),
            rate("Arbitrum", "D"),
            rate("Ethereum", "E"),
        ];

        let groups = group_by_chain(&alerts);
        let shape: Vec<(&str, Vec<&str>)> = groups
            .iter()
            .map(|(chain, items)| (*chain, items.iter().map(|a| a.symbol.as_str()).collect()))
            .collect();

        assert_eq!(
            shape,
            vec![
                ("Base", vec!["A", "C"]),
                ("Ethereum", vec!["B", "E"]),
                ("Arbitrum", vec!["D"]),
            ]
        );
    }

    #[test]
    fn test_group_by_chain_empty() {
        let alerts: Vec<RateChange> = Vec::new();
        assert!(group_by_chain(&alerts).is_empty());
    }

    #[test]
    fn test_alert_set_push_routes_by_variant() {
        let mut set = AlertSet::new();
        set.push(Alert::RateChange(rate("Base", "A")));
        set.push(Alert::HighUtilization(utilization("Base")));
        set.push(Alert::HighUtilization(utilization("Polygon")));

        assert_eq!(set.rate_changes.len(), 1);
        assert_eq!(set.high_utilization.len(), 2);
        assert_eq!(set.len(), 3);
        assert_eq!(set.count(AlertKind::WhaleActivity), 0);
        assert!(!set.is_empty());
    }

    #[test]
    fn test_alert_set_iter_walks_categories_in_order() {
        let mut set = AlertSet::new();
        set.push(Alert::HighUtilization(utilization("Base")));
        set.push(Alert::RateChange(rate("Ethereum", "A")));

        let kinds: Vec<AlertKind> = set.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![AlertKind::RateChange, AlertKind::HighUtilization]);
        let chains: Vec<&str> = set.iter().map(|a| a.chain()).collect();
        assert_eq!(chains, vec!["Ethereum", "Base"]);
        let symbols: Vec<&str> = set.iter().map(|a| a.symbol()).collect();
        assert_eq!(symbols, vec!["A", "USDC"]);
    }

    #[test]
    fn test_tvl_move_label() {
        let mv = TvlMove {
            chain: "Ethereum".into(),
            symbol: "USDC".into(),
            source: InstrumentKind::Liquidity,
            side: TvlSide::Borrows,
            prev_usd: UsdValue::from_dollars(2_000_000),
            curr_usd: UsdValue::from_dollars(1_500_000),
            change_percent: -25.0,
        };
        assert_eq!(mv.label(), "USDC (borrows)");
        assert_eq!(mv.delta(), UsdValue::from_dollars(500_000));
        assert!(!mv.is_inflow());
    }

    #[test]
    fn test_counts_cover_every_kind() {
        let set = AlertSet::new();
        let counts = set.counts();
        assert_eq!(counts.len(), AlertKind::all().len());
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }
}
