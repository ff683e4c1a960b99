//! One monitor cycle: load the previous snapshot, fetch the current one,
//! compare, deliver and persist.

use async_trait::async_trait;
use chrono::Utc;
use rate_monitor_alerts::{
    describe_alert, format_daily_digest, format_started_notice, render_alerts, strip_html,
    Database, DbError, NotifierHandle,
};
use rate_monitor_core::{AlertSet, Snapshot, Thresholds};
use rate_monitor_engine::{summarize_liquidity_moves, RateComparer};
use rate_monitor_feeds::{fetch_all, FluidFetcher, JupLendFetcher};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("State store error: {0}")]
    Store(#[from] DbError),
}

/// Produces the current market snapshot. Never fails; an empty snapshot
/// means nothing could be fetched.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Snapshot;
}

/// Persists the last snapshot and the alert history.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Snapshot, DbError>;
    async fn save(&self, snapshot: &Snapshot) -> Result<(), DbError>;
    async fn record(&self, alerts: &AlertSet) -> Result<(), DbError>;
}

/// Accepts outgoing HTML messages. `None` and empty messages are skipped.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, message: Option<String>);
}

/// Fluid chains plus the optional JupLend vaults.
pub struct LiveSource {
    pub fluid: FluidFetcher,
    pub juplend: Option<JupLendFetcher>,
}

#[async_trait]
impl SnapshotSource for LiveSource {
    async fn fetch(&self) -> Snapshot {
        fetch_all(&self.fluid, self.juplend.as_ref()).await
    }
}

#[async_trait]
impl SnapshotStore for Database {
    async fn load(&self) -> Result<Snapshot, DbError> {
        self.load_snapshot().await
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), DbError> {
        self.save_snapshot(snapshot).await
    }

    async fn record(&self, alerts: &AlertSet) -> Result<(), DbError> {
        let written = self.record_alerts(alerts).await?;
        debug!(written, "Recorded alert history");
        Ok(())
    }
}

#[async_trait]
impl MessageSink for NotifierHandle {
    async fn deliver(&self, message: Option<String>) {
        self.enqueue(message).await;
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSink;

#[async_trait]
impl MessageSink for DryRunSink {
    async fn deliver(&self, message: Option<String>) {
        if let Some(message) = message.filter(|m| !m.is_empty()) {
            info!("[dry-run] message:\n{}", strip_html(&message));
        }
    }
}

/// Where outgoing messages go for this process.
pub enum Delivery {
    Telegram(NotifierHandle),
    DryRun(DryRunSink),
}

impl Delivery {
    /// Wait until queued messages are sent.
    pub async fn close(self) {
        match self {
            Delivery::Telegram(handle) => handle.close().await,
            Delivery::DryRun(_) => {}
        }
    }
}

#[async_trait]
impl MessageSink for Delivery {
    async fn deliver(&self, message: Option<String>) {
        match self {
            Delivery::Telegram(handle) => handle.deliver(message).await,
            Delivery::DryRun(sink) => sink.deliver(message).await,
        }
    }
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing was fetched; stored state untouched.
    Skipped,
    /// No previous snapshot; the current one became the baseline.
    Baseline,
    /// Compared against the previous snapshot.
    Compared { alerts: AlertSet },
}

/// Run one cycle against the given collaborators.
pub async fn run_cycle<S, T, M>(
    source: &S,
    store: &T,
    sink: &M,
    thresholds: &Thresholds,
    poll_interval: Duration,
) -> Result<CycleOutcome, MonitorError>
where
    S: SnapshotSource + ?Sized,
    T: SnapshotStore + ?Sized,
    M: MessageSink + ?Sized,
{
    info!("Starting rate monitor cycle");

    let previous = store.load().await?;
    let current = source.fetch().await;

    if current.is_empty() {
        error!("No data fetched from any chain, skipping cycle");
        return Ok(CycleOutcome::Skipped);
    }

    if previous.is_empty() {
        info!("First run, saving baseline");
        store.save(&current).await?;
        sink.deliver(Some(format_started_notice(&current, thresholds, poll_interval)))
            .await;
        return Ok(CycleOutcome::Baseline);
    }

    for report in summarize_liquidity_moves(&current, &previous) {
        info!("{}", report);
    }

    let alerts = RateComparer::new(thresholds.clone()).compare(&current, &previous);
    for alert in alerts.iter() {
        debug!("{}", describe_alert(alert));
    }

    let messages = render_alerts(&alerts);
    let message_count = messages.len();
    for message in messages {
        sink.deliver(Some(message)).await;
    }

    if !alerts.is_empty() {
        if let Err(e) = store.record(&alerts).await {
            warn!("Failed to record alert history: {}", e);
        }
    }

    store.save(&current).await?;

    for (kind, count) in alerts.counts() {
        if count > 0 {
            debug!(kind = kind.as_str(), count, "Alerts by kind");
        }
    }
    info!(
        alerts = alerts.len(),
        messages = message_count,
        "Rate monitor cycle done"
    );

    Ok(CycleOutcome::Compared { alerts })
}

/// Fetch the current snapshot and deliver the daily digest.
/// Returns `false` when nothing could be fetched.
pub async fn run_digest<S, M>(source: &S, sink: &M) -> bool
where
    S: SnapshotSource + ?Sized,
    M: MessageSink + ?Sized,
{
    info!("Generating daily digest");
    let current = source.fetch().await;
    if current.is_empty() {
        error!("No data for daily digest");
        return false;
    }

    sink.deliver(Some(format_daily_digest(&current, Utc::now().date_naive())))
        .await;
    info!("Daily digest queued");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rate_monitor_core::{
        AlertKind, ChainSnapshot, LendingInstrument, LiquidityInstrument, UsdValue,
    };
    use std::sync::Mutex;

    struct FakeSource(Snapshot);

    #[async_trait]
    impl SnapshotSource for FakeSource {
        async fn fetch(&self) -> Snapshot {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct FakeStore {
        saved: Mutex<Option<Snapshot>>,
        recorded: Mutex<usize>,
        saves: Mutex<usize>,
    }

    impl FakeStore {
        fn with_snapshot(snapshot: Snapshot) -> Self {
            Self {
                saved: Mutex::new(Some(snapshot)),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SnapshotStore for FakeStore {
        async fn load(&self) -> Result<Snapshot, DbError> {
            Ok(self.saved.lock().unwrap().clone().unwrap_or_default())
        }

        async fn save(&self, snapshot: &Snapshot) -> Result<(), DbError> {
            *self.saved.lock().unwrap() = Some(snapshot.clone());
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }

        async fn record(&self, alerts: &AlertSet) -> Result<(), DbError> {
            *self.recorded.lock().unwrap() += alerts.len();
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeSink(Mutex<Vec<String>>);

    impl FakeSink {
        fn messages(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSink for FakeSink {
        async fn deliver(&self, message: Option<String>) {
            if let Some(message) = message {
                self.0.lock().unwrap().push(message);
            }
        }
    }

    fn lending(address: &str, symbol: &str, supply_bps: i64) -> LendingInstrument {
        LendingInstrument {
            chain: "Ethereum".into(),
            chain_id: "1".into(),
            address: address.into(),
            symbol: symbol.into(),
            asset_symbol: symbol.trim_start_matches('f').into(),
            supply_rate_bps: supply_bps,
            rewards_rate_bps: 0,
            total_rate_bps: supply_bps,
            total_assets_usd: UsdValue::from_dollars(5_000_000),
            rewards: vec![],
        }
    }

    fn liquidity(symbol: &str, utilization_bps: u32) -> LiquidityInstrument {
        LiquidityInstrument {
            chain: "Ethereum".into(),
            address: format!("0x{}", symbol.to_lowercase()).into(),
            symbol: symbol.into(),
            supply_rate_bps: 300,
            borrow_rate_bps: 500,
            total_supply_usd: UsdValue::from_dollars(2_000_000),
            total_borrow_usd: UsdValue::from_dollars(1_000_000),
            utilization_bps,
        }
    }

    fn snapshot(lend: Vec<LendingInstrument>, liq: Vec<LiquidityInstrument>) -> Snapshot {
        let mut chain = ChainSnapshot::new("Ethereum", "1");
        chain.lending = lend;
        chain.liquidity = liq;
        Snapshot::new().with_chain(chain)
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_empty_fetch_skips_without_saving() {
        let previous = snapshot(vec![lending("0x1", "fUSDC", 400)], vec![]);
        let store = FakeStore::with_snapshot(previous.clone());
        let sink = FakeSink::default();

        let outcome = run_cycle(
            &FakeSource(Snapshot::new()),
            &store,
            &sink,
            &Thresholds::default(),
            HOUR,
        )
        .await
        .unwrap();

        assert_eq!(outcome, CycleOutcome::Skipped);
        assert_eq!(*store.saves.lock().unwrap(), 0);
        assert_eq!(store.saved.lock().unwrap().clone(), Some(previous));
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_first_run_saves_baseline_and_announces() {
        let current = snapshot(vec![lending("0x1", "fUSDC", 400)], vec![liquidity("USDC", 7_000)]);
        let store = FakeStore::default();
        let sink = FakeSink::default();

        let outcome = run_cycle(
            &FakeSource(current.clone()),
            &store,
            &sink,
            &Thresholds::default(),
            HOUR,
        )
        .await
        .unwrap();

        assert_eq!(outcome, CycleOutcome::Baseline);
        assert_eq!(store.saved.lock().unwrap().clone(), Some(current));
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Started"));
        assert!(messages[0].contains("USDC"));
    }

    #[tokio::test]
    async fn test_changes_are_delivered_recorded_and_saved() {
        let previous = snapshot(
            vec![lending("0x1", "fUSDC", 400)],
            vec![liquidity("USDC", 8_500)],
        );
        let current = snapshot(
            vec![lending("0x1", "fUSDC", 500), lending("0x2", "fWETH", 200)],
            vec![liquidity("USDC", 9_200)],
        );
        let store = FakeStore::with_snapshot(previous);
        let sink = FakeSink::default();

        let outcome = run_cycle(
            &FakeSource(current.clone()),
            &store,
            &sink,
            &Thresholds::default(),
            HOUR,
        )
        .await
        .unwrap();

        let CycleOutcome::Compared { alerts } = outcome else {
            panic!("expected a comparison");
        };
        assert_eq!(alerts.count(AlertKind::RateChange), 1);
        assert_eq!(alerts.count(AlertKind::NewAsset), 1);
        assert_eq!(alerts.count(AlertKind::HighUtilization), 1);

        // rate, new asset, utilization blocks in that order
        let messages = sink.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("RATE CHANGE ALERTS"));
        assert!(messages[1].contains("NEW ASSETS DETECTED"));
        assert!(messages[2].contains("HIGH UTILIZATION WARNING"));

        assert_eq!(*store.recorded.lock().unwrap(), 3);
        assert_eq!(store.saved.lock().unwrap().clone(), Some(current));
    }

    #[tokio::test]
    async fn test_quiet_cycle_still_saves() {
        let state = snapshot(vec![lending("0x1", "fUSDC", 400)], vec![]);
        let store = FakeStore::with_snapshot(state.clone());
        let sink = FakeSink::default();

        let outcome = run_cycle(
            &FakeSource(state),
            &store,
            &sink,
            &Thresholds::default(),
            HOUR,
        )
        .await
        .unwrap();

        assert_eq!(outcome, CycleOutcome::Compared { alerts: AlertSet::new() });
        assert!(sink.messages().is_empty());
        assert_eq!(*store.recorded.lock().unwrap(), 0);
        assert_eq!(*store.saves.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cycle_against_sqlite_store() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let sink = FakeSink::default();
        let first = snapshot(vec![lending("0x1", "fUSDC", 400)], vec![]);
        let second = snapshot(vec![lending("0x1", "fUSDC", 600)], vec![]);

        let outcome = run_cycle(&FakeSource(first), &db, &sink, &Thresholds::default(), HOUR)
            .await
            .unwrap();
        assert_eq!(outcome, CycleOutcome::Baseline);

        run_cycle(&FakeSource(second.clone()), &db, &sink, &Thresholds::default(), HOUR)
            .await
            .unwrap();
        assert_eq!(db.load_snapshot().await.unwrap(), second);
        assert_eq!(db.recent_alert_count(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_digest() {
        let sink = FakeSink::default();
        assert!(!run_digest(&FakeSource(Snapshot::new()), &sink).await);
        assert!(sink.messages().is_empty());

        let current = snapshot(vec![lending("0x1", "fUSDC", 400)], vec![]);
        assert!(run_digest(&FakeSource(current), &sink).await);
        assert_eq!(sink.messages().len(), 1);
        assert!(sink.messages()[0].contains("DAILY DIGEST"));
    }
}
