//! Market data collection over REST.
//!
//! ## Architecture
//!
//! - `fluid` - Fluid lending and liquidity tokens per EVM chain
//! - `juplend` - JupLend vaults on Solana, normalized to liquidity instruments
//! - `retry` - Exponential backoff for transient HTTP failures
//! - `wire` - Loose JSON number handling shared by both APIs

pub mod error;
pub mod fluid;
pub mod juplend;
pub mod retry;
pub mod wire;

pub use error::*;
pub use fluid::*;
pub use juplend::*;
pub use retry::*;

use rate_monitor_core::Snapshot;
use tracing::{error, info};

/// Fetch every source into one snapshot.
///
/// Per-chain and per-source failures are logged and the affected chain is
/// left out; the result may be empty.
pub async fn fetch_all(fluid: &FluidFetcher, juplend: Option<&JupLendFetcher>) -> Snapshot {
    let (chains, juplend_chain) = tokio::join!(fluid.fetch_all_chains(), async {
        match juplend {
            Some(fetcher) => Some(fetcher.fetch().await),
            None => None,
        }
    });

    let mut snapshot: Snapshot = chains.into_iter().collect();
    match juplend_chain {
        Some(Ok(chain)) if !chain.is_empty() => snapshot.insert(chain),
        Some(Ok(_)) => info!("[{}] No vaults returned.", JUPLEND_CHAIN),
        Some(Err(e)) => error!("[{}] Fetch failed: {}", JUPLEND_CHAIN, e),
        None => {}
    }

    let (lending, liquidity) = snapshot.instrument_counts();
    info!(
        chains = snapshot.len(),
        lending, liquidity, "Fetched market snapshot"
    );
    snapshot
}
