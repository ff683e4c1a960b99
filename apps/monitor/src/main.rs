//! Rate Monitor - Headless Server
//!
//! Polls Fluid (and optionally JupLend) lending markets, compares each
//! snapshot with the previous one and posts alerts to Telegram.

mod config;
mod cycle;

use clap::Parser;
use config::AppConfig;
use cycle::{run_cycle, run_digest, CycleOutcome, Delivery, DryRunSink, LiveSource};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rate_monitor_alerts::{start_notifier, Database, NotifierConfig, TelegramBot};
use rate_monitor_feeds::{FluidFetcher, JupLendFetcher};

/// Rate Monitor CLI
#[derive(Parser, Debug)]
#[command(name = "rate-monitor")]
#[command(about = "DeFi lending rate monitor with Telegram alerts", long_about = None)]
struct Args {
    /// Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Send the daily digest and exit
    #[arg(long, default_value_t = false)]
    digest: bool,

    /// Log messages instead of sending them to Telegram
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Seconds between cycles (overrides POLL_INTERVAL_SECS)
    #[arg(short, long)]
    interval_secs: Option<u64>,

    /// SQLite URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = match level {
        "trace" | "debug" | "info" | "warn" | "error" => level,
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_delivery(config: &AppConfig, dry_run: bool) -> Result<Delivery, Box<dyn std::error::Error>> {
    if dry_run {
        info!("Dry run: messages are logged, not sent");
        return Ok(Delivery::DryRun(DryRunSink));
    }

    let telegram = config.require_telegram()?;
    let bot = TelegramBot::new(&telegram.bot_token, &telegram.chat_id)?;
    let notifier = start_notifier(
        bot,
        NotifierConfig {
            message_gap: config.message_gap(),
            ..Default::default()
        },
    );
    Ok(Delivery::Telegram(notifier))
}

fn build_source(config: &AppConfig) -> Result<LiveSource, Box<dyn std::error::Error>> {
    let retry = config.retry_policy();
    let fluid = FluidFetcher::new(config.fluid_api_url.clone(), config.chains.clone())?
        .with_retry_policy(retry.clone());
    let juplend = match &config.juplend {
        Some(settings) => Some(
            JupLendFetcher::new(settings.url.clone(), settings.api_key.clone())?
                .with_retry_policy(retry),
        ),
        None => {
            info!("JUP_API_KEY not set, JupLend vaults disabled");
            None
        }
    };
    Ok(LiveSource { fluid, juplend })
}

async fn run_scheduler(source: &LiveSource, db: &Database, delivery: &Delivery, config: &AppConfig) {
    let poll_interval = config.poll_interval();
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
        }

        // A cycle in flight finishes before shutdown is observed
        match run_cycle(source, db, delivery, &config.thresholds, poll_interval).await {
            Ok(CycleOutcome::Skipped) => warn!("Cycle skipped, previous state kept"),
            Ok(_) => {}
            Err(e) => error!("Rate monitor cycle failed: {}", e),
        }

        match db.cleanup_old_history(config.history_retention_days).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Cleaned up old alert history"),
            Err(e) => warn!("Failed to clean up alert history: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let mut config = AppConfig::from_env()?;
    if let Some(secs) = args.interval_secs.filter(|s| *s > 0) {
        config.poll_interval_secs = secs;
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    info!("Starting Rate Monitor");
    info!(
        chains = ?config.chains,
        juplend = config.juplend.is_some(),
        interval_secs = config.poll_interval_secs,
        "Configuration loaded"
    );

    let delivery = build_delivery(&config, args.dry_run)?;
    let source = build_source(&config)?;

    if args.digest {
        run_digest(&source, &delivery).await;
        delivery.close().await;
        return Ok(());
    }

    let db = Database::connect(&config.database_url).await?;
    info!("Database ready: {}", config.database_url);

    if args.once {
        let result = run_cycle(
            &source,
            &db,
            &delivery,
            &config.thresholds,
            config.poll_interval(),
        )
        .await;
        delivery.close().await;
        result?;
        return Ok(());
    }

    run_scheduler(&source, &db, &delivery, &config).await;

    info!("Waiting for queued messages");
    tokio::time::timeout(Duration::from_secs(60), delivery.close())
        .await
        .unwrap_or_else(|_| warn!("Message queue did not drain in time"));

    info!("Rate Monitor stopped");
    Ok(())
}
