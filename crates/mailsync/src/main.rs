//! `mailsyncd` - background mailbox synchronization.
//!
//! Every poll interval, syncs the inbox of each account whose sync interval
//! has elapsed. Run with `--once` for a single pass.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use anyhow::{Context, bail};
use chrono::Utc;
use mailsync_core::{AccountContext, Database, EngineConfig, NetworkClients, SyncOrchestrator};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

type Engine = SyncOrchestrator<NetworkClients>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut once = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => once = true,
            other => bail!("unknown argument: {other}"),
        }
    }

    let config = EngineConfig::load_default().context("failed to load configuration")?;
    let db_path = config.database_path()?;
    let db = Database::open(&db_path)
        .await
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    info!(database = %db_path.display(), "Starting mailsyncd");

    let engine = SyncOrchestrator::with_network(db, config);
    if once {
        return run_pass(&engine).await;
    }

    let mut ticker = tokio::time::interval(engine.config().poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutting down");
                return Ok(());
            }
            () = tick(&engine, &mut ticker) => {}
        }
    }
}

async fn tick(engine: &Engine, ticker: &mut Interval) {
    ticker.tick().await;
    if let Err(e) = run_pass(engine).await {
        warn!(error = %e, "Sync pass failed");
    }
}

/// Syncs the inbox of every due account. Per-account failures are logged
/// and do not stop the pass.
async fn run_pass(engine: &Engine) -> anyhow::Result<()> {
    let folder = engine.config().folders.inbox.clone();
    let limit = engine.config().default_fetch_limit;
    let accounts = engine
        .account_ids()
        .await
        .context("failed to list accounts")?;

    for account in accounts {
        let ctx = AccountContext::new(account);
        match engine.sync_due(&ctx, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(account = %account, "Sync not due");
                continue;
            }
            Err(e) => {
                warn!(account = %account, error = %e, "Failed to read sync schedule");
                continue;
            }
        }

        match engine.sync_messages(&ctx, &folder, limit).await {
            Ok(report) => info!(
                account = %account,
                folder = %report.folder,
                fetched = report.fetched,
                inserted = report.inserted,
                updated = report.updated,
                "Account synced"
            ),
            Err(e) => warn!(
                account = %account,
                remediation = ?e.remediation(),
                error = %e,
                "{}",
                e.user_message()
            ),
        }
    }
    Ok(())
}
