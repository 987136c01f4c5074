//! Background maintenance.
//!
//! ```text
//!   process_interval ──→ process_events()        (drain deferred imports)
//!   gc_interval      ──→ verify_db() → check_dids()
//!   status_interval  ──→ status line
//! ```
//!
//! Each tick runs to completion. The shutdown signal is only checked between
//! ticks, so a sweep in progress is never cut short.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::config::MaintenanceConfig;
use crate::domain::CheckDidsOptions;
use crate::error::GatekeeperError;
use crate::service::Gatekeeper;

fn ticker(period: std::time::Duration) -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn process_cycle(gatekeeper: &Gatekeeper) {
    match gatekeeper.process_events().await {
        Ok(result) if result.busy => {}
        Ok(result) if result.pending > 0 => {
            info!(pending = result.pending, "[gatekeeper] events still waiting")
        }
        Ok(_) => {}
        Err(e) => error!("[gatekeeper] process_events failed: {}", e),
    }
}

async fn gc_cycle(gatekeeper: &Gatekeeper) {
    match gatekeeper.verify_db(false).await {
        Ok(_) | Err(GatekeeperError::Busy) => {}
        Err(e) => {
            error!("[gatekeeper] verify_db failed: {}", e);
            return;
        }
    }
    match gatekeeper.check_dids(CheckDidsOptions::default()).await {
        Ok(stats) => info!(
            total = stats.total,
            agents = stats.by_type.agents,
            assets = stats.by_type.assets,
            confirmed = stats.by_type.confirmed,
            unconfirmed = stats.by_type.unconfirmed,
            ephemeral = stats.by_type.ephemeral,
            invalid = stats.by_type.invalid,
            "[gatekeeper] DID census"
        ),
        Err(e) => error!("[gatekeeper] check_dids failed: {}", e),
    }
}

fn status(gatekeeper: &Gatekeeper) {
    info!(
        registries = ?gatekeeper.list_registries(),
        pending = gatekeeper.pending_events(),
        "[gatekeeper] status"
    );
}

/// Start the maintenance loops. The task ends once `shutdown` turns `true`
/// (or its sender is dropped).
pub fn spawn_maintenance(
    gatekeeper: Arc<Gatekeeper>,
    config: MaintenanceConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut process = ticker(config.process_interval);
        let mut gc = ticker(config.gc_interval);
        let mut report = ticker(config.status_interval);

        info!(
            process_secs = config.process_interval.as_secs(),
            gc_secs = config.gc_interval.as_secs(),
            "[gatekeeper] maintenance started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = process.tick() => process_cycle(&gatekeeper).await,
                _ = gc.tick() => gc_cycle(&gatekeeper).await,
                _ = report.tick() => status(&gatekeeper),
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("[gatekeeper] maintenance stopped");
    })
}
