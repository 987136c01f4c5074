//! # Gatekeeper Node
//!
//! Hosts one MDIP gatekeeper process.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration from `KC_GATEKEEPER_*`
//! 3. Open the storage backend
//! 4. Start the maintenance loops
//! 5. Wait for Ctrl-C, then let the in-flight cycle finish

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use mdip_gatekeeper::{
    spawn_maintenance, EventStore, Gatekeeper, InMemoryContentStore, InMemoryEventStore,
    JsonFileEventStore,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{Backend, NodeConfig};

/// How long shutdown waits for a running sweep.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

fn open_store(config: &NodeConfig) -> Result<Arc<dyn EventStore>> {
    match config.backend {
        Backend::Memory => Ok(Arc::new(InMemoryEventStore::new())),
        Backend::Json => {
            let path = config.data_dir.join("mdip.json");
            let store = JsonFileEventStore::open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "rocksdb")]
        Backend::RocksDb => {
            let path = config.data_dir.join("mdip-rocksdb");
            let store = mdip_gatekeeper::RocksDbEventStore::open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "rocksdb"))]
        Backend::RocksDb => bail!("built without the rocksdb feature"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::from_env().context("reading configuration")?;
    info!("===========================================");
    info!("  MDIP Gatekeeper v{}", env!("CARGO_PKG_VERSION"));
    info!("  Backend: {:?}", config.backend);
    info!("  Data Dir: {:?}", config.data_dir);
    info!("===========================================");

    let store = open_store(&config)?;
    let gatekeeper = Arc::new(
        Gatekeeper::new(config.gatekeeper.clone(), store)?
            .with_content_store(Arc::new(InMemoryContentStore::new())),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let maintenance = spawn_maintenance(Arc::clone(&gatekeeper), config.maintenance.clone(), shutdown_rx);

    info!("Gatekeeper is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Initiating graceful shutdown...");
    shutdown_tx.send(true)?;
    match tokio::time::timeout(SHUTDOWN_GRACE, maintenance).await {
        Ok(joined) => joined.context("maintenance task panicked")?,
        Err(_) => warn!("maintenance still busy after {:?}, exiting", SHUTDOWN_GRACE),
    }

    info!("Shutdown complete");
    Ok(())
}
