//! # Node Configuration
//!
//! Everything is read from `KC_GATEKEEPER_*` environment variables; unset
//! variables keep the library defaults.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `KC_GATEKEEPER_DB` | `json` (default), `memory`, `rocksdb` |
//! | `KC_GATEKEEPER_DATA_DIR` | storage directory, default `data` |
//! | `KC_GATEKEEPER_DID_PREFIX` | prefix for new DIDs |
//! | `KC_GATEKEEPER_REGISTRIES` | comma separated supported registries |
//! | `KC_GATEKEEPER_MAX_OP_BYTES` | largest accepted operation |
//! | `KC_GATEKEEPER_MAX_QUEUE_SIZE` | queue length that suspends a registry |
//! | `KC_GATEKEEPER_GC_INTERVAL` | minutes between verification sweeps |
//! | `KC_GATEKEEPER_STATUS_INTERVAL` | minutes between status lines |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mdip_gatekeeper::{GatekeeperConfig, MaintenanceConfig};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeConfigError {
    #[error("{name}: cannot parse {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("unknown database backend: {0}")]
    UnknownBackend(String),
}

/// Storage backend selected by `KC_GATEKEEPER_DB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Json,
    RocksDb,
}

impl FromStr for Backend {
    type Err = NodeConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "json" => Ok(Backend::Json),
            "rocksdb" => Ok(Backend::RocksDb),
            other => Err(NodeConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub gatekeeper: GatekeeperConfig,
    pub maintenance: MaintenanceConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Json,
            data_dir: PathBuf::from("data"),
            gatekeeper: GatekeeperConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, NodeConfigError> {
    value.trim().parse().map_err(|_| NodeConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

fn minutes(name: &'static str, value: &str) -> Result<Duration, NodeConfigError> {
    let minutes: u64 = parse(name, value)?;
    if minutes == 0 {
        return Err(NodeConfigError::Invalid {
            name,
            value: value.to_string(),
        });
    }
    Ok(Duration::from_secs(minutes * 60))
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, NodeConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, NodeConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = NodeConfig::default();

        if let Some(db) = lookup("KC_GATEKEEPER_DB") {
            config.backend = db.parse()?;
        }
        if let Some(dir) = lookup("KC_GATEKEEPER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = lookup("KC_GATEKEEPER_DID_PREFIX") {
            config.gatekeeper.did_prefix = prefix;
        }
        if let Some(registries) = lookup("KC_GATEKEEPER_REGISTRIES") {
            config.gatekeeper.registries = registries
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = lookup("KC_GATEKEEPER_MAX_OP_BYTES") {
            config.gatekeeper.max_op_bytes = parse("KC_GATEKEEPER_MAX_OP_BYTES", &value)?;
        }
        if let Some(value) = lookup("KC_GATEKEEPER_MAX_QUEUE_SIZE") {
            config.gatekeeper.max_queue_size = parse("KC_GATEKEEPER_MAX_QUEUE_SIZE", &value)?;
        }
        if let Some(value) = lookup("KC_GATEKEEPER_GC_INTERVAL") {
            config.maintenance.gc_interval = minutes("KC_GATEKEEPER_GC_INTERVAL", &value)?;
        }
        if let Some(value) = lookup("KC_GATEKEEPER_STATUS_INTERVAL") {
            config.maintenance.status_interval = minutes("KC_GATEKEEPER_STATUS_INTERVAL", &value)?;
        }

        Ok(config)
    }
}
