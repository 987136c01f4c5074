//! Gatekeeper configuration.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use crate::domain::registry::{registry_kind, ConfirmationPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No supported registries configured")]
    EmptyRegistries,

    #[error("Unknown registry: {0}")]
    UnknownRegistry(String),

    #[error("Invalid DID prefix: {0}")]
    InvalidPrefix(String),

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct GatekeeperConfig {
    /// Prefix for new DIDs, e.g. `did:test`.
    pub did_prefix: String,
    /// Registries new DIDs may be created on.
    pub registries: Vec<String>,
    /// Largest accepted serialized operation.
    pub max_op_bytes: usize,
    /// Queue length at which a registry stops accepting new DIDs.
    pub max_queue_size: usize,
    /// Per-registry overrides of the default confirmation policy.
    pub confirmation: HashMap<String, ConfirmationPolicy>,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            did_prefix: "did:test".to_string(),
            registries: vec!["local".to_string(), "hyperswarm".to_string()],
            max_op_bytes: 64 * 1024,
            max_queue_size: 100,
            confirmation: HashMap::new(),
        }
    }
}

impl GatekeeperConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parts: Vec<&str> = self.did_prefix.split(':').collect();
        if parts.len() < 2 || parts[0] != "did" || parts.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::InvalidPrefix(self.did_prefix.clone()));
        }
        if self.registries.is_empty() {
            return Err(ConfigError::EmptyRegistries);
        }
        for registry in self.registries.iter().chain(self.confirmation.keys()) {
            if registry_kind(registry).is_none() {
                return Err(ConfigError::UnknownRegistry(registry.clone()));
            }
        }
        if self.max_op_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_op_bytes"));
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::ZeroLimit("max_queue_size"));
        }
        Ok(())
    }

    /// Effective confirmation policy for `registry`.
    pub fn policy_for(&self, registry: &str) -> ConfirmationPolicy {
        if let Some(policy) = self.confirmation.get(registry) {
            return policy.clone();
        }
        registry_kind(registry)
            .map(ConfirmationPolicy::default_for)
            // unknown registries never confirm
            .unwrap_or(ConfirmationPolicy::BlockDepth { min_depth: u64::MAX })
    }
}

/// Background loop intervals.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Drain the import queue.
    pub process_interval: Duration,
    /// `verify_db` followed by `check_dids`.
    pub gc_interval: Duration,
    /// Status report.
    pub status_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            process_interval: Duration::from_secs(60),
            gc_interval: Duration::from_secs(15 * 60),
            status_interval: Duration::from_secs(5 * 60),
        }
    }
}
