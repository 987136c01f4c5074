//! Registries and their confirmation policies.
//!
//! | Kind | Registries | Default policy |
//! |------|-----------|----------------|
//! | Local | `local` | immediate |
//! | Gossip | `hyperswarm` | corroborated, min age 0s |
//! | Block-anchored | `TESS`, `TBTC`, `TFTC`, `Signet`, `Signet-Inscription`, `BTC-Inscription` | depth 0 |
//!
//! An event only counts as confirmed when it is the native registry's copy
//! and the native registry's policy holds for it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::time::parse_time;
use shared_types::Event;

pub const LOCAL: &str = "local";
pub const HYPERSWARM: &str = "hyperswarm";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryKind {
    /// Instant, node-local log.
    Local,
    /// Gossip propagation with no external finality.
    Gossip,
    /// Anchored in blocks of an external chain.
    BlockAnchored,
}

pub const KNOWN_REGISTRIES: &[(&str, RegistryKind)] = &[
    (LOCAL, RegistryKind::Local),
    (HYPERSWARM, RegistryKind::Gossip),
    ("TESS", RegistryKind::BlockAnchored),
    ("TBTC", RegistryKind::BlockAnchored),
    ("TFTC", RegistryKind::BlockAnchored),
    ("Signet", RegistryKind::BlockAnchored),
    ("Signet-Inscription", RegistryKind::BlockAnchored),
    ("BTC-Inscription", RegistryKind::BlockAnchored),
];

pub fn registry_kind(name: &str) -> Option<RegistryKind> {
    KNOWN_REGISTRIES
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, kind)| *kind)
}

pub fn is_known_registry(name: &str) -> bool {
    registry_kind(name).is_some()
}

/// Facts a policy may consult.
#[derive(Clone, Debug)]
pub struct ConfirmationContext {
    pub now: DateTime<Utc>,
    /// Tracked tip height of the native registry, if it has blocks.
    pub tip_height: Option<u64>,
}

/// When a native-registry event counts as final.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationPolicy {
    Immediate,
    /// Event time must be at least `min_age` in the past.
    Corroborated { min_age: Duration },
    /// Anchoring block must be at least `min_depth` blocks deep (tip counts as 1).
    BlockDepth { min_depth: u64 },
}

impl ConfirmationPolicy {
    pub fn default_for(kind: RegistryKind) -> Self {
        match kind {
            RegistryKind::Local => ConfirmationPolicy::Immediate,
            RegistryKind::Gossip => ConfirmationPolicy::Corroborated {
                min_age: Duration::ZERO,
            },
            RegistryKind::BlockAnchored => ConfirmationPolicy::BlockDepth { min_depth: 0 },
        }
    }

    pub fn needs_tip(&self) -> bool {
        matches!(self, ConfirmationPolicy::BlockDepth { min_depth } if *min_depth > 0)
    }

    pub fn is_confirmed(&self, event: &Event, ctx: &ConfirmationContext) -> bool {
        match self {
            ConfirmationPolicy::Immediate => true,
            ConfirmationPolicy::Corroborated { min_age } => {
                let Ok(time) = parse_time(&event.time) else {
                    return false;
                };
                let Ok(min_age) = chrono::Duration::from_std(*min_age) else {
                    return false;
                };
                ctx.now - time >= min_age
            }
            ConfirmationPolicy::BlockDepth { min_depth } => {
                if *min_depth == 0 {
                    return true;
                }
                match (&event.blockchain, ctx.tip_height) {
                    (Some(anchor), Some(tip)) if tip >= anchor.height => {
                        tip - anchor.height >= *min_depth - 1
                    }
                    _ => false,
                }
            }
        }
    }
}

/// Registries this node accepts new DIDs on.
///
/// A registry whose anchoring queue overflows is suspended until a mediator
/// drains it again.
pub struct RegistryCatalog {
    configured: Vec<String>,
    supported: RwLock<Vec<String>>,
}

impl RegistryCatalog {
    pub fn new(configured: Vec<String>) -> Self {
        Self {
            supported: RwLock::new(configured.clone()),
            configured,
        }
    }

    pub fn list(&self) -> Vec<String> {
        self.supported.read().clone()
    }

    pub fn is_supported(&self, registry: &str) -> bool {
        self.supported.read().iter().any(|r| r == registry)
    }

    /// Returns true if the registry was supported before the call.
    pub fn suspend(&self, registry: &str) -> bool {
        let mut supported = self.supported.write();
        let before = supported.len();
        supported.retain(|r| r != registry);
        supported.len() != before
    }

    /// Re-enable a configured registry. Returns true if it was suspended.
    pub fn resume(&self, registry: &str) -> bool {
        if !self.configured.iter().any(|r| r == registry) {
            return false;
        }
        let mut supported = self.supported.write();
        if supported.iter().any(|r| r == registry) {
            return false;
        }
        supported.push(registry.to_string());
        true
    }

    pub fn reset(&self) {
        *self.supported.write() = self.configured.clone();
    }
}
