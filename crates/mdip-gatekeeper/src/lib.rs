//! # MDIP Gatekeeper
//!
//! Append-only ledger of signed DID operations. Every DID's document is
//! derived on demand by replaying its event history; the same operation may
//! arrive from several registries and is reconciled into one chain.
//!
//! ## Purpose
//!
//! - admit locally submitted `create` / `update` / `delete` operations
//! - resolve a DID as of a version, a time, or confirmed-only
//! - import events gossiped or anchored by other registries and merge them
//! - queue locally admitted events for mediators to anchor elsewhere
//! - periodically re-verify everything and drop invalid or expired DIDs
//!
//! ## Ledger Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | A DID is the CID of its create operation | `service/validator.rs` - `generate_did()` |
//! | Stored histories start with exactly one create | `service/merger.rs` - `merge_locked()` |
//! | Each later event names the current head as `previd` | `service/validator.rs` - `check_append()` |
//! | Nothing follows a delete | `domain/replay.rs` + `check_append()` |
//! | Native registry copies win over relayed copies | `domain/merge.rs` - `resolve_duplicate()` |
//! | Writes to one DID are serialized | `domain/locks.rs` - `DidLocks` |
//!
//! ## Registries
//!
//! ```text
//!   local ─────────── this node only, never queued
//!   hyperswarm ────── gossip relay, every non-local event is queued here
//!   TBTC, TFTC, ... ─ block-anchored, events carry a blockchain record
//! ```
//!
//! A DID's native registry (`mdip.registry` of its create) is fixed. Copies of
//! an operation from other registries are tolerated but yield to the native
//! copy once it arrives.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - in-memory, JSON file and RocksDB stores            │
//! │  background.rs - maintenance loops                              │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - GatekeeperApi trait                        │
//! │  ports/outbound.rs - EventStore, ContentStore, TimeSource       │
//! │  service/          - Gatekeeper, one file per component         │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/ordering.rs - event order and chain walk                │
//! │  domain/replay.rs   - document folding                          │
//! │  domain/merge.rs    - duplicate and placement rules             │
//! │  domain/registry.rs - registry kinds, confirmation policies     │
//! │  domain/locks.rs    - per-DID locks, busy flags                 │
//! │  domain/reports.rs  - options and result records                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let store = Arc::new(InMemoryEventStore::new());
//! let gatekeeper = Gatekeeper::new(GatekeeperConfig::default(), store)?;
//! let did = gatekeeper.create_did(operation).await?;
//! let doc = gatekeeper.resolve_did(&did, ResolveOptions::default()).await?;
//! ```

pub mod adapters;
pub mod background;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::{InMemoryContentStore, InMemoryEventStore, JsonFileEventStore};
#[cfg(feature = "rocksdb")]
pub use adapters::RocksDbEventStore;
pub use background::spawn_maintenance;
pub use config::{ConfigError, GatekeeperConfig, MaintenanceConfig};
pub use domain::{
    CheckDidsOptions, CheckDidsResult, ConfirmationPolicy, DidList, GetDidsOptions,
    ImportBatchResult, ImportStatus, MergeResult, ProcessEventsResult, RegistryKind,
    ResolveOptions, VerifyDbResult,
};
pub use error::{GatekeeperError, GatekeeperResult, StorageError, StorageResult};
pub use ports::{ContentStore, EventStore, GatekeeperApi, SystemTimeSource, TimeSource, ValidatedOperation};
pub use service::{is_valid_did, Gatekeeper};
