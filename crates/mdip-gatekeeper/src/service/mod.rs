//! Gatekeeper Service - the ledger orchestrator.
//!
//! One [`Gatekeeper`] owns the store handles plus all mutable coordination
//! state (per-DID locks, sweep flags, the import queue). Each component lives
//! in its own file as an `impl Gatekeeper` block:
//!
//! | File | Component |
//! |------|-----------|
//! | `validator.rs` | Operation Validator |
//! | `resolver.rs` | Resolver (replay engine) |
//! | `lifecycle.rs` | create / update / delete |
//! | `merger.rs` | Reconciliation Merger |
//! | `queue.rs` | Registry Queue Manager |
//! | `scanner.rs` | Verification Scanner |
//! | `blocks.rs` | Block/Anchor Tracker |
//! | `admin.rs` | listing, export/import, content passthrough |

mod admin;
mod blocks;
mod lifecycle;
mod merger;
mod queue;
mod resolver;
mod scanner;
mod validator;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shared_crypto::generate_cid;
use shared_types::{BlockId, BlockInfo, Event, MdipDocument, Operation};
use tracing::info;

use crate::config::GatekeeperConfig;
use crate::domain::{
    BusyFlag, CheckDidsOptions, CheckDidsResult, DidList, DidLocks, GetDidsOptions,
    ImportBatchResult, MergeResult, ProcessEventsResult, RegistryCatalog, ResolveOptions,
    VerifyDbResult,
};
use crate::error::{GatekeeperError, GatekeeperResult};
use crate::ports::inbound::{GatekeeperApi, ValidatedOperation};
use crate::ports::outbound::{ContentStore, EventStore, SystemTimeSource, TimeSource};

pub use validator::is_valid_did;

/// The MDIP operation ledger.
pub struct Gatekeeper {
    config: GatekeeperConfig,
    store: Arc<dyn EventStore>,
    content: Option<Arc<dyn ContentStore>>,
    clock: Arc<dyn TimeSource>,
    registries: RegistryCatalog,
    locks: DidLocks,
    /// Imported events waiting for history they depend on.
    pending: Mutex<Vec<Event>>,
    /// `registry/hash` keys of events already taken by `import_batch`. Each
    /// `verify_db` sweep starts it afresh.
    seen: Mutex<HashSet<String>>,
    /// Non-ephemeral DIDs that passed a full verification since their last write.
    verified: Mutex<HashSet<String>>,
    processing: BusyFlag,
    verifying: BusyFlag,
    block_writer: tokio::sync::Mutex<()>,
}

impl Gatekeeper {
    pub fn new(config: GatekeeperConfig, store: Arc<dyn EventStore>) -> GatekeeperResult<Self> {
        config
            .validate()
            .map_err(|e| GatekeeperError::InvalidParameter(e.to_string()))?;

        info!(
            "[gatekeeper] prefix {} registries {:?} max op {} bytes",
            config.did_prefix, config.registries, config.max_op_bytes
        );

        Ok(Self {
            registries: RegistryCatalog::new(config.registries.clone()),
            config,
            store,
            content: None,
            clock: Arc::new(SystemTimeSource),
            locks: DidLocks::new(),
            pending: Mutex::new(Vec::new()),
            seen: Mutex::new(HashSet::new()),
            verified: Mutex::new(HashSet::new()),
            processing: BusyFlag::new(),
            verifying: BusyFlag::new(),
            block_writer: tokio::sync::Mutex::new(()),
        })
    }

    pub fn with_content_store(mut self, content: Arc<dyn ContentStore>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }

    /// Events waiting in the import queue.
    pub fn pending_events(&self) -> usize {
        self.pending.lock().len()
    }

    fn forget_verified(&self, did: &str) {
        self.verified.lock().remove(did);
    }
}

/// CID of an operation; also the suffix of a create's DID.
pub(crate) fn opid_of(operation: &Operation) -> GatekeeperResult<String> {
    Ok(generate_cid(operation)?)
}

#[async_trait]
impl GatekeeperApi for Gatekeeper {
    async fn validate(&self, operation: &Operation) -> GatekeeperResult<ValidatedOperation> {
        Gatekeeper::validate(self, operation).await
    }

    async fn create_did(&self, operation: Operation) -> GatekeeperResult<String> {
        Gatekeeper::create_did(self, operation).await
    }

    async fn update_did(&self, operation: Operation) -> GatekeeperResult<()> {
        Gatekeeper::update_did(self, operation).await
    }

    async fn delete_did(&self, operation: Operation) -> GatekeeperResult<()> {
        Gatekeeper::delete_did(self, operation).await
    }

    async fn resolve_did(&self, did: &str, options: ResolveOptions) -> GatekeeperResult<MdipDocument> {
        Gatekeeper::resolve_did(self, did, options).await
    }

    async fn merge_event(&self, did: &str, event: Event) -> GatekeeperResult<MergeResult> {
        Gatekeeper::merge_event(self, did, event).await
    }

    async fn enqueue(&self, registry: &str, event: Event) -> GatekeeperResult<usize> {
        Gatekeeper::enqueue(self, registry, event).await
    }

    async fn get_queue(&self, registry: &str) -> GatekeeperResult<Vec<Event>> {
        Gatekeeper::get_queue(self, registry).await
    }

    async fn clear_queue(&self, registry: &str, events: &[Event]) -> GatekeeperResult<()> {
        Gatekeeper::clear_queue(self, registry, events).await
    }

    async fn export_batch(&self, dids: Option<Vec<String>>) -> GatekeeperResult<Vec<Event>> {
        Gatekeeper::export_batch(self, dids).await
    }

    async fn import_batch(&self, events: Vec<Event>) -> GatekeeperResult<ImportBatchResult> {
        Gatekeeper::import_batch(self, events).await
    }

    async fn process_events(&self) -> GatekeeperResult<ProcessEventsResult> {
        Gatekeeper::process_events(self).await
    }

    async fn verify_db(&self, chatty: bool) -> GatekeeperResult<VerifyDbResult> {
        Gatekeeper::verify_db(self, chatty).await
    }

    async fn check_dids(&self, options: CheckDidsOptions) -> GatekeeperResult<CheckDidsResult> {
        Gatekeeper::check_dids(self, options).await
    }

    async fn add_block(&self, registry: &str, block: BlockInfo) -> GatekeeperResult<()> {
        Gatekeeper::add_block(self, registry, block).await
    }

    async fn get_block(&self, registry: &str, id: Option<BlockId>) -> GatekeeperResult<Option<BlockInfo>> {
        Gatekeeper::get_block(self, registry, id).await
    }

    async fn get_dids(&self, options: GetDidsOptions) -> GatekeeperResult<DidList> {
        Gatekeeper::get_dids(self, options).await
    }

    async fn export_did(&self, did: &str) -> GatekeeperResult<Vec<Event>> {
        Gatekeeper::export_did(self, did).await
    }

    async fn export_dids(&self, dids: Option<Vec<String>>) -> GatekeeperResult<Vec<Vec<Event>>> {
        Gatekeeper::export_dids(self, dids).await
    }

    async fn import_dids(&self, histories: Vec<Vec<Event>>) -> GatekeeperResult<ImportBatchResult> {
        Gatekeeper::import_dids(self, histories).await
    }

    async fn remove_dids(&self, dids: &[String]) -> GatekeeperResult<usize> {
        Gatekeeper::remove_dids(self, dids).await
    }

    async fn list_registries(&self) -> GatekeeperResult<Vec<String>> {
        Ok(Gatekeeper::list_registries(self))
    }

    async fn reset_db(&self) -> GatekeeperResult<()> {
        Gatekeeper::reset_db(self).await
    }

    async fn add_text(&self, text: &str) -> GatekeeperResult<String> {
        Gatekeeper::add_text(self, text).await
    }

    async fn get_text(&self, cid: &str) -> GatekeeperResult<Option<String>> {
        Gatekeeper::get_text(self, cid).await
    }

    async fn add_data(&self, data: Vec<u8>) -> GatekeeperResult<String> {
        Gatekeeper::add_data(self, data).await
    }

    async fn get_data(&self, cid: &str) -> GatekeeperResult<Option<Vec<u8>>> {
        Gatekeeper::get_data(self, cid).await
    }

    async fn add_json(&self, value: &Value) -> GatekeeperResult<String> {
        Gatekeeper::add_json(self, value).await
    }

    async fn get_json(&self, cid: &str) -> GatekeeperResult<Option<Value>> {
        Gatekeeper::get_json(self, cid).await
    }
}
