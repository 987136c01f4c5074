//! Driving Ports (API - Inbound)
//!
//! Everything a transport layer (HTTP, CLI, mediators) may call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{BlockId, BlockInfo, Event, MdipDocument, Operation};

use crate::domain::{
    CheckDidsOptions, CheckDidsResult, DidList, GetDidsOptions, ImportBatchResult, MergeResult,
    ProcessEventsResult, ResolveOptions, VerifyDbResult,
};
use crate::error::GatekeeperResult;

/// A operation that passed validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedOperation {
    pub did: String,
    /// The target DID's native registry.
    pub registry: String,
    /// CID of the operation.
    pub opid: String,
}

#[async_trait]
pub trait GatekeeperApi: Send + Sync {
    // --- Operation Validator ---

    /// Check an operation without admitting it.
    async fn validate(&self, operation: &Operation) -> GatekeeperResult<ValidatedOperation>;

    // --- Lifecycle ---

    /// Admit a create. Returns the DID; idempotent for an existing DID.
    async fn create_did(&self, operation: Operation) -> GatekeeperResult<String>;

    async fn update_did(&self, operation: Operation) -> GatekeeperResult<()>;

    async fn delete_did(&self, operation: Operation) -> GatekeeperResult<()>;

    // --- Resolver ---

    async fn resolve_did(&self, did: &str, options: ResolveOptions) -> GatekeeperResult<MdipDocument>;

    // --- Reconciliation Merger ---

    async fn merge_event(&self, did: &str, event: Event) -> GatekeeperResult<MergeResult>;

    // --- Registry Queue Manager ---

    async fn enqueue(&self, registry: &str, event: Event) -> GatekeeperResult<usize>;

    /// Pending events for a registry. Re-enables a suspended registry.
    async fn get_queue(&self, registry: &str) -> GatekeeperResult<Vec<Event>>;

    async fn clear_queue(&self, registry: &str, events: &[Event]) -> GatekeeperResult<()>;

    async fn export_batch(&self, dids: Option<Vec<String>>) -> GatekeeperResult<Vec<Event>>;

    async fn import_batch(&self, events: Vec<Event>) -> GatekeeperResult<ImportBatchResult>;

    async fn process_events(&self) -> GatekeeperResult<ProcessEventsResult>;

    // --- Verification Scanner ---

    async fn verify_db(&self, chatty: bool) -> GatekeeperResult<VerifyDbResult>;

    async fn check_dids(&self, options: CheckDidsOptions) -> GatekeeperResult<CheckDidsResult>;

    // --- Block/Anchor Tracker ---

    async fn add_block(&self, registry: &str, block: BlockInfo) -> GatekeeperResult<()>;

    async fn get_block(&self, registry: &str, id: Option<BlockId>) -> GatekeeperResult<Option<BlockInfo>>;

    // --- Listing and administration ---

    async fn get_dids(&self, options: GetDidsOptions) -> GatekeeperResult<DidList>;

    async fn export_did(&self, did: &str) -> GatekeeperResult<Vec<Event>>;

    async fn export_dids(&self, dids: Option<Vec<String>>) -> GatekeeperResult<Vec<Vec<Event>>>;

    async fn import_dids(&self, histories: Vec<Vec<Event>>) -> GatekeeperResult<ImportBatchResult>;

    /// Delete histories outright. Returns how many existed.
    async fn remove_dids(&self, dids: &[String]) -> GatekeeperResult<usize>;

    async fn list_registries(&self) -> GatekeeperResult<Vec<String>>;

    /// Debug only.
    async fn reset_db(&self) -> GatekeeperResult<()>;

    // --- Content store passthrough ---

    async fn add_text(&self, text: &str) -> GatekeeperResult<String>;

    async fn get_text(&self, cid: &str) -> GatekeeperResult<Option<String>>;

    async fn add_data(&self, data: Vec<u8>) -> GatekeeperResult<String>;

    async fn get_data(&self, cid: &str) -> GatekeeperResult<Option<Vec<u8>>>;

    async fn add_json(&self, value: &Value) -> GatekeeperResult<String>;

    async fn get_json(&self, cid: &str) -> GatekeeperResult<Option<Value>>;
}
