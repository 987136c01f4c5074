//! Result and option types for the public operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::MdipDocument;

/// Options for resolving a DID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Stop before the first event later than this time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_time: Option<String>,
    /// Stop once this version is reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_version: Option<u64>,
    /// Stop at the first unconfirmed event.
    #[serde(default)]
    pub confirmed_only: bool,
    /// Re-verify every signature while folding.
    #[serde(default)]
    pub verify: bool,
}

impl ResolveOptions {
    pub fn confirmed() -> Self {
        Self {
            confirmed_only: true,
            ..Default::default()
        }
    }

    pub fn verified() -> Self {
        Self {
            verify: true,
            ..Default::default()
        }
    }

    pub fn at_time(mut self, time: impl Into<String>) -> Self {
        self.at_time = Some(time.into());
        self
    }

    pub fn at_version(mut self, version: u64) -> Self {
        self.at_version = Some(version);
        self
    }
}

/// Outcome of merging one event into a history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImportStatus {
    /// New operation appended.
    Added,
    /// Native copy replaced a placeholder from another registry.
    Replaced,
    /// Duplicate of an operation already held.
    Merged,
    Rejected,
    /// Refers to history not yet known; retried later.
    Deferred,
}

impl ImportStatus {
    pub fn accepted(&self) -> bool {
        matches!(self, ImportStatus::Added | ImportStatus::Replaced)
    }

    pub fn progressed(&self) -> bool {
        !matches!(self, ImportStatus::Rejected | ImportStatus::Deferred)
    }
}

/// `mergeEvent` result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    pub accepted: bool,
    pub replaced: bool,
}

impl From<ImportStatus> for MergeResult {
    fn from(status: ImportStatus) -> Self {
        Self {
            accepted: status.accepted(),
            replaced: status == ImportStatus::Replaced,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatchResult {
    /// Newly accepted or waiting for missing history.
    pub queued: usize,
    /// Already known.
    pub processed: usize,
    pub rejected: usize,
    /// Events still waiting in the import queue.
    pub total: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEventsResult {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub busy: bool,
    pub added: usize,
    pub merged: usize,
    pub rejected: usize,
    pub pending: usize,
}

impl ProcessEventsResult {
    pub fn busy() -> Self {
        Self {
            busy: true,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyDbResult {
    pub total: usize,
    pub verified: usize,
    pub expired: usize,
    pub invalid: usize,
    /// `expired + invalid`: histories deleted by this sweep.
    pub removed: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidTypeCounts {
    pub agents: usize,
    pub assets: usize,
    pub confirmed: usize,
    pub unconfirmed: usize,
    pub ephemeral: usize,
    pub invalid: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDidsResult {
    pub total: usize,
    pub by_type: DidTypeCounts,
    pub by_registry: BTreeMap<String, usize>,
    pub by_version: BTreeMap<u64, usize>,
    pub events_queue: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDidsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dids: Option<Vec<String>>,
    /// Log every DID as it is checked.
    #[serde(default)]
    pub chatty: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDidsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_before: Option<String>,
    #[serde(default)]
    pub confirm: bool,
    #[serde(default)]
    pub verify: bool,
    /// Return documents instead of DIDs.
    #[serde(default)]
    pub resolve: bool,
}

/// `getDIDs` result: bare DIDs, or documents when `resolve` was requested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DidList {
    Dids(Vec<String>),
    Documents(Vec<MdipDocument>),
}

impl DidList {
    pub fn len(&self) -> usize {
        match self {
            DidList::Dids(dids) => dids.len(),
            DidList::Documents(docs) => docs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
