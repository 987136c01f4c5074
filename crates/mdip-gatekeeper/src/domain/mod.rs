//! Pure ledger logic: ordering, replay, reconciliation rules and the
//! registry model. Nothing in here touches storage.

pub mod locks;
pub mod merge;
pub mod ordering;
pub mod registry;
pub mod replay;
pub mod reports;

pub use locks::{BusyFlag, DidLocks};
pub use merge::{place_event, resolve_duplicate, DuplicateDecision, Placement};
pub use ordering::{compare_events, order_history, HistoryEntry, OrderedHistory};
pub use registry::{
    is_known_registry, registry_kind, ConfirmationContext, ConfirmationPolicy, RegistryCatalog,
    RegistryKind, HYPERSWARM, KNOWN_REGISTRIES, LOCAL,
};
pub use reports::{
    CheckDidsOptions, CheckDidsResult, DidList, DidTypeCounts, GetDidsOptions, ImportBatchResult,
    ImportStatus, MergeResult, ProcessEventsResult, ResolveOptions, VerifyDbResult,
};
