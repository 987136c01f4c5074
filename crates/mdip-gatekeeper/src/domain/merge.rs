//! Reconciliation rules, free of storage.
//!
//! ```text
//! same signature.value already held?
//!   ├── held copy is native         → keep (duplicate)
//!   ├── incoming copy is native     → replace placeholder
//!   └── neither                     → keep (duplicate)
//! otherwise place by previd:
//!   ├── previd = head               → append
//!   ├── previd earlier in chain     → reorg if the native copy outranks what follows, else conflict
//!   └── previd unknown              → defer
//! ```

use shared_types::Event;

use crate::domain::ordering::OrderedHistory;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateDecision {
    KeepExisting,
    ReplaceWithNative,
}

/// Native-registry precedence between two copies of one operation.
pub fn resolve_duplicate(existing_registry: &str, incoming_registry: &str, native: &str) -> DuplicateDecision {
    if existing_registry == native {
        DuplicateDecision::KeepExisting
    } else if incoming_registry == native {
        DuplicateDecision::ReplaceWithNative
    } else {
        DuplicateDecision::KeepExisting
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Append,
    /// Drop everything after `keep` entries and append.
    Reorg { keep: usize },
    Conflict,
    Defer,
}

/// Where a new (non-duplicate) operation goes in an existing history.
pub fn place_event(history: &OrderedHistory, incoming: &Event) -> Placement {
    let Some(head) = history.head() else {
        return Placement::Defer;
    };
    let previd = match incoming.operation.previd() {
        Some(previd) => previd,
        None => return Placement::Append,
    };
    if previd == head.opid {
        return Placement::Append;
    }
    let Some(idx) = history.position_of(previd) else {
        return Placement::Defer;
    };

    let Some(follower) = history.entries.get(idx + 1).map(|entry| &entry.event) else {
        return Placement::Append;
    };
    let native = history.native.as_str();
    let outranks = incoming.registry == native
        && (follower.registry != native || incoming.ordinal < follower.ordinal);

    if outranks {
        Placement::Reorg { keep: idx + 1 }
    } else {
        Placement::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ordering::HistoryEntry;
    use serde_json::json;
    use shared_types::Operation;

    fn update(previd: &str, value: &str) -> Operation {
        serde_json::from_value(json!({
            "type": "update",
            "did": "did:test:z1",
            "doc": {},
            "previd": previd,
            "signature": { "signed": "2024-01-01T00:00:00Z", "value": value }
        }))
        .unwrap()
    }

    fn create() -> Operation {
        serde_json::from_value(json!({
            "type": "create",
            "created": "2024-01-01T00:00:00Z",
            "mdip": { "version": 1, "type": "agent", "registry": "TBTC" },
            "signature": { "signed": "2024-01-01T00:00:00Z", "value": "c0" }
        }))
        .unwrap()
    }

    fn history(follower_registry: &str, follower_ordinal: Vec<u64>) -> OrderedHistory {
        OrderedHistory {
            native: "TBTC".into(),
            entries: vec![
                HistoryEntry {
                    event: Event::new("TBTC", "2024-01-01T00:00:00Z", create()),
                    opid: "c".into(),
                },
                HistoryEntry {
                    event: Event::new(follower_registry, "2024-01-01T00:00:01Z", update("c", "v1"))
                        .with_ordinal(follower_ordinal),
                    opid: "u1".into(),
                },
            ],
        }
    }

    #[test]
    fn test_duplicate_precedence() {
        use DuplicateDecision::*;
        assert_eq!(resolve_duplicate("TBTC", "hyperswarm", "TBTC"), KeepExisting);
        assert_eq!(resolve_duplicate("TBTC", "TBTC", "TBTC"), KeepExisting);
        assert_eq!(resolve_duplicate("hyperswarm", "TBTC", "TBTC"), ReplaceWithNative);
        assert_eq!(resolve_duplicate("local", "hyperswarm", "TBTC"), KeepExisting);
    }

    #[test]
    fn test_append_on_head() {
        let h = history("TBTC", vec![1]);
        let incoming = Event::new("hyperswarm", "2024-01-01T00:00:02Z", update("u1", "v2"));
        assert_eq!(place_event(&h, &incoming), Placement::Append);
    }

    #[test]
    fn test_unknown_previd_defers() {
        let h = history("TBTC", vec![1]);
        let incoming = Event::new("TBTC", "2024-01-01T00:00:02Z", update("zz", "v2"));
        assert_eq!(place_event(&h, &incoming), Placement::Defer);
    }

    #[test]
    fn test_native_branch_displaces_non_native() {
        let h = history("hyperswarm", vec![1]);
        let incoming = Event::new("TBTC", "2024-01-01T00:00:02Z", update("c", "v2"));
        assert_eq!(place_event(&h, &incoming), Placement::Reorg { keep: 1 });
    }

    #[test]
    fn test_native_branch_with_earlier_ordinal_wins() {
        let h = history("TBTC", vec![100, 5]);
        let earlier = Event::new("TBTC", "2024-01-01T00:00:02Z", update("c", "v2"))
            .with_ordinal(vec![100, 2]);
        let later = Event::new("TBTC", "2024-01-01T00:00:02Z", update("c", "v3"))
            .with_ordinal(vec![100, 9]);
        assert_eq!(place_event(&h, &earlier), Placement::Reorg { keep: 1 });
        assert_eq!(place_event(&h, &later), Placement::Conflict);
    }

    #[test]
    fn test_non_native_branch_conflicts() {
        let h = history("hyperswarm", vec![1]);
        let incoming = Event::new("hyperswarm", "2024-01-01T00:00:02Z", update("c", "v2"));
        assert_eq!(place_event(&h, &incoming), Placement::Conflict);
    }
}
