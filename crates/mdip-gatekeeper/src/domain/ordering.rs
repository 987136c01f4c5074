//! Total order over a DID's events.
//!
//! `(time, ordinal, native registry first, registry name)` decides the order
//! in which candidates are considered; the `previd` hash chain then decides
//! which of them make up the history. A native copy that replaced a
//! placeholder can carry a later time than operations built on top of it, so
//! time order alone is not chain order.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use shared_types::time::parse_time;
use shared_types::Event;

/// An event together with the CID of its operation.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub event: Event,
    pub opid: String,
}

/// Chain-ordered history of one DID, starting with its create.
#[derive(Clone, Debug)]
pub struct OrderedHistory {
    pub native: String,
    pub entries: Vec<HistoryEntry>,
}

impl OrderedHistory {
    pub fn head(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn position_of(&self, opid: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.opid == opid)
    }

    pub fn into_events(self) -> Vec<Event> {
        self.entries.into_iter().map(|entry| entry.event).collect()
    }
}

fn time_key(event: &Event) -> (bool, Option<DateTime<Utc>>) {
    match parse_time(&event.time) {
        Ok(time) => (false, Some(time)),
        Err(_) => (true, None),
    }
}

/// The one comparison used everywhere events are ordered.
pub fn compare_events(a: &Event, b: &Event, native: &str) -> Ordering {
    let rank = |e: &Event| u8::from(e.registry != native);
    time_key(a)
        .cmp(&time_key(b))
        .then_with(|| a.ordinal.cmp(&b.ordinal))
        .then_with(|| rank(a).cmp(&rank(b)))
        .then_with(|| a.registry.cmp(&b.registry))
}

/// Order a DID's stored events into its history.
///
/// Returns `None` if there is no create. Events that do not link into the
/// chain are left out.
pub fn order_history(mut entries: Vec<HistoryEntry>) -> Option<OrderedHistory> {
    let native = entries
        .iter()
        .find_map(|entry| entry.event.operation.mdip())
        .map(|mdip| mdip.registry.clone())?;

    entries.sort_by(|a, b| compare_events(&a.event, &b.event, &native));

    let mut pool: Vec<Option<HistoryEntry>> = entries.into_iter().map(Some).collect();
    let create_idx = pool
        .iter()
        .position(|slot| matches!(slot, Some(entry) if entry.event.operation.is_create()))?;
    let create = pool[create_idx].take()?;

    let mut current = create.opid.clone();
    let mut chain = vec![create];

    loop {
        let next = pool.iter().position(|slot| match slot {
            Some(entry) if !entry.event.operation.is_create() => {
                match entry.event.operation.previd() {
                    Some(previd) => previd == current,
                    None => true,
                }
            }
            _ => false,
        });
        let Some(idx) = next else { break };
        let Some(entry) = pool[idx].take() else { break };
        current = entry.opid.clone();
        chain.push(entry);
    }

    Some(OrderedHistory {
        native,
        entries: chain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{Operation, Ordinal};

    fn create(registry: &str) -> Operation {
        serde_json::from_value(json!({
            "type": "create",
            "created": "2024-01-01T00:00:00Z",
            "mdip": { "version": 1, "type": "agent", "registry": registry },
            "publicJwk": { "kty": "EC", "crv": "secp256k1", "x": "x", "y": "y" },
            "signature": { "signed": "2024-01-01T00:00:00Z", "value": "c0" }
        }))
        .unwrap()
    }

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

    fn entry(registry: &str, time: &str, op: Operation, opid: &str) -> HistoryEntry {
        HistoryEntry {
            event: Event::new(registry, time, op),
            opid: opid.to_string(),
        }
    }

    #[test]
    fn test_time_then_ordinal() {
        let a = Event::new("TBTC", "2024-01-01T00:00:00Z", update("p", "a")).with_ordinal(vec![5, 1]);
        let b = Event::new("TBTC", "2024-01-01T00:00:00Z", update("p", "b")).with_ordinal(vec![5, 2]);
        let c = Event::new("TBTC", "2023-12-31T00:00:00Z", update("p", "c")).with_ordinal(vec![9]);
        assert_eq!(compare_events(&a, &b, "TBTC"), Ordering::Less);
        assert_eq!(compare_events(&c, &a, "TBTC"), Ordering::Less);
    }

    #[test]
    fn test_native_registry_wins_ties() {
        let native = Event::new("TBTC", "2024-01-01T00:00:00Z", update("p", "a"));
        let other = Event::new("hyperswarm", "2024-01-01T00:00:00Z", update("p", "a"));
        assert_eq!(compare_events(&native, &other, "TBTC"), Ordering::Less);
        assert_eq!(compare_events(&other, &native, "TBTC"), Ordering::Greater);
    }

    #[test]
    fn test_unparseable_time_sorts_last() {
        let good = Event::new("local", "2030-01-01T00:00:00Z", update("p", "a"));
        let bad = Event::new("local", "soon", update("p", "b"));
        assert_eq!(compare_events(&good, &bad, "local"), Ordering::Less);
    }

    #[test]
    fn test_chain_order_beats_time_order() {
        // u1 was replaced by a native copy stamped after u2 was written
        let entries = vec![
            entry("hyperswarm", "2024-01-01T00:00:05Z", update("c", "v1"), "u1"),
            entry("local", "2024-01-01T00:00:00Z", create("hyperswarm"), "c"),
            entry("local", "2024-01-01T00:00:02Z", update("u1", "v2"), "u2"),
        ];
        let history = order_history(entries).unwrap();
        let opids: Vec<_> = history.entries.iter().map(|e| e.opid.as_str()).collect();
        assert_eq!(opids, vec!["c", "u1", "u2"]);
        assert_eq!(history.native, "hyperswarm");
        assert_eq!(history.head().unwrap().opid, "u2");
    }

    #[test]
    fn test_orphans_are_dropped() {
        let entries = vec![
            entry("local", "2024-01-01T00:00:00Z", create("local"), "c"),
            entry("local", "2024-01-01T00:00:01Z", update("nowhere", "v1"), "u1"),
        ];
        let history = order_history(entries).unwrap();
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.position_of("c"), Some(0));
        assert_eq!(history.position_of("u1"), None);
    }

    #[test]
    fn test_no_create_means_no_history() {
        let entries = vec![entry("local", "2024-01-01T00:00:01Z", update("c", "v1"), "u1")];
        assert!(order_history(entries).is_none());
    }

    #[test]
    fn test_ordinal_ties_choose_first_child() {
        let mut first = entry("TBTC", "2024-01-01T00:00:01Z", update("c", "v1"), "u1");
        first.event.ordinal = Ordinal::Sequence(vec![10, 1]);
        let mut second = entry("TBTC", "2024-01-01T00:00:01Z", update("c", "v2"), "u2");
        second.event.ordinal = Ordinal::Sequence(vec![10, 0]);
        let entries = vec![
            entry("TBTC", "2024-01-01T00:00:00Z", create("TBTC"), "c"),
            first,
            second,
        ];
        let history = order_history(entries).unwrap();
        assert_eq!(history.entries.len(), 2);
        assert_eq!(history.head().unwrap().opid, "u2");
    }
}
