//! # Events and Anchors
//!
//! An [`Event`] is an operation as observed on one registry. The same logical
//! operation may exist as several events (one per registry that carried it);
//! they share `operation.signature.value`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::Operation;
use crate::errors::TypeError;

/// Position of an event inside a time bucket.
///
/// Anchored registries use `[height, index, opidx]`; gossip uses `[ms, i]`;
/// the local registry uses `[0]`. Compared lexicographically, so `5` and
/// `[5]` are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ordinal {
    Single(u64),
    Sequence(Vec<u64>),
}

impl Ordinal {
    pub fn as_slice(&self) -> &[u64] {
        match self {
            Ordinal::Single(value) => std::slice::from_ref(value),
            Ordinal::Sequence(values) => values,
        }
    }
}

impl Default for Ordinal {
    fn default() -> Self {
        Ordinal::Sequence(vec![0])
    }
}

impl From<u64> for Ordinal {
    fn from(value: u64) -> Self {
        Ordinal::Single(value)
    }
}

impl From<Vec<u64>> for Ordinal {
    fn from(values: Vec<u64>) -> Self {
        Ordinal::Sequence(values)
    }
}

impl PartialEq for Ordinal {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Ordinal {}

impl Hash for Ordinal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl PartialOrd for Ordinal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ordinal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

/// Where an anchored registry placed an operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainAnchor {
    pub height: u64,
    #[serde(default)]
    pub index: u64,
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub batch: String,
    #[serde(default)]
    pub opidx: u64,
}

/// One operation as carried by one registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub registry: String,
    pub time: String,
    #[serde(default)]
    pub ordinal: Ordinal,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    /// CID of `operation`, when the carrier supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain: Option<BlockchainAnchor>,
}

impl Event {
    pub fn new(registry: impl Into<String>, time: impl Into<String>, operation: Operation) -> Self {
        Self {
            registry: registry.into(),
            time: time.into(),
            ordinal: Ordinal::default(),
            operation,
            did: None,
            opid: None,
            blockchain: None,
        }
    }

    pub fn with_did(mut self, did: impl Into<String>) -> Self {
        self.did = Some(did.into());
        self
    }

    pub fn with_ordinal(mut self, ordinal: impl Into<Ordinal>) -> Self {
        self.ordinal = ordinal.into();
        self
    }

    pub fn signature_value(&self) -> Option<&str> {
        self.operation.signature_value()
    }
}

/// An anchor point recorded for a block-anchored registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub hash: String,
    pub height: u64,
    /// Unix seconds.
    pub time: i64,
}

/// Lookup key for a recorded block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockId {
    Height(u64),
    Hash(String),
}

impl FromStr for BlockId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TypeError::InvalidBlockId(s.to_string()));
        }
        Ok(match trimmed.parse::<u64>() {
            Ok(height) => BlockId::Height(height),
            Err(_) => BlockId::Hash(trimmed.to_string()),
        })
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Height(h) => write!(f, "{h}"),
            BlockId::Hash(h) => write!(f, "{h}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ordinal_compares_as_sequence() {
        assert_eq!(Ordinal::Single(5), Ordinal::Sequence(vec![5]));
        assert!(Ordinal::Sequence(vec![5, 1]) > Ordinal::Single(5));
        assert!(Ordinal::Sequence(vec![4, 9, 9]) < Ordinal::Sequence(vec![5, 0]));
    }

    #[test]
    fn test_ordinal_deserializes_both_forms() {
        let single: Ordinal = serde_json::from_value(json!(7)).unwrap();
        let seq: Ordinal = serde_json::from_value(json!([7, 2])).unwrap();
        assert_eq!(single.as_slice(), &[7]);
        assert_eq!(seq.as_slice(), &[7, 2]);
    }

    #[test]
    fn test_event_defaults_ordinal() {
        let event: Event = serde_json::from_value(json!({
            "registry": "hyperswarm",
            "time": "2024-01-01T00:00:00Z",
            "operation": {
                "type": "delete",
                "did": "did:test:z1",
                "previd": "z0",
                "signature": { "signed": "2024-01-01T00:00:00Z", "value": "ff" }
            }
        }))
        .unwrap();
        assert_eq!(event.ordinal, Ordinal::default());
        assert_eq!(event.signature_value(), Some("ff"));
    }

    #[test]
    fn test_block_id_parse() {
        assert_eq!("42".parse::<BlockId>().unwrap(), BlockId::Height(42));
        assert_eq!(
            "00ab".parse::<BlockId>().unwrap(),
            BlockId::Hash("00ab".to_string())
        );
        assert!("  ".parse::<BlockId>().is_err());
    }
}
