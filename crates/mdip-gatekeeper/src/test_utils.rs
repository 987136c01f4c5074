//! Helpers for building signed operations in tests.
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for integration tests and downstream crates.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use shared_crypto::{hash_json, Secp256k1KeyPair};
use shared_types::time::iso_millis;
use shared_types::{
    CreateOperation, DeleteOperation, DidKind, Event, MdipMetadata, Operation, Signature,
    UpdateOperation, MDIP_VERSION,
};

use crate::adapters::InMemoryEventStore;
use crate::config::GatekeeperConfig;
use crate::service::Gatekeeper;

/// Gatekeeper over an in-memory store with the default config.
pub fn gatekeeper() -> Gatekeeper {
    gatekeeper_with(GatekeeperConfig::default())
}

pub fn gatekeeper_with(config: GatekeeperConfig) -> Gatekeeper {
    Gatekeeper::new(config, Arc::new(InMemoryEventStore::new())).unwrap()
}

/// A keypair that signs operations for the DIDs it creates.
///
/// Timestamps handed out by one agent strictly increase, so two creates from
/// the same agent never collide on the same DID.
pub struct TestAgent {
    keys: Secp256k1KeyPair,
    last: Mutex<DateTime<Utc>>,
}

impl Default for TestAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAgent {
    pub fn new() -> Self {
        Self {
            keys: Secp256k1KeyPair::generate(),
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    fn now(&self) -> String {
        let mut last = self.last.lock();
        let next = Utc::now().max(*last + Duration::milliseconds(1));
        *last = next;
        iso_millis(&next)
    }

    fn mdip(registry: &str, kind: DidKind) -> MdipMetadata {
        MdipMetadata {
            version: MDIP_VERSION,
            kind,
            registry: registry.to_string(),
            valid_until: None,
            prefix: None,
            extra: Map::new(),
        }
    }

    fn sign(&self, mut operation: Operation, signer: Option<String>) -> Operation {
        *operation.signature_mut() = None;
        let hash = hash_json(&operation).unwrap();
        let value = self.keys.sign_hash(&hash).unwrap();
        *operation.signature_mut() = Some(Signature {
            signer,
            signed: self.now(),
            hash: Some(hash),
            value,
        });
        operation
    }

    /// Re-sign after a test edits an operation, keeping the signer.
    pub fn resign(&self, operation: Operation) -> Operation {
        let signer = operation.signature().and_then(|s| s.signer.clone());
        self.sign(operation, signer)
    }

    pub fn create_agent(&self, registry: &str) -> Operation {
        let create = CreateOperation {
            created: self.now(),
            mdip: Self::mdip(registry, DidKind::Agent),
            public_jwk: Some(self.keys.public_jwk().unwrap()),
            controller: None,
            data: None,
            signature: None,
            extra: Map::new(),
        };
        self.sign(Operation::Create(create), None)
    }

    pub fn create_ephemeral_agent(&self, registry: &str, valid_until: DateTime<Utc>) -> Operation {
        let mut op = self.create_agent(registry);
        if let Operation::Create(create) = &mut op {
            create.mdip.valid_until = Some(iso_millis(&valid_until));
        }
        self.resign(op)
    }

    /// Asset controlled by `controller`, an agent DID this agent created.
    pub fn create_asset(&self, controller: &str, registry: &str, data: Value) -> Operation {
        let create = CreateOperation {
            created: self.now(),
            mdip: Self::mdip(registry, DidKind::Asset),
            public_jwk: None,
            controller: Some(controller.to_string()),
            data: Some(data),
            signature: None,
            extra: Map::new(),
        };
        self.sign(Operation::Create(create), Some(controller.to_string()))
    }

    pub fn update(&self, did: &str, previd: &str, doc: Value) -> Operation {
        let update = UpdateOperation {
            did: did.to_string(),
            doc,
            previd: Some(previd.to_string()),
            blockid: None,
            signature: None,
            extra: Map::new(),
        };
        self.sign(Operation::Update(update), Some(did.to_string()))
    }

    pub fn delete(&self, did: &str, previd: &str) -> Operation {
        let delete = DeleteOperation {
            did: did.to_string(),
            previd: Some(previd.to_string()),
            blockid: None,
            signature: None,
            extra: Map::new(),
        };
        self.sign(Operation::Delete(delete), Some(did.to_string()))
    }

    /// The event a registry would deliver for `operation`.
    pub fn native_copy(&self, did: &str, operation: Operation, registry: &str) -> Event {
        let time = operation
            .signature()
            .map(|s| s.signed.clone())
            .unwrap_or_else(|| self.now());
        Event::new(registry, time, operation).with_did(did)
    }
}
