//! # Shared Types Crate
//!
//! MDIP entities shared by the ledger core, the crypto collaborator and the
//! node runtime.
//!
//! ## Clusters
//!
//! - **Operations**: [`Operation`] (`create` | `update` | `delete`), [`Signature`],
//!   [`MdipMetadata`], [`PublicJwk`]
//! - **Histories**: [`Event`], [`Ordinal`], [`BlockchainAnchor`]
//! - **Anchors**: [`BlockInfo`], [`BlockId`]
//! - **Resolved state**: [`MdipDocument`], [`DocumentMetadata`]
//!
//! ## Design Principles
//!
//! - **Tagged operations**: the operation union is a serde-tagged enum, never an
//!   open map. Fields the ledger does not model are kept in `extra` so a stored
//!   operation re-serializes byte-for-byte into the same canonical form.
//! - **Derived documents**: [`MdipDocument`] is only ever produced by replaying
//!   events; nothing here persists it.

pub mod document;
pub mod entities;
pub mod errors;
pub mod events;
pub mod time;

pub use document::*;
pub use entities::*;
pub use errors::*;
pub use events::*;
