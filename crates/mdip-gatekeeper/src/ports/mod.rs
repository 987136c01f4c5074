//! Hexagonal ports.

pub mod inbound;
pub mod outbound;

pub use inbound::{GatekeeperApi, ValidatedOperation};
pub use outbound::{ContentStore, EventStore, SystemTimeSource, TimeSource};
