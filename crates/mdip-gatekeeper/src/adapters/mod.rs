//! Storage adapters.
//!
//! | Adapter | Backend | Use |
//! |---------|---------|-----|
//! | [`InMemoryEventStore`] | `BTreeMap`s | tests, ephemeral nodes |
//! | [`JsonFileEventStore`] | one JSON document | small deployments |
//! | `RocksDbEventStore` | RocksDB (`rocksdb` feature) | production |
//! | [`InMemoryContentStore`] | `HashMap` | blob passthrough |

pub mod content;
pub mod json_file;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

pub use content::InMemoryContentStore;
pub use json_file::JsonFileEventStore;
pub use memory::InMemoryEventStore;
#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::RocksDbEventStore;
