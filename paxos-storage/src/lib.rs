//! Reference [`paxos_core::storage::Storage`] implementations: an always-on
//! `MemoryStorage` and, behind `persistent_storage`, a RocksDB-backed engine.

mod memory;

#[cfg(feature = "persistent_storage")]
mod persistent;

pub use memory::MemoryStorage;

#[cfg(feature = "persistent_storage")]
pub use persistent::RocksDbStorage;
