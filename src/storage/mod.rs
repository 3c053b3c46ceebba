//! Storage Module
//!
//! Durable two-tier storage used to survive process restarts.

mod backend;
mod file;
mod memory;
mod store;

pub use backend::PersistenceBackend;
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use store::{EntryRecord, PersistentStore, NS_BEHAVIOR, NS_ENTRIES, NS_STATS, SCHEMA_VERSION};
