//! ============================================================================
//! Store Module - Key-value backends behind one async contract
//! ============================================================================
//! - RedbStore: embedded structured store (redb), the durable home of state
//! - LegacyFileStore: flat JSON file of text values written by older builds
//! - MemoryStore: in-process map for tests and throwaway sessions
//!
//! Every backend treats a missing underlying store as empty.
//! ============================================================================

pub mod legacy;
mod memory;
mod redb_store;

pub use legacy::LegacyFileStore;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use anyhow::Result;
use async_trait::async_trait;

/// Async get/set by string key. Both operations are idempotent.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, or None if the key (or the whole store) is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Write several values as one unit: either all land or none do
    async fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()>;
}
