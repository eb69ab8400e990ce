//! ============================================================================
//! CAPSULE-CORE: The Capsule Machine
//! ============================================================================
//! This crate handles all game logic for the collectible capsule machine:
//! - Weighted rarity and catalog slot draws
//! - Coin ledger and owned-item inventory with collection progress
//! - Durable state on redb with one-time migration from the legacy file
//! - Item content from a remote image API or an offline composer
//! ============================================================================

pub mod catalog;
pub mod config;
pub mod draw;
pub mod economy;
pub mod generator;
pub mod inventory;
pub mod persistence;
pub mod session;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use catalog::{Catalog, CatalogSlot, SlotKind};
pub use config::CapsuleConfig;
pub use draw::DrawEngine;
pub use economy::Ledger;
pub use generator::{GenerationProvider, ImageGenerator, OfflineGenerator};
pub use inventory::{CompletionStatus, Inventory, InventoryStats};
pub use persistence::{LoadReport, LoadSource, PersistedState, PersistenceGateway, PersistenceSettings};
pub use session::{BonusOutcome, CapsuleSession, DrawPhase, SessionOptions};
pub use store::{KeyValueStore, LegacyFileStore, MemoryStore, RedbStore};
