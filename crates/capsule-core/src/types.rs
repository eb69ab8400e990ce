//! ============================================================================
//! Core Types for the Capsule Machine
//! ============================================================================
//! Rarity tiers, owned items, generation descriptors, session events and the
//! user-facing error taxonomy. These types are serialized to JSON for export
//! and to bincode for the structured store.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Cost of one draw, independent of the outcome
pub const DRAW_COST: u64 = 100;

/// Rarity tiers, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    /// All tiers, lowest first
    pub const ALL: [Rarity; 4] = [Rarity::Common, Rarity::Rare, Rarity::Epic, Rarity::Legendary];

    /// Draw probability in percent
    pub fn probability(&self) -> u32 {
        match self {
            Rarity::Common => 50,
            Rarity::Rare => 30,
            Rarity::Epic => 15,
            Rarity::Legendary => 5,
        }
    }

    /// Coins credited when an item of this tier is sold
    pub fn sell_value(&self) -> u64 {
        match self {
            Rarity::Common => 20,
            Rarity::Rare => 50,
            Rarity::Epic => 150,
            Rarity::Legendary => 500,
        }
    }

    /// Draw cost. Uniform across tiers.
    pub fn draw_cost(&self) -> u64 {
        DRAW_COST
    }

    /// Name prefix used when composing item names
    pub fn name_prefix(&self) -> &'static str {
        match self {
            Rarity::Common => "Everyday",
            Rarity::Rare => "Sweetheart",
            Rarity::Epic => "Magical",
            Rarity::Legendary => "Dreamy",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
        }
    }

    /// Parse a tier from a user-supplied name (case-insensitive)
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "common" => Some(Rarity::Common),
            "rare" => Some(Rarity::Rare),
            "epic" => Some(Rarity::Epic),
            "legendary" => Some(Rarity::Legendary),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Rarity::Common => 0,
            Rarity::Rare => 1,
            Rarity::Epic => 2,
            Rarity::Legendary => 3,
        }
    }
}

impl PartialOrd for Rarity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rarity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Content returned by a generation provider for one draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub image_ref: String,
    pub name: String,
    pub description: String,
    pub scent: String,
    pub owner: String,
    pub magic_value: u32,
}

/// A collectible owned by the player.
/// Never mutated after creation; it is either in the inventory or gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedItem {
    pub id: String,
    pub rarity: Rarity,
    /// Catalog slot this item unlocks. None for items created before slot tracking.
    pub collection_slot_id: Option<String>,
    pub name: String,
    pub description: String,
    pub image_ref: String,
    pub scent: String,
    pub owner: String,
    pub magic_value: u32,
    pub acquired_at: DateTime<Utc>,
}

impl OwnedItem {
    /// Build a freshly acquired item from a provider descriptor
    pub fn acquire(rarity: Rarity, slot_id: &str, descriptor: ItemDescriptor) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rarity,
            collection_slot_id: Some(slot_id.to_string()),
            name: descriptor.name,
            description: descriptor.description,
            image_ref: descriptor.image_ref,
            scent: descriptor.scent,
            owner: descriptor.owner,
            magic_value: descriptor.magic_value,
            acquired_at: Utc::now(),
        }
    }

    pub fn sell_value(&self) -> u64 {
        self.rarity.sell_value()
    }
}

/// Discrete events emitted by a session for presentation layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    DrawStarted,
    DrawSettled { item: OwnedItem },
    DrawFailed { reason: String },
    SoldItem { id: String, credited: u64 },
    BonusClaimed { amount: u64 },
    BonusAlreadyClaimed,
}

/// Errors surfaced to the player or the host. None of them is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapsuleError {
    #[error("Insufficient coins: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("A draw is already in progress")]
    DrawInProgress,

    #[error("Generation failed, the draw was free, try again: {0}")]
    Generation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Could not parse stored {key}: {reason}")]
    MigrationParse { key: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Rarity::Legendary > Rarity::Epic);
        assert!(Rarity::Epic > Rarity::Rare);
        assert!(Rarity::Rare > Rarity::Common);
    }

    #[test]
    fn test_tier_constants() {
        let total: u32 = Rarity::ALL.iter().map(|r| r.probability()).sum();
        assert_eq!(total, 100);
        assert_eq!(Rarity::Common.sell_value(), 20);
        assert_eq!(Rarity::Rare.sell_value(), 50);
        assert_eq!(Rarity::Epic.sell_value(), 150);
        assert_eq!(Rarity::Legendary.sell_value(), 500);
        for rarity in Rarity::ALL {
            assert_eq!(rarity.draw_cost(), DRAW_COST);
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Rarity::from_name("EPIC"), Some(Rarity::Epic));
        assert_eq!(Rarity::from_name(" legendary "), Some(Rarity::Legendary));
        assert_eq!(Rarity::from_name("mythic"), None);
    }

    #[test]
    fn test_acquire_assigns_unique_ids() {
        let descriptor = ItemDescriptor {
            image_ref: "img".into(),
            name: "Everyday · Cloud Plushie".into(),
            description: "soft".into(),
            scent: "milk".into(),
            owner: "Alice".into(),
            magic_value: 42,
        };
        let a = OwnedItem::acquire(Rarity::Common, "cloud", descriptor.clone());
        let b = OwnedItem::acquire(Rarity::Common, "cloud", descriptor);
        assert_ne!(a.id, b.id);
        assert_eq!(a.collection_slot_id.as_deref(), Some("cloud"));
        assert_eq!(a.sell_value(), 20);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(SessionEvent::BonusClaimed { amount: 500 }).unwrap();
        assert_eq!(json["event"], "bonus_claimed");
        assert_eq!(json["amount"], 500);
    }
}
