//! ============================================================================
//! Draw Engine - Weighted rarity and catalog slot selection
//! ============================================================================
//! Two independent stages:
//! 1. Roll a tier from cumulative percentage bands
//! 2. Given the tier, decide between a featured chase slot and a themed slot
//!
//! Everything here is side-effect free; the random source is passed in.
//! ============================================================================

use rand::Rng;

use crate::catalog::{Catalog, CatalogSlot};
use crate::types::{CapsuleError, Rarity};

/// Upper bounds of the cumulative rarity bands, checked in this order.
/// Each band is the complement of the ones before it, so moving one bound moves the rest.
const LEGENDARY_BELOW: f64 = 5.0;
const EPIC_BELOW: f64 = 20.0;
const RARE_BELOW: f64 = 50.0;

/// Percent chance that a Legendary draw resolves to a featured slot
pub const LEGENDARY_FEATURED_PERCENT: u32 = 70;
/// Percent chance that an Epic draw resolves to a featured slot
pub const EPIC_FEATURED_PERCENT: u32 = 40;

/// Map a roll in [0, 100) onto a tier
pub fn rarity_for_roll(roll: f64) -> Rarity {
    if roll < LEGENDARY_BELOW {
        Rarity::Legendary
    } else if roll < EPIC_BELOW {
        Rarity::Epic
    } else if roll < RARE_BELOW {
        Rarity::Rare
    } else {
        Rarity::Common
    }
}

/// Chance in percent that a tier resolves to a featured slot
pub fn featured_percent(rarity: Rarity) -> u32 {
    match rarity {
        Rarity::Legendary => LEGENDARY_FEATURED_PERCENT,
        Rarity::Epic => EPIC_FEATURED_PERCENT,
        Rarity::Rare | Rarity::Common => 0,
    }
}

/// Roll a rarity tier
pub fn determine_rarity<R: Rng + ?Sized>(rng: &mut R) -> Rarity {
    rarity_for_roll(rng.gen_range(0.0..100.0))
}

/// Weighted draw engine over a fixed catalog
#[derive(Debug, Clone)]
pub struct DrawEngine {
    featured: Vec<CatalogSlot>,
    themed: Vec<CatalogSlot>,
}

impl DrawEngine {
    /// Build an engine for a catalog. At least one themed slot is required,
    /// since every tier can fall through to themed generation.
    pub fn new(catalog: &Catalog) -> Result<Self, CapsuleError> {
        let featured: Vec<CatalogSlot> = catalog.featured().cloned().collect();
        let themed: Vec<CatalogSlot> = catalog.themed().cloned().collect();

        if themed.is_empty() {
            return Err(CapsuleError::Config(
                "catalog needs at least one themed slot".to_string(),
            ));
        }

        Ok(Self { featured, themed })
    }

    pub fn determine_rarity<R: Rng + ?Sized>(&self, rng: &mut R) -> Rarity {
        determine_rarity(rng)
    }

    /// Pick the catalog slot for a draw of the given tier
    pub fn determine_catalog_slot<R: Rng + ?Sized>(&self, rng: &mut R, rarity: Rarity) -> &CatalogSlot {
        let chance = featured_percent(rarity);
        if chance > 0 && !self.featured.is_empty() && rng.gen_range(0..100) < chance {
            return &self.featured[rng.gen_range(0..self.featured.len())];
        }
        &self.themed[rng.gen_range(0..self.themed.len())]
    }

    /// Both stages in one call
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> (Rarity, &CatalogSlot) {
        let rarity = self.determine_rarity(rng);
        let slot = self.determine_catalog_slot(rng, rarity);
        (rarity, slot)
    }
}
