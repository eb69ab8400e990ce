//! ============================================================================
//! Collectible Catalog - Featured and themed collection slots
//! ============================================================================
//! Static reference data used for draws and completion tracking.
//! Loaded once, never mutated.
//! ============================================================================

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Kind of catalog slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Hand-curated chase item, only drawable at Epic and Legendary
    Featured,
    /// Generic theme, drawable at any tier
    Themed,
}

/// One collectible archetype in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSlot {
    pub slot_id: String,
    pub display_name: String,
    pub kind: SlotKind,
    /// Curated description for featured slots
    pub blurb: Option<String>,
}

impl CatalogSlot {
    pub fn themed(slot_id: &str, display_name: &str) -> Self {
        Self {
            slot_id: slot_id.to_string(),
            display_name: display_name.to_string(),
            kind: SlotKind::Themed,
            blurb: None,
        }
    }

    pub fn featured(slot_id: &str, display_name: &str, blurb: &str) -> Self {
        Self {
            slot_id: slot_id.to_string(),
            display_name: display_name.to_string(),
            kind: SlotKind::Featured,
            blurb: Some(blurb.to_string()),
        }
    }

    pub fn is_featured(&self) -> bool {
        self.kind == SlotKind::Featured
    }
}

/// Ordered collection of slots. Order matters for legacy name matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    slots: Vec<CatalogSlot>,
}

impl Catalog {
    pub fn new(slots: Vec<CatalogSlot>) -> Self {
        Self { slots }
    }

    /// The built-in catalog shipped with the game
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    pub fn slots(&self) -> &[CatalogSlot] {
        &self.slots
    }

    pub fn featured(&self) -> impl Iterator<Item = &CatalogSlot> {
        self.slots.iter().filter(|s| s.kind == SlotKind::Featured)
    }

    pub fn themed(&self) -> impl Iterator<Item = &CatalogSlot> {
        self.slots.iter().filter(|s| s.kind == SlotKind::Themed)
    }

    pub fn get(&self, slot_id: &str) -> Option<&CatalogSlot> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

static BUILTIN: Lazy<Catalog> = Lazy::new(|| {
    let mut slots = vec![
        CatalogSlot::featured(
            "maid_lace",
            "Monochrome Lace",
            "A playful black and white lace design with crossed ribbons and a tiny bow, straight out of a maid cafe.",
        ),
        CatalogSlot::featured(
            "red_polka",
            "Red Polka Ribbon",
            "Cream white with little red polka dots and sweet red ribbon ties. Soft cotton through and through.",
        ),
        CatalogSlot::featured(
            "cat_ears",
            "Pink Cat Ears",
            "Pastel pink with a big white cat-ear patch and a ruffled lettuce edge. Pure kawaii.",
        ),
        CatalogSlot::featured(
            "cream_bear",
            "Cream Bear",
            "Glossy cream silk with a fuzzy teddy bear patch in the middle and gentle side ties.",
        ),
        CatalogSlot::featured(
            "kitty_face",
            "Big Kitty Face",
            "Classic white with a bright red bow and a whiskered cat face print. Childlike and cheeky.",
        ),
    ];

    slots.extend(
        [
            ("strawberry", "Strawberry"),
            ("bear", "Teddy Bear"),
            ("cloud", "Cloud"),
            ("star", "Star"),
            ("kitty", "Kitty"),
            ("flower", "Flower"),
            ("rainbow", "Rainbow"),
            ("angel", "Angel"),
            ("candy", "Candy"),
            ("heart", "Heart"),
            ("unicorn", "Unicorn"),
            ("cherry", "Cherry"),
            ("shell", "Seashell"),
            ("feather", "Feather"),
            ("crystal", "Crystal"),
            ("butterfly", "Butterfly"),
            ("maid", "Maid"),
            ("polka", "Polka Dot"),
            ("cream", "Cream"),
            ("hello_kitty", "Kitty Cat"),
        ]
        .into_iter()
        .map(|(id, name)| CatalogSlot::themed(id, name)),
    );

    Catalog::new(slots)
});
