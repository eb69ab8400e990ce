//! Local composition of item names and flavour text from vocabulary lists.

use rand::seq::SliceRandom;
use rand::Rng;
use std::ops::RangeInclusive;

use crate::catalog::CatalogSlot;
use crate::types::{ItemDescriptor, Rarity};

struct ItemType {
    name: &'static str,
    weight: f64,
}

const ITEM_TYPES: [ItemType; 3] = [
    ItemType { name: "Plushie", weight: 0.8 },
    ItemType { name: "Charm", weight: 0.1 },
    ItemType { name: "Gift Set", weight: 0.1 },
];

const STYLES: [&str; 11] = [
    "soft cotton", "silk", "lace frills", "ribbons", "sheer tulle", "polka dots",
    "ruffles", "satin", "cross straps", "lettuce edges", "side ties",
];

const FABRICS: [&str; 8] = [
    "cloud-soft combed cotton", "cool silk", "airy tulle", "gentle modal",
    "glossy satin", "stretchy lace", "slippery ice silk", "pure cotton",
];

const DETAILS: [&str; 9] = [
    "dotted with delicate embroidery", "set with tiny sparkling rhinestones",
    "finished with a sweet bow", "trimmed with a wavy edge", "printed with an exclusive pattern",
    "layered with ruffles", "tied with playful laces", "patched with something fuzzy",
    "decorated with little 3D ornaments",
];

const FEELINGS: [&str; 6] = [
    "Holding it feels like stepping into a fairy tale.",
    "It reads like a gentle love letter.",
    "Your mood turns pastel pink just looking at it.",
    "It is full of girlish daydreams.",
    "So comfy you never want to put it down.",
    "It keeps you cute even in your dreams.",
];

const SCENTS: [&str; 10] = [
    "morning dew", "sweet milk", "strawberry gummy", "sun-dried blanket", "light jasmine",
    "sea salt vanilla", "honey citron", "baby powder", "sakura pudding", "caramel biscuit",
];

const OWNERS: [&str; 10] = [
    "Alice", "Miku", "Sakura", "Usagi", "a nameless princess", "the girl next door",
    "Madoka", "a forest spirit", "a cloud angel", "future you",
];

/// Magic value range granted to each tier
pub fn magic_value_range(rarity: Rarity) -> RangeInclusive<u32> {
    match rarity {
        Rarity::Common => 10..=99,
        Rarity::Rare => 100..=299,
        Rarity::Epic => 300..=699,
        Rarity::Legendary => 700..=999,
    }
}

/// Cumulative-weight pick over the item types
fn weighted_type<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    let roll: f64 = rng.gen();
    let mut cumulative = 0.0;
    for item_type in &ITEM_TYPES {
        cumulative += item_type.weight;
        if roll < cumulative {
            return item_type.name;
        }
    }
    ITEM_TYPES[0].name
}

fn pick<R: Rng + ?Sized>(rng: &mut R, list: &[&'static str]) -> &'static str {
    list.choose(rng).copied().unwrap_or_default()
}

/// Compose a descriptor for a slot. Featured slots keep their curated blurb;
/// themed slots get generated text naming the theme.
pub fn compose_descriptor<R: Rng + ?Sized>(
    rng: &mut R,
    rarity: Rarity,
    slot: &CatalogSlot,
    image_ref: String,
) -> ItemDescriptor {
    let prefix = rarity.name_prefix();

    let (name, description) = match &slot.blurb {
        Some(blurb) if slot.is_featured() => (format!("{} · {}", prefix, slot.display_name), blurb.clone()),
        _ => {
            let item_type = weighted_type(rng);
            let style = pick(rng, &STYLES);
            let fabric = pick(rng, &FABRICS);
            let detail = pick(rng, &DETAILS);
            let feeling = pick(rng, &FEELINGS);
            (
                format!("{} · {} {}", prefix, slot.display_name, item_type),
                format!(
                    "A {}-grade {}-themed {}. Made from {}, {}. The overall look is {}. {}",
                    prefix.to_lowercase(),
                    slot.display_name,
                    item_type.to_lowercase(),
                    fabric,
                    detail,
                    style,
                    feeling
                ),
            )
        }
    };

    ItemDescriptor {
        image_ref,
        name,
        description,
        scent: pick(rng, &SCENTS).to_string(),
        owner: pick(rng, &OWNERS).to_string(),
        magic_value: rng.gen_range(magic_value_range(rarity)),
    }
}
