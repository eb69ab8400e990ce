//! ============================================================================
//! Inventory Store - Owned collectibles and derived views
//! ============================================================================
//! Storage order is insertion order with the newest item first. Display order
//! (rarity, then acquisition time) is a derived view computed per query.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use crate::catalog::CatalogSlot;
use crate::types::{OwnedItem, Rarity};

/// Completion progress against a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStatus {
    pub unlocked_count: usize,
    pub total_count: usize,
    pub percent: u32,
}

/// Aggregate numbers for display and export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total_items: usize,
    pub by_rarity: BTreeMap<String, usize>,
    pub total_sell_value: u64,
}

/// Owned items, unique by id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    items: Vec<OwnedItem>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored items, dropping repeated ids (first occurrence wins)
    pub fn from_items(items: Vec<OwnedItem>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            if seen.insert(item.id.clone()) {
                kept.push(item);
            } else {
                warn!("Dropping duplicate inventory id {}", item.id);
            }
        }
        Self { items: kept }
    }

    /// Prepend an item. Returns false and leaves the inventory untouched if
    /// an item with the same id is already owned.
    pub fn add(&mut self, item: OwnedItem) -> bool {
        if self.contains(&item.id) {
            warn!("Refusing to add duplicate item id {}", item.id);
            return false;
        }
        self.items.insert(0, item);
        true
    }

    /// Remove and return the item with `id`, or None if it is not owned
    pub fn remove_by_id(&mut self, id: &str) -> Option<OwnedItem> {
        let index = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&OwnedItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in storage order (newest first)
    pub fn items(&self) -> &[OwnedItem] {
        &self.items
    }

    /// Items filtered by exact rarity, sorted by rarity then acquisition time,
    /// both descending
    pub fn sorted_view(&self, filter: Option<Rarity>) -> Vec<OwnedItem> {
        let mut view: Vec<OwnedItem> = self
            .items
            .iter()
            .filter(|i| filter.map_or(true, |r| i.rarity == r))
            .cloned()
            .collect();
        view.sort_by(|a, b| {
            b.rarity
                .cmp(&a.rarity)
                .then_with(|| b.acquired_at.cmp(&a.acquired_at))
        });
        view
    }

    /// Catalog slot ids unlocked by the owned items
    pub fn unlocked_slots<'a>(&self, catalog: &'a [CatalogSlot]) -> HashSet<&'a str> {
        let mut unlocked = HashSet::new();
        for item in &self.items {
            let slot = match &item.collection_slot_id {
                Some(id) => catalog.iter().find(|s| &s.slot_id == id),
                None => legacy_match::slot_for_name(&item.name, catalog),
            };
            if let Some(slot) = slot {
                unlocked.insert(slot.slot_id.as_str());
            }
        }
        unlocked
    }

    pub fn is_unlocked(&self, slot: &CatalogSlot, catalog: &[CatalogSlot]) -> bool {
        self.unlocked_slots(catalog).contains(slot.slot_id.as_str())
    }

    pub fn completion_status(&self, catalog: &[CatalogSlot]) -> CompletionStatus {
        let total_count = catalog.len();
        let unlocked_count = self.unlocked_slots(catalog).len();
        let percent = if total_count == 0 {
            0
        } else {
            (unlocked_count as f64 / total_count as f64 * 100.0).round() as u32
        };
        CompletionStatus {
            unlocked_count,
            total_count,
            percent,
        }
    }

    pub fn stats(&self) -> InventoryStats {
        let mut by_rarity = BTreeMap::new();
        for rarity in Rarity::ALL {
            by_rarity.insert(rarity.display_name().to_string(), 0usize);
        }
        for item in &self.items {
            *by_rarity
                .entry(item.rarity.display_name().to_string())
                .or_insert(0) += 1;
        }
        InventoryStats {
            total_items: self.items.len(),
            by_rarity,
            total_sell_value: self.items.iter().map(|i| i.sell_value()).sum(),
        }
    }
}

/// Compatibility rule for items stored before slot ids were recorded.
/// Such items unlock the first slot, in catalog order, whose display name
/// appears in the item name. Items carrying a slot id never use this path.
/// Featured slots are matched too; older builds only name-matched themed
/// slots, so a legacy item named after a featured slot now unlocks it.
mod legacy_match {
    use crate::catalog::CatalogSlot;

    pub(super) fn slot_for_name<'a>(name: &str, catalog: &'a [CatalogSlot]) -> Option<&'a CatalogSlot> {
        catalog
            .iter()
            .find(|slot| !slot.display_name.is_empty() && name.contains(slot.display_name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use chrono::{Duration, TimeZone, Utc};

    fn item(id: &str, rarity: Rarity, slot: Option<&str>, name: &str, minute: i64) -> OwnedItem {
        OwnedItem {
            id: id.to_string(),
            rarity,
            collection_slot_id: slot.map(str::to_string),
            name: name.to_string(),
            description: String::new(),
            image_ref: String::new(),
            scent: String::new(),
            owner: String::new(),
            magic_value: 0,
            acquired_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
        }
    }

    fn small_catalog() -> Vec<CatalogSlot> {
        vec![
            CatalogSlot::featured("cream_bear", "Cream Bear", "blurb"),
            CatalogSlot::themed("kitty", "Kitty"),
            CatalogSlot::themed("hello_kitty", "Kitty Cat"),
            CatalogSlot::themed("cloud", "Cloud"),
        ]
    }

    #[test]
    fn test_add_prepends() {
        let mut inv = Inventory::new();
        inv.add(item("a", Rarity::Common, None, "a", 0));
        inv.add(item("b", Rarity::Common, None, "b", 1));
        assert_eq!(inv.items()[0].id, "b");
        assert_eq!(inv.len(), 2);
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let mut inv = Inventory::new();
        assert!(inv.add(item("a", Rarity::Common, None, "a", 0)));
        assert!(!inv.add(item("a", Rarity::Epic, None, "other", 1)));
        assert_eq!(inv.len(), 1);
        assert_eq!(inv.items()[0].rarity, Rarity::Common);
    }

    #[test]
    fn test_from_items_dedups() {
        let inv = Inventory::from_items(vec![
            item("a", Rarity::Rare, None, "first", 0),
            item("a", Rarity::Common, None, "second", 1),
            item("b", Rarity::Common, None, "b", 2),
        ]);
        assert_eq!(inv.len(), 2);
        assert_eq!(inv.get("a").unwrap().name, "first");
    }

    #[test]
    fn test_remove_by_id() {
        let mut inv = Inventory::new();
        inv.add(item("a", Rarity::Common, None, "a", 0));
        let removed = inv.remove_by_id("a").unwrap();
        assert_eq!(removed.id, "a");
        assert!(inv.is_empty());
        assert!(inv.remove_by_id("a").is_none());
    }

    #[test]
    fn test_sorted_view_orders_by_rarity_then_newest() {
        let mut inv = Inventory::new();
        inv.add(item("old_common", Rarity::Common, None, "x", 0));
        inv.add(item("legendary", Rarity::Legendary, None, "x", 1));
        inv.add(item("new_common", Rarity::Common, None, "x", 5));
        inv.add(item("epic", Rarity::Epic, None, "x", 2));

        let ids: Vec<_> = inv.sorted_view(None).into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["legendary", "epic", "new_common", "old_common"]);
    }

    #[test]
    fn test_sorted_view_filter() {
        let mut inv = Inventory::new();
        inv.add(item("a", Rarity::Common, None, "x", 0));
        inv.add(item("b", Rarity::Epic, None, "x", 1));
        inv.add(item("c", Rarity::Common, None, "x", 2));

        let commons = inv.sorted_view(Some(Rarity::Common));
        assert_eq!(commons.len(), 2);
        assert!(commons.iter().all(|i| i.rarity == Rarity::Common));
        assert_eq!(commons[0].id, "c");
        assert!(inv.sorted_view(Some(Rarity::Legendary)).is_empty());
    }

    #[test]
    fn test_completion_empty_and_full() {
        let catalog = small_catalog();
        let mut inv = Inventory::new();
        assert_eq!(inv.completion_status(&catalog).percent, 0);

        for (n, slot) in catalog.iter().enumerate() {
            inv.add(item(&format!("i{}", n), Rarity::Epic, Some(&slot.slot_id), "x", n as i64));
        }
        let status = inv.completion_status(&catalog);
        assert_eq!(status.unlocked_count, 4);
        assert_eq!(status.total_count, 4);
        assert_eq!(status.percent, 100);
    }

    #[test]
    fn test_completion_rounds() {
        let catalog = Catalog::builtin().slots();
        let mut inv = Inventory::new();
        inv.add(item("a", Rarity::Common, Some("cloud"), "x", 0));
        // 1 of 25
        assert_eq!(inv.completion_status(catalog).percent, 4);
        inv.add(item("b", Rarity::Common, Some("cloud"), "x", 1));
        assert_eq!(inv.completion_status(catalog).unlocked_count, 1);
    }

    #[test]
    fn test_completion_monotonic_under_adds() {
        let catalog = Catalog::builtin().slots();
        let mut inv = Inventory::new();
        let mut last = 0;
        for (n, slot) in catalog.iter().enumerate().step_by(3) {
            inv.add(item(&format!("i{}", n), Rarity::Rare, Some(&slot.slot_id), "x", n as i64));
            let pct = inv.completion_status(catalog).percent;
            assert!(pct >= last);
            last = pct;
        }
    }

    #[test]
    fn test_removing_sole_owner_relocks_slot() {
        let catalog = small_catalog();
        let mut inv = Inventory::new();
        inv.add(item("a", Rarity::Common, Some("cloud"), "x", 0));
        inv.add(item("b", Rarity::Common, Some("cloud"), "x", 1));
        inv.remove_by_id("a");
        assert_eq!(inv.completion_status(&catalog).unlocked_count, 1);
        inv.remove_by_id("b");
        assert_eq!(inv.completion_status(&catalog).unlocked_count, 0);
    }

    #[test]
    fn test_legacy_name_fallback() {
        let catalog = small_catalog();
        let mut inv = Inventory::new();
        inv.add(item("old", Rarity::Common, None, "Everyday · Cloud Plushie", 0));
        assert!(inv.is_unlocked(&catalog[3], &catalog));
        assert_eq!(inv.completion_status(&catalog).unlocked_count, 1);
    }

    #[test]
    fn test_legacy_match_takes_first_slot_in_catalog_order() {
        let catalog = small_catalog();
        let mut inv = Inventory::new();
        inv.add(item("old", Rarity::Common, None, "Dreamy · Kitty Cat Charm", 0));
        let unlocked = inv.unlocked_slots(&catalog);
        assert!(unlocked.contains("kitty"));
        assert!(!unlocked.contains("hello_kitty"));
    }

    #[test]
    fn test_legacy_name_fallback_reaches_featured_slots() {
        let catalog = small_catalog();
        let mut inv = Inventory::new();
        inv.add(item("a", Rarity::Epic, None, "Magical · Cream Bear", 0));
        assert!(inv.is_unlocked(&catalog[0], &catalog));
        assert_eq!(inv.completion_status(&catalog).unlocked_count, 1);
    }

    #[test]
    fn test_slot_id_items_skip_name_fallback() {
        let catalog = small_catalog();
        let mut inv = Inventory::new();
        inv.add(item("new", Rarity::Common, Some("kitty"), "Everyday · Cloud Plushie", 0));
        let unlocked = inv.unlocked_slots(&catalog);
        assert!(unlocked.contains("kitty"));
        assert!(!unlocked.contains("cloud"));
    }

    #[test]
    fn test_empty_catalog_is_zero_percent() {
        let mut inv = Inventory::new();
        inv.add(item("a", Rarity::Common, Some("cloud"), "x", 0));
        assert_eq!(inv.completion_status(&[]).percent, 0);
    }

    #[test]
    fn test_stats() {
        let mut inv = Inventory::new();
        inv.add(item("a", Rarity::Common, None, "x", 0));
        inv.add(item("b", Rarity::Legendary, None, "x", 1));
        let stats = inv.stats();
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.by_rarity["Common"], 1);
        assert_eq!(stats.by_rarity["Rare"], 0);
        assert_eq!(stats.total_sell_value, 520);
    }
}
