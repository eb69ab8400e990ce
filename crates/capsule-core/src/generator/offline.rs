use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use super::compose::compose_descriptor;
use super::GenerationProvider;
use crate::catalog::CatalogSlot;
use crate::types::{ItemDescriptor, Rarity};

/// Provider that never touches the network. Images are placeholder URLs.
#[derive(Default)]
pub struct OfflineGenerator {
    counter: AtomicU64,
}

impl OfflineGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GenerationProvider for OfflineGenerator {
    async fn generate(&self, rarity: Rarity, slot: &CatalogSlot) -> Result<ItemDescriptor> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let image_ref = format!("https://picsum.photos/seed/{}-{}/300/400", slot.slot_id, n);
        let mut rng = rand::thread_rng();
        Ok(compose_descriptor(&mut rng, rarity, slot, image_ref))
    }
}
