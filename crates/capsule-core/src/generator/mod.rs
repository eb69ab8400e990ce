//! ============================================================================
//! Generator Module - Content providers for drawn items
//! ============================================================================
//! A provider turns (rarity, catalog slot) into an item descriptor:
//! - ImageGenerator: remote image generation over HTTP plus local text
//! - OfflineGenerator: local text with a placeholder image, no network
//!
//! Providers must fail rather than hang or substitute placeholder items;
//! the session converts failures (and timeouts) into free draws.
//! ============================================================================

mod compose;
mod image;
mod offline;

pub use compose::{compose_descriptor, magic_value_range};
pub use image::ImageGenerator;
pub use offline::OfflineGenerator;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::catalog::CatalogSlot;
use crate::config::CapsuleConfig;
use crate::types::{ItemDescriptor, Rarity};

/// Source of item content for a draw
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, rarity: Rarity, slot: &CatalogSlot) -> Result<ItemDescriptor>;
}

/// Pick the provider the configuration asks for
pub fn provider_from_config(config: &CapsuleConfig) -> Arc<dyn GenerationProvider> {
    match &config.xai_api_key {
        Some(key) => {
            info!("Using image generation via {}", config.image_endpoint);
            Arc::new(ImageGenerator::with_endpoint(
                key.clone(),
                config.image_endpoint.clone(),
                config.image_model.clone(),
            ))
        }
        None => {
            info!("No XAI_API_KEY set, using offline generator");
            Arc::new(OfflineGenerator::new())
        }
    }
}
