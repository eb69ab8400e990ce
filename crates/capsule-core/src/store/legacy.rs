//! ============================================================================
//! Legacy Store - Flat text values written by older builds
//! ============================================================================
//! Older builds kept `inventory` and `balance` as two independently
//! serialized text values (web-storage style) in one flat JSON object.
//! This module reads that file and parses its records into current types.
//! The file is never deleted, only superseded by the structured store.
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::types::{OwnedItem, Rarity};

/// Keys the inventory may be stored under, preferred first
pub const LEGACY_INVENTORY_KEYS: [&str; 2] = ["inventory", "gacha_inventory"];
/// Keys the balance may be stored under, preferred first
pub const LEGACY_BALANCE_KEYS: [&str; 2] = ["balance", "gacha_currency"];

/// Flat JSON object of string values on disk
pub struct LegacyFileStore {
    path: PathBuf,
}

impl LegacyFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<Map<String, Value>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No legacy store at {}", self.path.display());
                return Ok(Map::new());
            }
            Err(e) => return Err(anyhow!("Failed to read legacy store: {}", e)),
        };

        if text.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&text).map_err(|e| anyhow!("Legacy store is not a JSON object: {}", e))
    }
}

#[async_trait]
impl KeyValueStore for LegacyFileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let map = self.read_map().await?;
        Ok(map.get(key).map(|value| match value {
            Value::String(s) => s.as_bytes().to_vec(),
            other => other.to_string().into_bytes(),
        }))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_many(&[(key, value)]).await
    }

    async fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        let mut map = self.read_map().await?;
        for (key, value) in entries {
            let text = String::from_utf8(value.to_vec())
                .map_err(|e| anyhow!("Legacy values must be UTF-8 text: {}", e))?;
            map.insert(key.to_string(), Value::String(text));
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow!("Failed to create directory: {}", e))?;
        }
        let body = serde_json::to_string_pretty(&map)?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| anyhow!("Failed to write legacy store: {}", e))?;
        Ok(())
    }
}

// ============================================================================
// Legacy record formats
// ============================================================================

/// Tier as written by older builds: tier names in any case or the old
/// display labels
#[derive(Debug, Clone, Copy, Deserialize)]
enum LegacyRarity {
    #[serde(alias = "COMMON", alias = "common", alias = "普通可爱")]
    Common,
    #[serde(alias = "RARE", alias = "rare", alias = "超级可爱")]
    Rare,
    #[serde(alias = "EPIC", alias = "epic", alias = "无敌可爱")]
    Epic,
    #[serde(alias = "LEGENDARY", alias = "legendary", alias = "至臻可爱")]
    Legendary,
}

impl From<LegacyRarity> for Rarity {
    fn from(value: LegacyRarity) -> Self {
        match value {
            LegacyRarity::Common => Rarity::Common,
            LegacyRarity::Rare => Rarity::Rare,
            LegacyRarity::Epic => Rarity::Epic,
            LegacyRarity::Legendary => Rarity::Legendary,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyItem {
    id: String,
    name: String,
    rarity: LegacyRarity,
    #[serde(default, alias = "imageRef")]
    image_url: String,
    #[serde(default)]
    description: String,
    /// Milliseconds since the epoch
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    scent: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    magic_value: f64,
    #[serde(default, alias = "collectionSlotId")]
    collection_id: Option<String>,
}

impl From<LegacyItem> for OwnedItem {
    fn from(item: LegacyItem) -> Self {
        let acquired_at: DateTime<Utc> = Utc
            .timestamp_millis_opt(item.timestamp)
            .single()
            .unwrap_or_default();
        Self {
            id: item.id,
            rarity: item.rarity.into(),
            collection_slot_id: item.collection_id.filter(|id| !id.is_empty()),
            name: item.name,
            description: item.description,
            image_ref: item.image_url,
            scent: item.scent,
            owner: item.owner,
            magic_value: item.magic_value.clamp(0.0, u32::MAX as f64) as u32,
            acquired_at,
        }
    }
}

/// Items parsed from a legacy inventory value, plus the records that could not be read
#[derive(Debug, Default)]
pub struct LegacyInventory {
    pub items: Vec<OwnedItem>,
    pub rejected: Vec<String>,
}

/// Parse a legacy inventory value (a JSON array of item records).
/// A malformed array is an error; malformed records are skipped and listed.
pub fn parse_inventory(text: &str) -> Result<LegacyInventory> {
    let records: Vec<Value> =
        serde_json::from_str(text).map_err(|e| anyhow!("inventory is not a JSON array: {}", e))?;

    let mut parsed = LegacyInventory::default();
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<LegacyItem>(record) {
            Ok(item) => parsed.items.push(item.into()),
            Err(e) => {
                warn!("Skipping legacy item #{}: {}", index, e);
                parsed.rejected.push(format!("item #{}: {}", index, e));
            }
        }
    }
    Ok(parsed)
}

/// Parse a legacy balance value (decimal text, possibly quoted).
/// Negative amounts clamp to zero.
pub fn parse_balance(text: &str) -> Result<u64> {
    let trimmed = text.trim().trim_matches('"').trim();
    let amount: i64 = match trimmed.parse() {
        Ok(n) => n,
        Err(_) => trimmed
            .parse::<f64>()
            .map(|f| f.trunc() as i64)
            .map_err(|_| anyhow!("balance '{}' is not a number", trimmed))?,
    };
    Ok(amount.max(0) as u64)
}
