//! ============================================================================
//! Configuration - Paths, economy knobs and persistence timing
//! ============================================================================
//! Defaults match the shipped game. Environment variables override them;
//! binaries are expected to call `dotenvy::dotenv()` first.
//! ============================================================================

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::CapsuleError;

/// Coins a brand new player starts with
pub const DEFAULT_STARTING_BALANCE: u64 = 1000;
/// Coins granted by the daily bonus
pub const DEFAULT_DAILY_BONUS: u64 = 500;
/// Delay between the last mutation and the commit
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
/// Quiet period after load during which no commit may land
pub const DEFAULT_LOAD_GUARD_MS: u64 = 250;
/// Upper bound on a single generation call
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_IMAGE_MODEL: &str = "grok-2-image-1212";
pub const DEFAULT_IMAGE_ENDPOINT: &str = "https://api.x.ai/v1/images/generations";

/// ~/.capsule
pub fn default_data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".capsule"))
}

/// Runtime configuration for a capsule session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapsuleConfig {
    /// Structured store file. None means CAPSULE_DB_PATH or ~/.capsule/capsule.redb
    pub db_path: Option<PathBuf>,
    /// Legacy flat store file. None disables migration.
    pub legacy_path: Option<PathBuf>,
    pub starting_balance: u64,
    pub daily_bonus: u64,
    pub debounce_ms: u64,
    pub load_guard_ms: u64,
    pub generation_timeout_secs: u64,
    /// Enables the HTTP image provider when present
    pub xai_api_key: Option<String>,
    pub image_model: String,
    pub image_endpoint: String,
    /// Fixed seed for the draw engine; None seeds from entropy
    pub seed: Option<u64>,
}

impl Default for CapsuleConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            legacy_path: default_data_dir().ok().map(|d| d.join("legacy.json")),
            starting_balance: DEFAULT_STARTING_BALANCE,
            daily_bonus: DEFAULT_DAILY_BONUS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            load_guard_ms: DEFAULT_LOAD_GUARD_MS,
            generation_timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
            xai_api_key: None,
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            image_endpoint: DEFAULT_IMAGE_ENDPOINT.to_string(),
            seed: None,
        }
    }
}

impl CapsuleConfig {
    /// Defaults overridden by CAPSULE_* and XAI_API_KEY environment variables
    pub fn from_env() -> Result<Self, CapsuleError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CapsuleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("CAPSULE_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("CAPSULE_LEGACY_PATH") {
            config.legacy_path = Some(PathBuf::from(path));
        }
        if let Some(v) = lookup("CAPSULE_STARTING_BALANCE") {
            config.starting_balance = parse_number("CAPSULE_STARTING_BALANCE", &v)?;
        }
        if let Some(v) = lookup("CAPSULE_DAILY_BONUS") {
            config.daily_bonus = parse_number("CAPSULE_DAILY_BONUS", &v)?;
        }
        if let Some(v) = lookup("CAPSULE_DEBOUNCE_MS") {
            config.debounce_ms = parse_number("CAPSULE_DEBOUNCE_MS", &v)?;
        }
        if let Some(v) = lookup("CAPSULE_LOAD_GUARD_MS") {
            config.load_guard_ms = parse_number("CAPSULE_LOAD_GUARD_MS", &v)?;
        }
        if let Some(v) = lookup("CAPSULE_GENERATION_TIMEOUT_SECS") {
            config.generation_timeout_secs = parse_number("CAPSULE_GENERATION_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("CAPSULE_SEED") {
            config.seed = Some(parse_number("CAPSULE_SEED", &v)?);
        }
        if let Some(v) = lookup("CAPSULE_IMAGE_MODEL") {
            config.image_model = v;
        }
        if let Some(v) = lookup("CAPSULE_IMAGE_ENDPOINT") {
            config.image_endpoint = v;
        }
        config.xai_api_key = lookup("XAI_API_KEY").filter(|k| !k.trim().is_empty());

        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn load_guard(&self) -> Duration {
        Duration::from_millis(self.load_guard_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, CapsuleError> {
    value
        .trim()
        .parse()
        .map_err(|_| CapsuleError::Config(format!("{} must be a whole number, got '{}'", key, value)))
}
