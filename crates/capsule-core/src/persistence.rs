//! ============================================================================
//! Persistence Gateway - Load, migrate and debounce-commit game state
//! ============================================================================
//! Load protocol (once per session, before any mutation):
//! 1. Read `inventory` and `balance` from the structured store
//! 2. Both absent -> read the legacy flat store, adopt it, write it through
//! 3. Either present -> adopt structured values, legacy is not consulted
//! 4. Parse failures default the affected field and are reported
//!
//! Save protocol:
//! Each mutation schedules a commit after the debounce delay. A newer
//! schedule cancels the pending one, so a burst of mutations produces one
//! write of the latest snapshot. Nothing is written before load completes
//! or inside the guard window right after it.
//! ============================================================================

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::CapsuleConfig;
use crate::store::legacy::{self, LEGACY_BALANCE_KEYS, LEGACY_INVENTORY_KEYS};
use crate::store::KeyValueStore;
use crate::types::{CapsuleError, OwnedItem};

pub const INVENTORY_KEY: &str = "inventory";
pub const BALANCE_KEY: &str = "balance";
pub const DAILY_BONUS_KEY: &str = "daily_bonus";

/// Durable snapshot of a player's game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub inventory: Vec<OwnedItem>,
    pub balance: u64,
    /// Day the daily bonus was last claimed
    pub bonus_claimed_on: Option<NaiveDate>,
}

impl PersistedState {
    pub fn fresh(starting_balance: u64) -> Self {
        Self {
            inventory: Vec::new(),
            balance: starting_balance,
            bonus_claimed_on: None,
        }
    }
}

/// Where the loaded state came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    Structured,
    Legacy,
    Fresh,
}

/// Outcome of the load protocol
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub state: PersistedState,
    pub source: LoadSource,
    /// True if this load wrote legacy data through to the structured store
    pub migrated: bool,
    /// Non-fatal problems met while loading
    pub warnings: Vec<CapsuleError>,
}

/// Timing knobs for the gateway
#[derive(Debug, Clone, Copy)]
pub struct PersistenceSettings {
    pub debounce: Duration,
    pub load_guard: Duration,
    pub starting_balance: u64,
}

impl From<&CapsuleConfig> for PersistenceSettings {
    fn from(config: &CapsuleConfig) -> Self {
        Self {
            debounce: config.debounce(),
            load_guard: config.load_guard(),
            starting_balance: config.starting_balance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    NotLoaded,
    Loading,
    Loaded { at: Instant },
}

/// Gateway between in-memory state and the durable stores
pub struct PersistenceGateway {
    structured: Arc<dyn KeyValueStore>,
    legacy: Option<Arc<dyn KeyValueStore>>,
    settings: PersistenceSettings,
    phase: LoadPhase,
    migrated: bool,
    pending: Option<JoinHandle<()>>,
    /// Id of the most recently scheduled commit; older commits stand down
    generation: Arc<AtomicU64>,
    write_lock: Arc<Mutex<()>>,
    commits: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl PersistenceGateway {
    pub fn new(
        structured: Arc<dyn KeyValueStore>,
        legacy: Option<Arc<dyn KeyValueStore>>,
        settings: PersistenceSettings,
    ) -> Self {
        Self {
            structured,
            legacy,
            settings,
            phase: LoadPhase::NotLoaded,
            migrated: false,
            pending: None,
            generation: Arc::new(AtomicU64::new(0)),
            write_lock: Arc::new(Mutex::new(())),
            commits: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.phase, LoadPhase::Loaded { .. })
    }

    /// True once this gateway has written legacy data through to the structured store
    pub fn migrated(&self) -> bool {
        self.migrated
    }

    /// Commits written so far
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Commits that failed so far
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Whether a scheduled commit has not run yet
    pub fn has_pending_commit(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Run the load protocol. Can only run once per gateway.
    pub async fn load(&mut self) -> Result<LoadReport, CapsuleError> {
        if self.phase != LoadPhase::NotLoaded {
            return Err(CapsuleError::Persistence("state was already loaded".to_string()));
        }
        self.phase = LoadPhase::Loading;

        let mut warnings = Vec::new();
        let mut state = PersistedState::fresh(self.settings.starting_balance);

        let inventory_raw = read_or_warn(self.structured.as_ref(), INVENTORY_KEY, &mut warnings).await;
        let balance_raw = read_or_warn(self.structured.as_ref(), BALANCE_KEY, &mut warnings).await;

        let source = match (inventory_raw, balance_raw) {
            (Ok(None), Ok(None)) => {
                if self.load_legacy(&mut state, &mut warnings).await {
                    LoadSource::Legacy
                } else {
                    LoadSource::Fresh
                }
            }
            (inventory_raw, balance_raw) => {
                if let Ok(Some(bytes)) = inventory_raw {
                    match bincode::deserialize::<Vec<OwnedItem>>(&bytes) {
                        Ok(items) => state.inventory = items,
                        Err(e) => warnings.push(parse_failure(INVENTORY_KEY, e)),
                    }
                }
                if let Ok(Some(bytes)) = balance_raw {
                    match bincode::deserialize::<u64>(&bytes) {
                        Ok(balance) => state.balance = balance,
                        Err(e) => warnings.push(parse_failure(BALANCE_KEY, e)),
                    }
                }
                LoadSource::Structured
            }
        };

        // The bonus marker is independent of where the rest came from
        if let Ok(Some(bytes)) = read_or_warn(self.structured.as_ref(), DAILY_BONUS_KEY, &mut warnings).await {
            match bincode::deserialize::<Option<NaiveDate>>(&bytes) {
                Ok(day) => state.bonus_claimed_on = day,
                Err(e) => warnings.push(parse_failure(DAILY_BONUS_KEY, e)),
            }
        }

        if source == LoadSource::Legacy {
            match write_snapshot(self.structured.as_ref(), &state).await {
                Ok(()) => {
                    self.migrated = true;
                    info!("Migrated legacy state into the structured store");
                }
                Err(e) => {
                    error!("Legacy write-through failed: {}", e);
                    warnings.push(CapsuleError::Persistence(e.to_string()));
                }
            }
        }

        for warning in &warnings {
            warn!("Load: {}", warning);
        }
        info!(
            "Loaded state from {:?}: {} items, {} coins",
            source,
            state.inventory.len(),
            state.balance
        );

        self.phase = LoadPhase::Loaded { at: Instant::now() };

        Ok(LoadReport {
            state,
            source,
            migrated: self.migrated,
            warnings,
        })
    }

    /// Adopt legacy values into `state`. Returns true if anything was found.
    async fn load_legacy(&self, state: &mut PersistedState, warnings: &mut Vec<CapsuleError>) -> bool {
        let Some(store) = self.legacy.as_ref() else {
            return false;
        };

        let inventory_text = read_first_text(store.as_ref(), &LEGACY_INVENTORY_KEYS, warnings).await;
        let balance_text = read_first_text(store.as_ref(), &LEGACY_BALANCE_KEYS, warnings).await;

        if inventory_text.is_none() && balance_text.is_none() {
            debug!("Legacy store holds no state");
            return false;
        }

        if let Some((key, text)) = inventory_text {
            match legacy::parse_inventory(&text) {
                Ok(parsed) => {
                    for reason in parsed.rejected {
                        warnings.push(CapsuleError::MigrationParse {
                            key: key.to_string(),
                            reason,
                        });
                    }
                    state.inventory = parsed.items;
                }
                Err(e) => warnings.push(CapsuleError::MigrationParse {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        if let Some((key, text)) = balance_text {
            match legacy::parse_balance(&text) {
                Ok(balance) => state.balance = balance,
                Err(e) => warnings.push(CapsuleError::MigrationParse {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        true
    }

    // ========================================================================
    // Save
    // ========================================================================

    /// Schedule a debounced commit of `snapshot`, replacing any pending one
    pub fn schedule_commit(&mut self, snapshot: PersistedState) {
        let LoadPhase::Loaded { at } = self.phase else {
            debug!("Commit suppressed: state not loaded yet");
            return;
        };

        // Inside the guard window the commit is pushed back to its end
        let guard_left = (at + self.settings.load_guard).saturating_duration_since(Instant::now());
        let delay = self.settings.debounce.max(guard_left);

        if let Some(handle) = self.pending.take() {
            if !handle.is_finished() {
                debug!("Coalescing pending commit");
            }
            handle.abort();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let store = Arc::clone(&self.structured);
        let latest = Arc::clone(&self.generation);
        let write_lock = Arc::clone(&self.write_lock);
        let commits = Arc::clone(&self.commits);
        let failures = Arc::clone(&self.failures);

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Detached so that a later abort cannot interrupt a write half way
            let commit = tokio::spawn(async move {
                let _guard = write_lock.lock().await;
                if latest.load(Ordering::SeqCst) != generation {
                    debug!("Commit {} superseded", generation);
                    return;
                }
                match write_snapshot(store.as_ref(), &snapshot).await {
                    Ok(()) => {
                        commits.fetch_add(1, Ordering::SeqCst);
                        debug!("Committed snapshot {}", generation);
                    }
                    Err(e) => {
                        failures.fetch_add(1, Ordering::SeqCst);
                        error!("Commit failed, will retry on next change: {}", e);
                    }
                }
            });
            let _ = commit.await;
        }));
    }

    /// Cancel any pending commit and write `snapshot` now
    pub async fn flush(&mut self, snapshot: &PersistedState) -> Result<(), CapsuleError> {
        if !self.is_loaded() {
            return Err(CapsuleError::Persistence("cannot flush before load".to_string()));
        }
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        let _guard = self.write_lock.lock().await;
        match write_snapshot(self.structured.as_ref(), snapshot).await {
            Ok(()) => {
                self.commits.fetch_add(1, Ordering::SeqCst);
                debug!("Flushed snapshot");
                Ok(())
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                Err(CapsuleError::Persistence(e.to_string()))
            }
        }
    }
}

async fn write_snapshot(store: &dyn KeyValueStore, state: &PersistedState) -> Result<()> {
    let inventory = bincode::serialize(&state.inventory)
        .map_err(|e| anyhow!("Failed to serialize inventory: {}", e))?;
    let balance = bincode::serialize(&state.balance)
        .map_err(|e| anyhow!("Failed to serialize balance: {}", e))?;
    let bonus = bincode::serialize(&state.bonus_claimed_on)
        .map_err(|e| anyhow!("Failed to serialize bonus marker: {}", e))?;

    // One batch so a reload never sees an item without its debit
    let entries = [
        (INVENTORY_KEY, inventory.as_slice()),
        (BALANCE_KEY, balance.as_slice()),
        (DAILY_BONUS_KEY, bonus.as_slice()),
    ];
    store.set_many(&entries).await?;
    Ok(())
}

/// Read a key; a failing read is recorded as a warning and returned as Err(())
async fn read_or_warn(
    store: &dyn KeyValueStore,
    key: &str,
    warnings: &mut Vec<CapsuleError>,
) -> Result<Option<Vec<u8>>, ()> {
    store.get(key).await.map_err(|e| {
        warnings.push(CapsuleError::Persistence(format!("reading {}: {}", key, e)));
    })
}

/// First present key among `keys`, decoded as text
async fn read_first_text(
    store: &dyn KeyValueStore,
    keys: &[&'static str],
    warnings: &mut Vec<CapsuleError>,
) -> Option<(&'static str, String)> {
    for key in keys {
        match store.get(key).await {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => return Some((key, text)),
                Err(e) => {
                    warnings.push(CapsuleError::MigrationParse {
                        key: key.to_string(),
                        reason: e.to_string(),
                    });
                    return None;
                }
            },
            Ok(None) => continue,
            Err(e) => {
                warnings.push(CapsuleError::Persistence(format!("reading legacy {}: {}", key, e)));
                return None;
            }
        }
    }
    None
}

fn parse_failure(key: &str, e: impl std::fmt::Display) -> CapsuleError {
    CapsuleError::MigrationParse {
        key: key.to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{ItemDescriptor, Rarity};

    const LEGACY_INVENTORY: &str = r#"[{"id":"abc","name":"Everyday · Cloud Plushie","rarity":"COMMON","imageUrl":"u","description":"d","timestamp":1700000000000}]"#;

    fn settings() -> PersistenceSettings {
        PersistenceSettings {
            debounce: Duration::from_millis(500),
            load_guard: Duration::from_millis(250),
            starting_balance: 1000,
        }
    }

    fn gateway(structured: &Arc<MemoryStore>, legacy: Option<&Arc<MemoryStore>>) -> PersistenceGateway {
        PersistenceGateway::new(
            structured.clone(),
            legacy.map(|l| l.clone() as Arc<dyn KeyValueStore>),
            settings(),
        )
    }

    fn sample_item(id: &str) -> OwnedItem {
        let mut item = OwnedItem::acquire(
            Rarity::Rare,
            "cloud",
            ItemDescriptor {
                image_ref: "img".into(),
                name: "Sweetheart · Cloud Charm".into(),
                description: "d".into(),
                scent: "s".into(),
                owner: "o".into(),
                magic_value: 120,
            },
        );
        item.id = id.to_string();
        item
    }

    fn snapshot(balance: u64, items: Vec<OwnedItem>) -> PersistedState {
        PersistedState {
            inventory: items,
            balance,
            bonus_claimed_on: None,
        }
    }

    async fn stored_balance(store: &MemoryStore) -> Option<u64> {
        let bytes = store.get(BALANCE_KEY).await.unwrap()?;
        Some(bincode::deserialize(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_fresh_load_uses_defaults() {
        let structured = Arc::new(MemoryStore::new());
        let mut gw = gateway(&structured, None);
        let report = gw.load().await.unwrap();

        assert_eq!(report.source, LoadSource::Fresh);
        assert_eq!(report.state, PersistedState::fresh(1000));
        assert!(report.warnings.is_empty());
        assert!(!gw.migrated());
        assert!(!structured.contains(BALANCE_KEY).await);
    }

    #[tokio::test]
    async fn test_legacy_migration_writes_through_once() {
        let structured = Arc::new(MemoryStore::new());
        let legacy = Arc::new(MemoryStore::with_entries([
            ("gacha_inventory", LEGACY_INVENTORY),
            ("gacha_currency", "640"),
        ]));

        let mut first = gateway(&structured, Some(&legacy));
        let report = first.load().await.unwrap();
        assert_eq!(report.source, LoadSource::Legacy);
        assert!(report.migrated);
        assert!(first.migrated());
        assert_eq!(report.state.balance, 640);
        assert_eq!(report.state.inventory.len(), 1);
        assert_eq!(stored_balance(&structured).await, Some(640));
        assert_eq!(structured.writes_for(INVENTORY_KEY).await, 1);

        // Second session: structured store wins, legacy is never read
        let legacy_reads = legacy.total_reads();
        let mut second = gateway(&structured, Some(&legacy));
        let report = second.load().await.unwrap();
        assert_eq!(report.source, LoadSource::Structured);
        assert!(!report.migrated);
        assert_eq!(report.state.balance, 640);
        assert_eq!(report.state.inventory[0].id, "abc");
        assert_eq!(legacy.total_reads(), legacy_reads);
        assert_eq!(structured.writes_for(INVENTORY_KEY).await, 1);

        // Legacy data is left in place
        assert!(legacy.contains("gacha_currency").await);
    }

    #[tokio::test]
    async fn test_one_structured_key_skips_legacy() {
        let structured = Arc::new(MemoryStore::new());
        structured
            .set(BALANCE_KEY, &bincode::serialize(&77u64).unwrap())
            .await
            .unwrap();
        let legacy = Arc::new(MemoryStore::with_entries([("balance", "5000")]));

        let mut gw = gateway(&structured, Some(&legacy));
        let report = gw.load().await.unwrap();
        assert_eq!(report.source, LoadSource::Structured);
        assert_eq!(report.state.balance, 77);
        assert!(report.state.inventory.is_empty());
        assert_eq!(legacy.total_reads(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_legacy_balance_defaults() {
        let structured = Arc::new(MemoryStore::new());
        let legacy = Arc::new(MemoryStore::with_entries([
            ("inventory", LEGACY_INVENTORY),
            ("balance", "a lot"),
        ]));

        let mut gw = gateway(&structured, Some(&legacy));
        let report = gw.load().await.unwrap();
        assert_eq!(report.state.balance, 1000);
        assert_eq!(report.state.inventory.len(), 1);
        assert!(matches!(
            report.warnings.as_slice(),
            [CapsuleError::MigrationParse { key, .. }] if key == "balance"
        ));
    }

    #[tokio::test]
    async fn test_corrupt_structured_inventory_defaults() {
        let structured = Arc::new(MemoryStore::new());
        structured.set(INVENTORY_KEY, &[0xff, 0x01]).await.unwrap();
        structured
            .set(BALANCE_KEY, &bincode::serialize(&300u64).unwrap())
            .await
            .unwrap();

        let mut gw = gateway(&structured, None);
        let report = gw.load().await.unwrap();
        assert!(report.state.inventory.is_empty());
        assert_eq!(report.state.balance, 300);
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_load_runs_once() {
        let structured = Arc::new(MemoryStore::new());
        let mut gw = gateway(&structured, None);
        gw.load().await.unwrap();
        assert!(matches!(gw.load().await, Err(CapsuleError::Persistence(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_commit_before_load() {
        let structured = Arc::new(MemoryStore::new());
        let mut gw = gateway(&structured, None);
        gw.schedule_commit(snapshot(1, vec![]));
        assert!(!gw.has_pending_commit());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(structured.writes_for(BALANCE_KEY).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_write() {
        let structured = Arc::new(MemoryStore::new());
        let mut gw = gateway(&structured, None);
        gw.load().await.unwrap();

        gw.schedule_commit(snapshot(900, vec![sample_item("a")]));
        tokio::time::sleep(Duration::from_millis(100)).await;
        gw.schedule_commit(snapshot(800, vec![sample_item("a"), sample_item("b")]));
        tokio::time::sleep(Duration::from_millis(100)).await;
        gw.schedule_commit(snapshot(820, vec![sample_item("a")]));

        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(structured.writes_for(BALANCE_KEY).await, 1);
        assert_eq!(structured.writes_for(INVENTORY_KEY).await, 1);
        assert_eq!(stored_balance(&structured).await, Some(820));
        assert_eq!(gw.commit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_waits_for_debounce() {
        let structured = Arc::new(MemoryStore::new());
        let mut gw = gateway(&structured, None);
        gw.load().await.unwrap();

        gw.schedule_commit(snapshot(900, vec![]));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(structured.writes_for(BALANCE_KEY).await, 0);
        assert!(gw.has_pending_commit());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(structured.writes_for(BALANCE_KEY).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_window_defers_commit() {
        let structured = Arc::new(MemoryStore::new());
        let mut gw = PersistenceGateway::new(
            structured.clone(),
            None,
            PersistenceSettings {
                debounce: Duration::from_millis(10),
                load_guard: Duration::from_millis(300),
                starting_balance: 1000,
            },
        );
        gw.load().await.unwrap();

        gw.schedule_commit(snapshot(5, vec![]));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(structured.writes_for(BALANCE_KEY).await, 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(stored_balance(&structured).await, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_commit_is_retried_by_next_change() {
        let structured = Arc::new(MemoryStore::new());
        let mut gw = gateway(&structured, None);
        gw.load().await.unwrap();

        structured.set_fail_writes(true);
        gw.schedule_commit(snapshot(900, vec![]));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(gw.failure_count(), 1);
        assert_eq!(stored_balance(&structured).await, None);

        structured.set_fail_writes(false);
        gw.schedule_commit(snapshot(880, vec![]));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(stored_balance(&structured).await, Some(880));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_cancels_pending_and_writes_now() {
        let structured = Arc::new(MemoryStore::new());
        let mut gw = gateway(&structured, None);
        gw.load().await.unwrap();

        gw.schedule_commit(snapshot(1, vec![]));
        gw.flush(&snapshot(2, vec![])).await.unwrap();
        assert_eq!(stored_balance(&structured).await, Some(2));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(structured.writes_for(BALANCE_KEY).await, 1);
        assert_eq!(stored_balance(&structured).await, Some(2));
    }

    #[tokio::test]
    async fn test_bonus_marker_survives_reload() {
        let structured = Arc::new(MemoryStore::new());
        let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();

        let mut gw = gateway(&structured, None);
        gw.load().await.unwrap();
        let mut state = snapshot(1500, vec![]);
        state.bonus_claimed_on = Some(day);
        gw.flush(&state).await.unwrap();

        let mut reloaded = gateway(&structured, None);
        let report = reloaded.load().await.unwrap();
        assert_eq!(report.state.bonus_claimed_on, Some(day));
        assert_eq!(report.state.balance, 1500);
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_leaves_previous_state() {
        let structured = Arc::new(MemoryStore::new());
        let mut gw = gateway(&structured, None);
        gw.load().await.unwrap();
        gw.flush(&snapshot(1000, vec![])).await.unwrap();

        structured.fail_writes_to(Some(BALANCE_KEY)).await;
        let after_draw = snapshot(900, vec![sample_item("drawn")]);
        assert!(matches!(gw.flush(&after_draw).await, Err(CapsuleError::Persistence(_))));
        structured.fail_writes_to(None).await;

        let mut reloaded = gateway(&structured, None);
        let report = reloaded.load().await.unwrap();
        assert_eq!(report.state.balance, 1000);
        assert!(report.state.inventory.is_empty());
    }

    #[tokio::test]
    async fn test_failed_migration_is_retried_on_next_load() {
        let structured = Arc::new(MemoryStore::new());
        let legacy = Arc::new(MemoryStore::with_entries([
            ("gacha_inventory", LEGACY_INVENTORY),
            ("gacha_currency", "5000"),
        ]));

        structured.fail_writes_to(Some(BALANCE_KEY)).await;
        let mut first = gateway(&structured, Some(&legacy));
        let report = first.load().await.unwrap();
        assert_eq!(report.source, LoadSource::Legacy);
        assert_eq!(report.state.balance, 5000);
        assert!(!report.migrated);
        assert!(!first.migrated());
        assert!(matches!(report.warnings.as_slice(), [CapsuleError::Persistence(_)]));
        assert!(!structured.contains(INVENTORY_KEY).await);

        structured.fail_writes_to(None).await;
        let mut second = gateway(&structured, Some(&legacy));
        let report = second.load().await.unwrap();
        assert_eq!(report.source, LoadSource::Legacy);
        assert!(report.migrated);
        assert_eq!(report.state.balance, 5000);
        assert_eq!(report.state.inventory.len(), 1);
        assert_eq!(stored_balance(&structured).await, Some(5000));
    }
}
