//! ============================================================================
//! Capsule Session - Draw, sell and bonus orchestration
//! ============================================================================
//! Owns one player's ledger, inventory and persistence gateway. There is no
//! global state: each session is an independent context object.
//!
//! Draw lifecycle:
//!   Idle -> Drafting -> AwaitingGeneration -> Settled | Failed -> Idle
//!
//! Drafting (rarity and slot) runs under the state lock, so callers only
//! ever observe Idle or AwaitingGeneration.
//!
//! Coins are only debited once the provider has delivered, so a failed or
//! timed out generation is always free. At most one draw is in flight; a
//! second request while awaiting generation is rejected, not queued. A draw
//! whose future is dropped mid-generation is abandoned without cost and the
//! session returns to Idle.
//! ============================================================================

use chrono::{Local, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::CapsuleConfig;
use crate::draw::DrawEngine;
use crate::economy::Ledger;
use crate::generator::{provider_from_config, GenerationProvider};
use crate::inventory::{CompletionStatus, Inventory};
use crate::persistence::{LoadReport, PersistedState, PersistenceGateway, PersistenceSettings};
use crate::store::{KeyValueStore, LegacyFileStore, RedbStore};
use crate::types::{CapsuleError, OwnedItem, Rarity, SessionEvent, DRAW_COST};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Where the draw state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawPhase {
    Idle,
    AwaitingGeneration,
}

/// Result of a daily bonus claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusOutcome {
    Claimed { amount: u64, balance: u64 },
    AlreadyClaimed,
}

/// Session tuning that does not belong to persistence
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub catalog: Catalog,
    pub daily_bonus: u64,
    pub generation_timeout: Duration,
    pub seed: Option<u64>,
}

impl From<&CapsuleConfig> for SessionOptions {
    fn from(config: &CapsuleConfig) -> Self {
        Self {
            catalog: Catalog::builtin().clone(),
            daily_bonus: config.daily_bonus,
            generation_timeout: config.generation_timeout(),
            seed: config.seed,
        }
    }
}

/// Marks a draw as in flight; clears the mark however the draw ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn arm(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct SessionState {
    ledger: Ledger,
    inventory: Inventory,
    bonus_claimed_on: Option<NaiveDate>,
    gateway: PersistenceGateway,
    rng: StdRng,
}

impl SessionState {
    fn snapshot(&self) -> PersistedState {
        PersistedState {
            inventory: self.inventory.items().to_vec(),
            balance: self.ledger.balance(),
            bonus_claimed_on: self.bonus_claimed_on,
        }
    }

    fn schedule_persist(&mut self) {
        let snapshot = self.snapshot();
        self.gateway.schedule_commit(snapshot);
    }
}

/// One player's game session
pub struct CapsuleSession {
    catalog: Catalog,
    engine: DrawEngine,
    provider: Arc<dyn GenerationProvider>,
    daily_bonus: u64,
    generation_timeout: Duration,
    events: broadcast::Sender<SessionEvent>,
    drawing: AtomicBool,
    state: Mutex<SessionState>,
}

impl CapsuleSession {
    /// Run the load protocol on `gateway` and start a session from its result
    pub async fn open(
        mut gateway: PersistenceGateway,
        provider: Arc<dyn GenerationProvider>,
        options: SessionOptions,
    ) -> Result<(Self, LoadReport), CapsuleError> {
        let engine = DrawEngine::new(&options.catalog)?;
        let report = gateway.load().await?;

        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let state = SessionState {
            ledger: Ledger::new(report.state.balance),
            inventory: Inventory::from_items(report.state.inventory.clone()),
            bonus_claimed_on: report.state.bonus_claimed_on,
            gateway,
            rng,
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            "Session open: {} coins, {} items",
            state.ledger.balance(),
            state.inventory.len()
        );

        Ok((
            Self {
                catalog: options.catalog,
                engine,
                provider,
                daily_bonus: options.daily_bonus,
                generation_timeout: options.generation_timeout,
                events,
                drawing: AtomicBool::new(false),
                state: Mutex::new(state),
            },
            report,
        ))
    }

    /// Open a session on the configured redb and legacy files with the configured provider
    pub async fn open_with_config(config: &CapsuleConfig) -> Result<(Self, LoadReport), CapsuleError> {
        let structured: Arc<dyn KeyValueStore> = Arc::new(
            RedbStore::open(config.db_path.as_deref())
                .map_err(|e| CapsuleError::Persistence(e.to_string()))?,
        );
        let legacy = config
            .legacy_path
            .as_ref()
            .map(|path| Arc::new(LegacyFileStore::new(path.clone())) as Arc<dyn KeyValueStore>);

        let gateway = PersistenceGateway::new(structured, legacy, PersistenceSettings::from(config));
        Self::open(gateway, provider_from_config(config), SessionOptions::from(config)).await
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Receive presentation events from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn phase(&self) -> DrawPhase {
        if self.drawing.load(Ordering::SeqCst) {
            DrawPhase::AwaitingGeneration
        } else {
            DrawPhase::Idle
        }
    }

    pub async fn balance(&self) -> u64 {
        self.state.lock().await.ledger.balance()
    }

    pub async fn inventory(&self) -> Inventory {
        self.state.lock().await.inventory.clone()
    }

    pub async fn sorted_view(&self, filter: Option<Rarity>) -> Vec<OwnedItem> {
        self.state.lock().await.inventory.sorted_view(filter)
    }

    pub async fn completion_status(&self) -> CompletionStatus {
        self.state.lock().await.inventory.completion_status(self.catalog.slots())
    }

    pub async fn snapshot(&self) -> PersistedState {
        self.state.lock().await.snapshot()
    }

    /// Pay for and draw one item
    pub async fn draw(&self) -> Result<OwnedItem, CapsuleError> {
        let (rarity, slot, in_flight) = {
            let mut state = self.state.lock().await;
            if self.phase() != DrawPhase::Idle {
                debug!("Draw rejected: another draw is in flight");
                return Err(CapsuleError::DrawInProgress);
            }
            if !state.ledger.can_afford(DRAW_COST) {
                return Err(CapsuleError::InsufficientFunds {
                    needed: DRAW_COST,
                    available: state.ledger.balance(),
                });
            }

            let (rarity, slot) = self.engine.draw(&mut state.rng);
            (rarity, slot.clone(), InFlight::arm(&self.drawing))
        };

        self.emit(SessionEvent::DrawStarted);
        debug!("Drawing {} from slot {}", rarity, slot.slot_id);

        let generated = tokio::time::timeout(self.generation_timeout, self.provider.generate(rarity, &slot)).await;

        let mut state = self.state.lock().await;
        drop(in_flight);

        let descriptor = match generated {
            Ok(Ok(descriptor)) => descriptor,
            Ok(Err(e)) => return Err(self.fail_draw(e.to_string())),
            Err(_) => {
                return Err(self.fail_draw(format!(
                    "generation timed out after {}s",
                    self.generation_timeout.as_secs()
                )))
            }
        };

        // Only credits can have happened while awaiting, so the cost is still covered
        let item = OwnedItem::acquire(rarity, &slot.slot_id, descriptor);
        state.inventory.add(item.clone());
        state.ledger.debit(DRAW_COST);
        state.schedule_persist();

        info!("Drew {} '{}' ({})", item.rarity, item.name, slot.slot_id);
        self.emit(SessionEvent::DrawSettled { item: item.clone() });
        Ok(item)
    }

    fn fail_draw(&self, reason: String) -> CapsuleError {
        warn!("Draw failed, no coins taken: {}", reason);
        self.emit(SessionEvent::DrawFailed {
            reason: reason.clone(),
        });
        CapsuleError::Generation(reason)
    }

    /// Sell an owned item. Returns the coins credited, or None if nothing
    /// with that id is owned.
    pub async fn sell(&self, id: &str) -> Option<u64> {
        let mut state = self.state.lock().await;
        let Some(item) = state.inventory.remove_by_id(id) else {
            debug!("Sell ignored: no item {}", id);
            return None;
        };

        let credited = item.sell_value();
        state.ledger.credit(credited);
        state.schedule_persist();

        info!("Sold {} '{}' for {}", item.rarity, item.name, credited);
        self.emit(SessionEvent::SoldItem {
            id: item.id,
            credited,
        });
        Some(credited)
    }

    /// Claim today's bonus
    pub async fn claim_daily_bonus(&self) -> BonusOutcome {
        self.claim_daily_bonus_on(Local::now().date_naive()).await
    }

    /// Claim the bonus for a given day. Once per day.
    pub async fn claim_daily_bonus_on(&self, day: NaiveDate) -> BonusOutcome {
        let mut state = self.state.lock().await;
        if state.bonus_claimed_on == Some(day) {
            self.emit(SessionEvent::BonusAlreadyClaimed);
            return BonusOutcome::AlreadyClaimed;
        }

        state.bonus_claimed_on = Some(day);
        let balance = state.ledger.credit(self.daily_bonus);
        state.schedule_persist();

        info!("Daily bonus claimed: +{}", self.daily_bonus);
        self.emit(SessionEvent::BonusClaimed {
            amount: self.daily_bonus,
        });
        BonusOutcome::Claimed {
            amount: self.daily_bonus,
            balance,
        }
    }

    /// Whether a debounced commit is still waiting to be written
    pub async fn has_pending_commit(&self) -> bool {
        self.state.lock().await.gateway.has_pending_commit()
    }

    /// Write the current state now instead of waiting for the debounce
    pub async fn flush(&self) -> Result<(), CapsuleError> {
        let mut state = self.state.lock().await;
        let snapshot = state.snapshot();
        state.gateway.flush(&snapshot).await
    }
}
