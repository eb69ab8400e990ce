//! ============================================================================
//! Economy Ledger - Coin balance and transactions
//! ============================================================================
//! The balance never goes below zero. Debits clamp instead of failing, so
//! callers on the draw path must check `can_afford` first.
//! ============================================================================

use tracing::debug;

/// Coin balance with clamped debits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ledger {
    balance: u64,
}

impl Ledger {
    pub fn new(balance: u64) -> Self {
        Self { balance }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn can_afford(&self, cost: u64) -> bool {
        self.balance >= cost
    }

    /// Subtract `cost`, clamping at zero. Returns the new balance.
    pub fn debit(&mut self, cost: u64) -> u64 {
        self.balance = self.balance.saturating_sub(cost);
        debug!("Debited {} coins, balance now {}", cost, self.balance);
        self.balance
    }

    /// Add `amount`. Returns the new balance.
    pub fn credit(&mut self, amount: u64) -> u64 {
        self.balance = self.balance.saturating_add(amount);
        debug!("Credited {} coins, balance now {}", amount, self.balance);
        self.balance
    }
}
