//! # Ledger Client Adapter
//!
//! Everything the orchestrator needs from a ledger node, behind one trait.
//! [`AlgodClient`] talks to a real node over HTTP; the contracts crate
//! provides an in-memory implementation that executes the programs.

pub mod algod;

pub use algod::AlgodClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::account::Address;
use crate::config::{KEY_BORROWED_AMOUNT, KEY_BORROW_LIMIT, KEY_REPUTATION_SCORE};
use crate::error::Result;
use crate::program::CompiledProgram;
use crate::transaction::{SignedTransaction, SuggestedParams};

/// What the node knows about a submitted transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfo {
    /// Zero while still in the pool.
    pub confirmed_round: u64,
    /// Non-empty once the node has dropped the transaction.
    pub pool_error: String,
    /// Set on a confirmed application creation.
    pub application_index: Option<u64>,
}

impl PendingInfo {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_round > 0
    }
}

/// An account's local state in the lending application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    pub reputation_score: u64,
    pub borrowed_amount: u64,
    pub borrow_limit: u64,
}

impl LocalState {
    /// Build from `(key, uint)` pairs. Unknown keys are ignored and missing
    /// keys read as zero, matching what the program sees.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        let mut state = Self::default();
        for (key, value) in pairs {
            match key {
                KEY_REPUTATION_SCORE => state.reputation_score = value,
                KEY_BORROWED_AMOUNT => state.borrowed_amount = value,
                KEY_BORROW_LIMIT => state.borrow_limit = value,
                _ => {}
            }
        }
        state
    }

    /// How much more this account may borrow before the on-chain cap.
    pub fn headroom(&self) -> u64 {
        self.borrow_limit.saturating_sub(self.borrowed_amount)
    }
}

/// The remote node, as seen by the orchestrator.
///
/// Implementations must be safe to share across tasks; every method is a
/// single request with no client-side retry.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Compile program source. The returned address must be the hash of the
    /// returned bytecode.
    async fn compile(&self, source: &str) -> Result<CompiledProgram>;

    async fn suggested_params(&self) -> Result<SuggestedParams>;

    /// Submit one transaction or one atomic group. Returns the id of the
    /// first transaction.
    async fn submit(&self, group: &[SignedTransaction]) -> Result<String>;

    async fn pending_info(&self, tx_id: &str) -> Result<PendingInfo>;

    /// `None` when the account has not opted in.
    async fn account_application_state(
        &self,
        address: &Address,
        app_id: u64,
    ) -> Result<Option<LocalState>>;

    async fn current_round(&self) -> Result<u64>;

    /// Block until the ledger has reached at least `round`. Returns the
    /// latest round at wake-up.
    async fn await_round(&self, round: u64) -> Result<u64>;

    /// Balance in minor units.
    async fn account_balance(&self, address: &Address) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_state_from_pairs() {
        let state = LocalState::from_pairs([
            ("reputation_score", 1),
            ("borrowed_amount", 3_000_000),
            ("borrow_limit", 5_000_000),
            ("something_else", 99),
        ]);
        assert_eq!(state.reputation_score, 1);
        assert_eq!(state.borrowed_amount, 3_000_000);
        assert_eq!(state.headroom(), 2_000_000);
    }

    #[test]
    fn missing_keys_read_as_zero() {
        let state = LocalState::from_pairs([]);
        assert_eq!(state, LocalState::default());
        assert_eq!(state.headroom(), 0);
    }

    #[test]
    fn pending_confirmation_flag() {
        let mut info = PendingInfo::default();
        assert!(!info.is_confirmed());
        info.confirmed_round = 12;
        assert!(info.is_confirmed());
    }
}
