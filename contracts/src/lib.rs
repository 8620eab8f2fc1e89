//! # CampusTrust Contracts
//!
//! What the on-chain programs do, expressed as plain Rust so it can be
//! tested without a node:
//!
//! - **Lending Application**: the approval program as a pure transition
//!   function over per-account local state and the global pool balance.
//! - **Escrow Guard**: the stateless program guarding pooled funds, as a
//!   validator over a transaction group.
//! - **Simulated Ledger**: an in-memory `LedgerClient` that runs both, with
//!   atomic group commit and rollback, so the orchestrator can be driven
//!   end to end.
//!
//! ## Design Principles
//!
//! 1. Amounts are `u64` minor units and every addition is checked; an
//!    overflow is a rejection, as it is on-chain.
//! 2. Verdicts are enums with a reason, never bare booleans.
//! 3. A rejected group changes nothing. The simulator evaluates on a copy
//!    of the ledger state and swaps it in only on success.

pub mod escrow_guard;
pub mod lending_app;
pub mod simulator;

pub use escrow_guard::GuardViolation;
pub use lending_app::{AppEvent, AppState, GlobalState, Outcome, Rejection, Verdict};
pub use simulator::SimulatedLedger;
