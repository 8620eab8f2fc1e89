// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CampusTrust Protocol
//!
//! The ledger protocol layer of CampusTrust: a peer lending pool whose rules
//! are enforced by on-chain programs, not by the backend that drives it.
//!
//! ## Architecture
//!
//! - **account**: Ed25519 accounts, 25-word recovery phrases, addresses.
//! - **program**: Source for the lending application, its clear program
//!   and the escrow guard; compiled programs and their addresses.
//! - **transaction**: Canonical encoding, atomic groups, key and logic
//!   signatures.
//! - **ledger**: The node adapter trait and its HTTP implementation.
//! - **confirmation**: Bounded wait for a submitted transaction.
//! - **orchestrator**: contribute / borrow / repay / opt-in as correctly
//!   shaped, correctly signed groups.
//! - **config**: Protocol constants and configuration resolvers.
//! - **error**: The error taxonomy.
//!
//! ## Security Model
//!
//! The backend is not trusted with lending rules. The application program
//! caps each borrower and checks pool solvency; the escrow releases funds
//! only as the second half of a group whose first half is a call to that
//! application by the payee. A backend bug can fail to build a valid group,
//! but it cannot pay out around the caps.
//!
//! Key material is accepted per call and never stored or logged.

pub mod account;
pub mod config;
pub mod confirmation;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod program;
pub mod transaction;

pub use account::{Account, Address};
pub use error::{LedgerError, RejectedCheck, Result};
pub use ledger::{AlgodClient, LedgerClient, LocalState, PendingInfo};
pub use orchestrator::{
    AccountStatus, Deployment, OperationReceipt, Orchestrator, OrchestratorSettings,
};
