//! # Transaction Module
//!
//! Construction, encoding, grouping and authorization of ledger
//! transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs     Kind-specific fields, OnComplete, SuggestedParams
//! encoding.rs  Canonical MessagePack (sorted keys, empty fields omitted)
//! builder.rs   Transaction + fluent TransactionBuilder (fee computation)
//! group.rs     Atomic group ids
//! signing.rs   Authorization (key signature or logic signature), group signing
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: [`TransactionBuilder`] with the node's [`SuggestedParams`].
//! 2. **Group**: [`assign_group_id`] when more than one transaction must
//!    commit atomically.
//! 3. **Sign**: [`sign_group`] pairs each transaction with a [`Signer`].
//! 4. **Submit**: hand the [`SignedTransaction`]s to a
//!    [`LedgerClient`](crate::ledger::LedgerClient).
//!
//! ## Design Decisions
//!
//! - Ids and signatures are over the canonical encoding only; the
//!   authorization never feeds back into the id.
//! - All amounts are `u64` minor units. No floating point anywhere near
//!   monetary values.

pub mod builder;
pub mod encoding;
pub mod group;
pub mod signing;
pub mod types;

pub use builder::{Transaction, TransactionBuilder};
pub use group::{assign_group_id, compute_group_id};
pub use signing::{
    encode_group, sign_group, sign_transaction, Authorization, SignedTransaction, Signer,
};
pub use types::{
    ApplicationCall, OnComplete, Payment, StateSchema, SuggestedParams, TransactionKind,
    TransactionType,
};
