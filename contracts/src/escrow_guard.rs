//! # Escrow Guard
//!
//! The escrow program's checks as a pure validator over a transaction
//! group. The escrow approves its payment only when all of these hold, in
//! this order:
//!
//! 1. the group has exactly two transactions;
//! 2. the payment is at index 1;
//! 3. index 0 is an application call
//! 4. to the bound application id;
//! 5. the call's sender is the payment's receiver;
//! 6. the escrow's transaction is a payment;
//! 7. it sets neither rekey-to nor close-remainder-to.
//!
//! The guard knows nothing about amounts or caps. Those belong to the
//! application, and atomicity makes its verdict binding on the payment.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use campustrust_protocol::transaction::Transaction;
use campustrust_protocol::Address;

/// The first check that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GuardViolation {
    #[error("group size is {0}, expected 2")]
    GroupSize(usize),

    #[error("escrow transaction is at index {0}, expected 1")]
    Index(usize),

    #[error("transaction 0 is not an application call")]
    NotApplicationCall,

    #[error("transaction 0 calls application {found}, expected {expected}")]
    WrongApplication { expected: u64, found: u64 },

    #[error("payment receiver is not the application caller")]
    ReceiverMismatch,

    #[error("escrow transaction is not a payment")]
    NotPayment,

    #[error("rekey-to is set")]
    RekeyTo,

    #[error("close-remainder-to is set")]
    CloseRemainderTo,
}

/// Evaluate the guard for `group[index]`, bound to `application_id`.
pub fn evaluate(
    group: &[Transaction],
    index: usize,
    application_id: u64,
) -> Result<(), GuardViolation> {
    if group.len() != 2 {
        return Err(GuardViolation::GroupSize(group.len()));
    }
    if index != 1 {
        return Err(GuardViolation::Index(index));
    }

    let call = group[0]
        .as_application_call()
        .ok_or(GuardViolation::NotApplicationCall)?;
    if call.app_id != application_id {
        return Err(GuardViolation::WrongApplication {
            expected: application_id,
            found: call.app_id,
        });
    }

    let this = &group[1];
    // A non-payment has no receiver; the program reads the zero address.
    let receiver = this
        .as_payment()
        .map(|p| p.receiver)
        .unwrap_or(Address::ZERO);
    if group[0].sender != receiver {
        return Err(GuardViolation::ReceiverMismatch);
    }
    let payment = this.as_payment().ok_or(GuardViolation::NotPayment)?;

    if this.rekey_to.is_some_and(|a| !a.is_zero()) {
        return Err(GuardViolation::RekeyTo);
    }
    if payment.close_remainder_to.is_some_and(|a| !a.is_zero()) {
        return Err(GuardViolation::CloseRemainderTo);
    }
    Ok(())
}
