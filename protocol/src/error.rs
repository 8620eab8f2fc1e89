//! Error taxonomy for the ledger protocol layer.
//!
//! Local validation failures (configuration, recovery phrases, addresses)
//! are raised before anything touches the network. Node-reported failures
//! are classified from the node's message text, because that is all the
//! node gives us.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::mnemonic::MnemonicError;

/// Result type for every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Which on-chain check turned a group down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectedCheck {
    /// `borrowed_amount + requested > borrow_limit`.
    BorrowLimit,
    /// `requested > escrow balance`.
    PoolSolvency,
    /// The escrow's structural guard refused its half of the group.
    EscrowGuard,
    /// The application refused without saying which check failed.
    ApprovalProgram,
    /// Rejected, but the message matched nothing we recognize.
    Unknown,
}

impl RejectedCheck {
    /// Best-effort classification of a node rejection message.
    pub fn from_message(message: &str) -> Self {
        let msg = message.to_lowercase();
        if msg.contains("borrow limit") {
            RejectedCheck::BorrowLimit
        } else if msg.contains("pool balance") || msg.contains("solvency") {
            RejectedCheck::PoolSolvency
        } else if msg.contains("rejected by logic") || msg.contains("escrow guard") {
            RejectedCheck::EscrowGuard
        } else if msg.contains("approvalprogram") || msg.contains("logic eval") {
            RejectedCheck::ApprovalProgram
        } else {
            RejectedCheck::Unknown
        }
    }
}

impl fmt::Display for RejectedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectedCheck::BorrowLimit => write!(f, "borrow limit"),
            RejectedCheck::PoolSolvency => write!(f, "pool solvency"),
            RejectedCheck::EscrowGuard => write!(f, "escrow guard"),
            RejectedCheck::ApprovalProgram => write!(f, "approval program"),
            RejectedCheck::Unknown => write!(f, "unknown check"),
        }
    }
}

/// Everything that can go wrong between a caller's intent and a confirmed
/// transaction.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The recovery phrase does not decode to a key. The inner error never
    /// echoes any word of the phrase.
    #[error("invalid recovery phrase: {0}")]
    InvalidRecoveryPhrase(#[from] MnemonicError),

    #[error("invalid ledger address: {0}")]
    InvalidAddress(String),

    #[error("pool wallet not configured: POOL_ADDRESS is missing or empty")]
    MissingPoolAddress,

    #[error("pool wallet not configured: POOL_MNEMONIC is missing or empty")]
    MissingPoolPhrase,

    #[error("POOL_ADDRESS is not a valid ledger address")]
    InvalidPoolAddress,

    #[error("lending application id is not configured: LENDING_APP_ID must be a positive integer")]
    MissingApplicationId,

    #[error("insufficient balance in sender account: {0}")]
    InsufficientSenderBalance(String),

    #[error("account not found on the ledger (probably unfunded): {0}")]
    AccountNotFound(String),

    #[error("network error while contacting the ledger node: {0}")]
    Network(String),

    /// Indeterminate: the transaction may still confirm later.
    #[error("transaction {tx_id} not confirmed after {rounds} rounds; it may still confirm later")]
    ConfirmationTimeout { tx_id: String, rounds: u64 },

    #[error("rejected on-chain by {check}: {reason}")]
    ApplicationRejected { check: RejectedCheck, reason: String },

    #[error("node error {status}: {message}")]
    Node { status: u16, message: String },

    #[error("failed to parse node response: {0}")]
    ParseResponse(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("deployment failed: {0}")]
    Deployment(String),

    #[error("transaction construction failed: {0}")]
    Construction(String),
}

impl LedgerError {
    /// Wrap a node rejection reason, classifying the failed check.
    pub fn rejected(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        LedgerError::ApplicationRejected {
            check: RejectedCheck::from_message(&reason),
            reason,
        }
    }

    /// True only for outcomes that might still succeed without resubmission.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, LedgerError::ConfirmationTimeout { .. })
    }
}

/// Map a node error message onto the taxonomy.
///
/// The node reports everything as free text; these substrings are the
/// stable parts of its messages.
pub fn classify_node_message(status: u16, message: &str) -> LedgerError {
    let lower = message.to_lowercase();

    if lower.contains("overspend") || lower.contains("underflow") {
        return LedgerError::InsufficientSenderBalance(message.to_string());
    }
    if lower.contains("could not find account") || lower.contains("no such account") {
        return LedgerError::AccountNotFound(message.to_string());
    }
    if lower.contains("rejected by logic")
        || lower.contains("approvalprogram")
        || lower.contains("logic eval")
    {
        return LedgerError::rejected(message);
    }
    if lower.contains("network") || lower.contains("econn") {
        return LedgerError::Network(message.to_string());
    }

    LedgerError::Node {
        status,
        message: message.to_string(),
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LedgerError::ParseResponse(err.to_string())
        } else {
            LedgerError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_overspend() {
        let err = classify_node_message(
            400,
            "TransactionPool.Remember: transaction ABC: overspend (account XYZ, data {...})",
        );
        assert!(matches!(err, LedgerError::InsufficientSenderBalance(_)));
    }

    #[test]
    fn classifies_missing_account() {
        let err = classify_node_message(404, "could not find account");
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }

    #[test]
    fn classifies_escrow_rejection() {
        let err = classify_node_message(
            400,
            "transaction DEF: rejected by logic err=err opcode executed pc=12",
        );
        match err {
            LedgerError::ApplicationRejected { check, .. } => {
                assert_eq!(check, RejectedCheck::EscrowGuard)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn classifies_application_rejection() {
        let err = classify_node_message(400, "transaction rejected by ApprovalProgram");
        match err {
            LedgerError::ApplicationRejected { check, .. } => {
                assert_eq!(check, RejectedCheck::ApprovalProgram)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn refines_named_checks() {
        assert_eq!(
            RejectedCheck::from_message("rejected by ApprovalProgram: borrow limit exceeded"),
            RejectedCheck::BorrowLimit
        );
        assert_eq!(
            RejectedCheck::from_message("rejected by ApprovalProgram: insufficient pool balance"),
            RejectedCheck::PoolSolvency
        );
        assert_eq!(RejectedCheck::from_message("???"), RejectedCheck::Unknown);
    }

    #[test]
    fn unknown_messages_stay_node_errors() {
        let err = classify_node_message(500, "something odd happened");
        assert!(matches!(err, LedgerError::Node { status: 500, .. }));
    }

    #[test]
    fn only_timeouts_are_indeterminate() {
        let timeout = LedgerError::ConfirmationTimeout {
            tx_id: "X".into(),
            rounds: 6,
        };
        assert!(timeout.is_indeterminate());
        assert!(!LedgerError::rejected("rejected by logic").is_indeterminate());
    }
}
