//! Core value types for ledger transactions.
//!
//! Small and `Copy`-friendly where possible. The on-wire numbering of
//! [`OnComplete`] is fixed by the ledger and must not be reordered.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::Address;

// ---------------------------------------------------------------------------
// TransactionType
// ---------------------------------------------------------------------------

/// The two transaction types this crate builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Payment,
    ApplicationCall,
}

impl TransactionType {
    /// Wire tag written under the `type` key.
    pub fn wire_tag(&self) -> &'static str {
        match self {
            Self::Payment => "pay",
            Self::ApplicationCall => "appl",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_tag())
    }
}

// ---------------------------------------------------------------------------
// OnComplete
// ---------------------------------------------------------------------------

/// What an application call does to the caller's relationship with the
/// application after the approval program runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OnComplete {
    NoOp = 0,
    OptIn = 1,
    CloseOut = 2,
    ClearState = 3,
    UpdateApplication = 4,
    DeleteApplication = 5,
}

impl OnComplete {
    pub fn as_u64(self) -> u64 {
        self as u64
    }
}

impl fmt::Display for OnComplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp => write!(f, "NoOp"),
            Self::OptIn => write!(f, "OptIn"),
            Self::CloseOut => write!(f, "CloseOut"),
            Self::ClearState => write!(f, "ClearState"),
            Self::UpdateApplication => write!(f, "UpdateApplication"),
            Self::DeleteApplication => write!(f, "DeleteApplication"),
        }
    }
}

// ---------------------------------------------------------------------------
// StateSchema
// ---------------------------------------------------------------------------

/// Storage reserved by an application, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateSchema {
    pub num_uints: u64,
    pub num_byte_slices: u64,
}

impl StateSchema {
    pub fn uints(num_uints: u64) -> Self {
        Self {
            num_uints,
            num_byte_slices: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Kind-specific fields
// ---------------------------------------------------------------------------

/// Fields that only exist on a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub receiver: Address,
    /// Minor units.
    pub amount: u64,
    /// Never set by this crate; the escrow refuses it.
    pub close_remainder_to: Option<Address>,
}

/// Fields that only exist on an application call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationCall {
    /// Zero on the creation call.
    pub app_id: u64,
    pub on_complete: OnComplete,
    pub args: Vec<Vec<u8>>,
    /// Extra accounts the program may read. Slot 0 is always the sender, so
    /// the first entry here is slot 1.
    pub accounts: Vec<Address>,
    pub approval_program: Vec<u8>,
    pub clear_program: Vec<u8>,
    pub global_schema: Option<StateSchema>,
    pub local_schema: Option<StateSchema>,
}

impl ApplicationCall {
    pub fn is_create(&self) -> bool {
        self.app_id == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    Payment(Payment),
    ApplicationCall(ApplicationCall),
}

impl TransactionKind {
    pub fn tx_type(&self) -> TransactionType {
        match self {
            Self::Payment(_) => TransactionType::Payment,
            Self::ApplicationCall(_) => TransactionType::ApplicationCall,
        }
    }
}

// ---------------------------------------------------------------------------
// SuggestedParams
// ---------------------------------------------------------------------------

/// Network parameters a node suggests for new transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedParams {
    /// Per-byte fee. Usually zero outside congestion.
    pub fee_per_byte: u64,
    pub min_fee: u64,
    /// The node's latest round; used as the first valid round.
    pub last_round: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
}

impl SuggestedParams {
    pub fn first_valid(&self) -> u64 {
        self.last_round
    }

    pub fn last_valid(&self) -> u64 {
        self.last_round
            .saturating_add(crate::config::VALIDITY_WINDOW_ROUNDS)
    }
}
