//! # Lending Application
//!
//! The approval program's semantics as a pure transition function,
//! `(state, event) -> (state', verdict)`. The simulated ledger runs every
//! application call through [`apply`]; tests can also call it directly
//! without any ledger at all.
//!
//! Per account the application is either not opted in (no local state) or
//! opted in with `{reputation_score, borrowed_amount, borrow_limit}`.
//! Only OptIn and NoOp completions are accepted; ClearState is handled by
//! the clear program, which always approves.
//!
//! A borrow runs two checks, in order:
//!
//! 1. `borrowed_amount + requested <= borrow_limit`
//! 2. `requested <= escrow balance`
//!
//! Between them the escrow balance is written to the global
//! `total_pool_balance`. That write is part of the resulting state even
//! when check 2 fails; whoever commits state must drop it along with
//! everything else on rejection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use campustrust_protocol::config::{BORROW_LIMIT, BORROW_METHOD, INITIAL_REPUTATION};
use campustrust_protocol::transaction::OnComplete;
use campustrust_protocol::LocalState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Global state of the application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    /// Escrow balance as last seen by a borrow attempt.
    pub total_pool_balance: u64,
}

/// Everything one call can read or write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub global: GlobalState,
    /// The caller's local state; `None` when not opted in.
    pub local: Option<LocalState>,
}

/// One application call, as the program sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The creation call (application id zero).
    Create,
    /// A call with the given on-completion.
    Call {
        on_complete: OnComplete,
        args: Vec<Vec<u8>>,
        /// Balance of the account in slot 1, if the call supplied one.
        escrow_balance: Option<u64>,
    },
}

impl AppEvent {
    /// A `borrow` NoOp call for `amount`, with the escrow holding `escrow_balance`.
    pub fn borrow(amount: u64, escrow_balance: u64) -> Self {
        AppEvent::Call {
            on_complete: OnComplete::NoOp,
            args: vec![BORROW_METHOD.as_bytes().to_vec(), amount.to_be_bytes().to_vec()],
            escrow_balance: Some(escrow_balance),
        }
    }

    pub fn opt_in() -> Self {
        AppEvent::Call {
            on_complete: OnComplete::OptIn,
            args: Vec::new(),
            escrow_balance: None,
        }
    }

    pub fn clear_state() -> Self {
        AppEvent::Call {
            on_complete: OnComplete::ClearState,
            args: Vec::new(),
            escrow_balance: None,
        }
    }
}

/// Why the program refused a call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Rejection {
    #[error("borrow limit exceeded: {borrowed} borrowed + {requested} requested > {limit}")]
    BorrowLimitExceeded {
        borrowed: u64,
        requested: u64,
        limit: u64,
    },

    #[error("insufficient pool balance: requested {requested}, escrow holds {balance}")]
    InsufficientPoolBalance { requested: u64, balance: u64 },

    #[error("unknown method")]
    UnknownMethod,

    #[error("malformed borrow amount argument")]
    MalformedAmount,

    #[error("on-completion {0} is not accepted")]
    UnsupportedCompletion(OnComplete),

    #[error("caller is not opted in")]
    NotOptedIn,

    #[error("no escrow account supplied")]
    MissingEscrowAccount,

    #[error("arithmetic overflow")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }
}

/// Result of running one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The program's output state. Meaningful to commit only when approved.
    pub state: AppState,
    pub verdict: Verdict,
}

impl Outcome {
    fn approve(state: AppState) -> Self {
        Self {
            state,
            verdict: Verdict::Approved,
        }
    }

    fn reject(state: AppState, rejection: Rejection) -> Self {
        Self {
            state,
            verdict: Verdict::Rejected(rejection),
        }
    }
}

// ---------------------------------------------------------------------------
// Transition function
// ---------------------------------------------------------------------------

/// Local state written at opt-in.
pub fn initial_local_state() -> LocalState {
    LocalState {
        reputation_score: INITIAL_REPUTATION,
        borrowed_amount: 0,
        borrow_limit: BORROW_LIMIT,
    }
}

/// Run one call against `state`.
pub fn apply(state: AppState, event: &AppEvent) -> Outcome {
    match event {
        AppEvent::Create => Outcome::approve(state),
        AppEvent::Call {
            on_complete,
            args,
            escrow_balance,
        } => match on_complete {
            OnComplete::OptIn => Outcome::approve(AppState {
                local: Some(initial_local_state()),
                ..state
            }),
            OnComplete::NoOp => handle_noop(state, args, *escrow_balance),
            // The clear program approves unconditionally and the ledger
            // discards local state whatever it returns.
            OnComplete::ClearState => Outcome::approve(AppState {
                local: None,
                ..state
            }),
            other => Outcome::reject(state, Rejection::UnsupportedCompletion(*other)),
        },
    }
}

fn handle_noop(state: AppState, args: &[Vec<u8>], escrow_balance: Option<u64>) -> Outcome {
    if args.first().map(Vec::as_slice) != Some(BORROW_METHOD.as_bytes()) {
        return Outcome::reject(state, Rejection::UnknownMethod);
    }
    let Some(requested) = args.get(1).and_then(|a| btoi(a)) else {
        return Outcome::reject(state, Rejection::MalformedAmount);
    };
    let Some(local) = state.local else {
        return Outcome::reject(state, Rejection::NotOptedIn);
    };

    let Some(total) = local.borrowed_amount.checked_add(requested) else {
        return Outcome::reject(state, Rejection::Overflow);
    };
    if total > local.borrow_limit {
        return Outcome::reject(
            state,
            Rejection::BorrowLimitExceeded {
                borrowed: local.borrowed_amount,
                requested,
                limit: local.borrow_limit,
            },
        );
    }

    let Some(balance) = escrow_balance else {
        return Outcome::reject(state, Rejection::MissingEscrowAccount);
    };
    let observed = AppState {
        global: GlobalState {
            total_pool_balance: balance,
        },
        ..state
    };
    if requested > balance {
        return Outcome::reject(
            observed,
            Rejection::InsufficientPoolBalance { requested, balance },
        );
    }

    Outcome::approve(AppState {
        local: Some(LocalState {
            borrowed_amount: total,
            ..local
        }),
        ..observed
    })
}

/// Big-endian bytes to u64; at most eight bytes, empty is zero.
fn btoi(bytes: &[u8]) -> Option<u64> {
    if bytes.len() > 8 {
        return None;
    }
    Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn opted_in() -> AppState {
        apply(AppState::default(), &AppEvent::opt_in()).state
    }

    #[test]
    fn opt_in_initializes_local_state() {
        let state = opted_in();
        let local = state.local.unwrap();
        assert_eq!(local.reputation_score, 1);
        assert_eq!(local.borrowed_amount, 0);
        assert_eq!(local.borrow_limit, 5_000_000);
    }

    #[test]
    fn opt_in_resets_previous_state() {
        let mut state = opted_in();
        state.local = Some(LocalState {
            reputation_score: 7,
            borrowed_amount: 4_000_000,
            borrow_limit: 5_000_000,
        });
        let state = apply(state, &AppEvent::opt_in()).state;
        assert_eq!(state.local, Some(initial_local_state()));
    }

    #[test]
    fn borrow_within_limit_is_approved() {
        let out = apply(opted_in(), &AppEvent::borrow(3_000_000, 10_000_000));
        assert!(out.verdict.is_approved());
        assert_eq!(out.state.local.unwrap().borrowed_amount, 3_000_000);
        assert_eq!(out.state.global.total_pool_balance, 10_000_000);
    }

    #[test]
    fn borrow_limit_checked_before_pool() {
        let state = apply(opted_in(), &AppEvent::borrow(3_000_000, 10_000_000)).state;
        let out = apply(state, &AppEvent::borrow(3_000_000, 1));
        assert_eq!(
            out.verdict,
            Verdict::Rejected(Rejection::BorrowLimitExceeded {
                borrowed: 3_000_000,
                requested: 3_000_000,
                limit: 5_000_000,
            })
        );
        // The pool balance was never read.
        assert_eq!(out.state.global.total_pool_balance, 10_000_000);
    }

    #[test]
    fn exactly_the_limit_is_allowed() {
        let out = apply(opted_in(), &AppEvent::borrow(5_000_000, 5_000_000));
        assert!(out.verdict.is_approved());
    }

    #[test]
    fn pool_solvency_rejects_but_records_balance() {
        let out = apply(opted_in(), &AppEvent::borrow(2_000_000, 1_500_000));
        assert_eq!(
            out.verdict,
            Verdict::Rejected(Rejection::InsufficientPoolBalance {
                requested: 2_000_000,
                balance: 1_500_000,
            })
        );
        assert_eq!(out.state.global.total_pool_balance, 1_500_000);
        assert_eq!(out.state.local.unwrap().borrowed_amount, 0);
    }

    #[test]
    fn unknown_method_and_missing_args() {
        let call = |args: Vec<Vec<u8>>| AppEvent::Call {
            on_complete: OnComplete::NoOp,
            args,
            escrow_balance: Some(10),
        };
        assert_eq!(
            apply(opted_in(), &call(vec![b"repay".to_vec()])).verdict,
            Verdict::Rejected(Rejection::UnknownMethod)
        );
        assert_eq!(
            apply(opted_in(), &call(vec![])).verdict,
            Verdict::Rejected(Rejection::UnknownMethod)
        );
        assert_eq!(
            apply(opted_in(), &call(vec![b"borrow".to_vec()])).verdict,
            Verdict::Rejected(Rejection::MalformedAmount)
        );
        assert_eq!(
            apply(opted_in(), &call(vec![b"borrow".to_vec(), vec![1; 9]])).verdict,
            Verdict::Rejected(Rejection::MalformedAmount)
        );
    }

    #[test]
    fn borrow_requires_opt_in() {
        let out = apply(AppState::default(), &AppEvent::borrow(1, 10));
        assert_eq!(out.verdict, Verdict::Rejected(Rejection::NotOptedIn));
    }

    #[test]
    fn borrow_requires_escrow_slot() {
        let event = AppEvent::Call {
            on_complete: OnComplete::NoOp,
            args: vec![b"borrow".to_vec(), 1u64.to_be_bytes().to_vec()],
            escrow_balance: None,
        };
        assert_eq!(
            apply(opted_in(), &event).verdict,
            Verdict::Rejected(Rejection::MissingEscrowAccount)
        );
    }

    #[test]
    fn other_completions_are_rejected() {
        for oc in [
            OnComplete::CloseOut,
            OnComplete::UpdateApplication,
            OnComplete::DeleteApplication,
        ] {
            let event = AppEvent::Call {
                on_complete: oc,
                args: vec![],
                escrow_balance: None,
            };
            assert_eq!(
                apply(opted_in(), &event).verdict,
                Verdict::Rejected(Rejection::UnsupportedCompletion(oc))
            );
        }
    }

    #[test]
    fn clear_then_opt_in_frees_the_cap() {
        let state = apply(opted_in(), &AppEvent::borrow(5_000_000, 9_000_000)).state;
        let cleared = apply(state, &AppEvent::clear_state()).state;
        assert!(cleared.local.is_none());
        let fresh = apply(cleared, &AppEvent::opt_in()).state;
        assert!(apply(fresh, &AppEvent::borrow(5_000_000, 9_000_000))
            .verdict
            .is_approved());
    }

    #[test]
    fn btoi_semantics() {
        assert_eq!(btoi(&[]), Some(0));
        assert_eq!(btoi(&[0x01, 0x00]), Some(256));
        assert_eq!(btoi(&3_000_000u64.to_be_bytes()), Some(3_000_000));
        assert_eq!(btoi(&[0; 9]), None);
    }

    #[test]
    fn overflow_is_rejected() {
        let state = AppState {
            local: Some(LocalState {
                reputation_score: 1,
                borrowed_amount: u64::MAX,
                borrow_limit: u64::MAX,
            }),
            ..AppState::default()
        };
        assert_eq!(
            apply(state, &AppEvent::borrow(1, 10)).verdict,
            Verdict::Rejected(Rejection::Overflow)
        );
    }
}
