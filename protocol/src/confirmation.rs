//! Confirmation Poller.
//!
//! Bounded wait for a submitted transaction. "Not yet confirmed" is retried
//! once per round up to the budget; a pool error is terminal and never
//! retried. Running out of budget is indeterminate: the transaction may
//! still land, so callers must not resubmit blindly.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::ledger::LedgerClient;

/// A confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub transaction_id: String,
    pub confirmed_round: u64,
    /// Present when the transaction created an application.
    pub application_index: Option<u64>,
}

/// Wait up to `max_rounds` rounds for `tx_id` to confirm.
///
/// `max_rounds == 0` fails with [`LedgerError::ConfirmationTimeout`]
/// without contacting the node.
pub async fn await_confirmation<L>(ledger: &L, tx_id: &str, max_rounds: u64) -> Result<Confirmation>
where
    L: LedgerClient + ?Sized,
{
    if max_rounds == 0 {
        return Err(LedgerError::ConfirmationTimeout {
            tx_id: tx_id.to_string(),
            rounds: 0,
        });
    }

    let mut round = ledger.current_round().await?;
    for attempt in 1..=max_rounds {
        let info = ledger.pending_info(tx_id).await?;
        if info.is_confirmed() {
            tracing::debug!(tx_id, round = info.confirmed_round, attempt, "transaction confirmed");
            return Ok(Confirmation {
                transaction_id: tx_id.to_string(),
                confirmed_round: info.confirmed_round,
                application_index: info.application_index,
            });
        }
        if !info.pool_error.is_empty() {
            tracing::debug!(tx_id, reason = %info.pool_error, "transaction dropped from pool");
            return Err(LedgerError::rejected(info.pool_error));
        }

        round += 1;
        tracing::debug!(tx_id, waiting_for = round, attempt, "not confirmed yet");
        round = round.max(ledger.await_round(round).await?);
    }

    tracing::warn!(tx_id, rounds = max_rounds, "confirmation budget exhausted; outcome unknown");
    Err(LedgerError::ConfirmationTimeout {
        tx_id: tx_id.to_string(),
        rounds: max_rounds,
    })
}
