//! # Simulated Ledger
//!
//! An in-memory [`LedgerClient`] that executes the lending application and
//! the escrow guard the way a node would: signatures and logic signatures
//! are checked, fees are charged, overspends are refused, and a group either
//! commits as a whole or leaves no trace.
//!
//! ## Model
//!
//! - Compiling a source registers it. Only the three CampusTrust programs
//!   compile; the bytecode is the TEAL version byte followed by the
//!   SHA-512/256 of the source, so the escrow address is a pure function of
//!   the application id here too.
//! - Effects apply when a group is admitted. Confirmation becomes visible
//!   `confirmation_delay` rounds later; rounds advance only through
//!   [`LedgerClient::await_round`] or [`SimulatedLedger::advance`].
//! - Rejections are reported with node-style messages so they go through
//!   the same classification as a real node's.
//! - Minimum balances and rekeying are not modeled.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use campustrust_protocol::config::{MIN_TX_FEE, TEAL_VERSION};
use campustrust_protocol::crypto::sha512_256;
use campustrust_protocol::error::{classify_node_message, LedgerError, Result};
use campustrust_protocol::program::{
    build_clear_source, build_state_machine_source, parse_escrow_application_id,
    CompiledProgram,
};
use campustrust_protocol::transaction::group::MAX_GROUP_SIZE;
use campustrust_protocol::transaction::{
    compute_group_id, ApplicationCall, Authorization, OnComplete, SignedTransaction,
    SuggestedParams, Transaction, TransactionKind,
};
use campustrust_protocol::{Address, LedgerClient, LocalState, PendingInfo};

use crate::escrow_guard;
use crate::lending_app::{self, AppEvent, AppState, GlobalState, Verdict};

pub const GENESIS_ID: &str = "campustrust-sim-v1";

const FIRST_APPLICATION_ID: u64 = 1_000;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgramKind {
    Approval,
    Clear,
    Escrow(u64),
}

#[derive(Debug, Clone)]
struct Application {
    creator: Address,
    global: GlobalState,
}

/// Everything a group can change. Cloned per submission and swapped in on
/// success.
#[derive(Debug, Clone, Default)]
struct Chain {
    balances: HashMap<Address, u64>,
    applications: HashMap<u64, Application>,
    local: HashMap<(u64, Address), LocalState>,
    next_application_id: u64,
}

impl Chain {
    fn balance(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    fn debit(&mut self, address: &Address, amount: u64, tx_id: &str) -> Result<()> {
        let balance = self.balance(address);
        let remaining = balance.checked_sub(amount).ok_or_else(|| {
            node_rejection(format!(
                "transaction {tx_id}: overspend (account {address}, balance {balance}, tried to spend {amount})"
            ))
        })?;
        self.balances.insert(*address, remaining);
        Ok(())
    }

    fn credit(&mut self, address: &Address, amount: u64, tx_id: &str) -> Result<()> {
        let balance = self.balance(address);
        let updated = balance.checked_add(amount).ok_or_else(|| {
            node_rejection(format!("transaction {tx_id}: balance overflow for {address}"))
        })?;
        self.balances.insert(*address, updated);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct PendingEntry {
    confirm_at: u64,
    application_index: Option<u64>,
    pool_error: String,
}

#[derive(Debug)]
struct Inner {
    round: u64,
    chain: Chain,
    programs: HashMap<Vec<u8>, ProgramKind>,
    pending: HashMap<String, PendingEntry>,
    confirmation_delay: u64,
    injected_pool_error: Option<String>,
    committed_groups: usize,
    requests: usize,
}

/// In-memory ledger executing the CampusTrust programs.
///
/// Cheap to share behind an `Arc`; every call takes the internal lock once
/// and never holds it across an await.
#[derive(Debug)]
pub struct SimulatedLedger {
    inner: Mutex<Inner>,
    genesis_hash: [u8; 32],
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLedger {
    /// A fresh ledger at round 1, confirming one round after admission.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                round: 1,
                chain: Chain {
                    next_application_id: FIRST_APPLICATION_ID,
                    ..Chain::default()
                },
                programs: HashMap::new(),
                pending: HashMap::new(),
                confirmation_delay: 1,
                injected_pool_error: None,
                committed_groups: 0,
                requests: 0,
            }),
            genesis_hash: sha512_256(GENESIS_ID.as_bytes()),
        }
    }

    pub fn with_confirmation_delay(self, rounds: u64) -> Self {
        self.set_confirmation_delay(rounds);
        self
    }

    /// Rounds between admission and visible confirmation.
    pub fn set_confirmation_delay(&self, rounds: u64) {
        self.inner.lock().confirmation_delay = rounds;
    }

    /// Mint `amount` minor units into `address`.
    pub fn fund(&self, address: &Address, amount: u64) {
        let mut inner = self.inner.lock();
        let balance = inner.chain.balance(address);
        inner
            .chain
            .balances
            .insert(*address, balance.saturating_add(amount));
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.inner.lock().chain.balance(address)
    }

    pub fn local_state(&self, application_id: u64, address: &Address) -> Option<LocalState> {
        self.inner
            .lock()
            .chain
            .local
            .get(&(application_id, *address))
            .copied()
    }

    pub fn global_state(&self, application_id: u64) -> Option<GlobalState> {
        self.inner
            .lock()
            .chain
            .applications
            .get(&application_id)
            .map(|app| app.global)
    }

    pub fn application_creator(&self, application_id: u64) -> Option<Address> {
        self.inner
            .lock()
            .chain
            .applications
            .get(&application_id)
            .map(|app| app.creator)
    }

    /// Advance the clock by `rounds`. Returns the new round.
    pub fn advance(&self, rounds: u64) -> u64 {
        let mut inner = self.inner.lock();
        inner.round = inner.round.saturating_add(rounds);
        inner.round
    }

    /// Accept the next submission into the pool, then drop it with `reason`
    /// without executing it.
    pub fn fail_next_with(&self, reason: impl Into<String>) {
        self.inner.lock().injected_pool_error = Some(reason.into());
    }

    /// Groups that passed admission and changed state.
    pub fn committed_groups(&self) -> usize {
        self.inner.lock().committed_groups
    }

    /// Total number of adapter calls served.
    pub fn requests(&self) -> usize {
        self.inner.lock().requests
    }

    fn touch(&self) -> parking_lot::MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock();
        inner.requests += 1;
        inner
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    fn admit(&self, inner: &mut Inner, group: &[SignedTransaction]) -> Result<String> {
        let first = group
            .first()
            .ok_or_else(|| node_error(400, "empty transaction group"))?;
        let first_id = first.id();
        let txs: Vec<Transaction> = group.iter().map(|s| s.transaction.clone()).collect();

        check_group(&txs)?;
        for signed in group {
            self.check_validity(&signed.transaction, inner.round)?;
        }
        for (index, signed) in group.iter().enumerate() {
            check_authorization(&inner.programs, signed, &txs, index)?;
        }

        if let Some(reason) = inner.injected_pool_error.take() {
            tracing::debug!(tx_id = %first_id, %reason, "dropping group from pool");
            for signed in group {
                inner.pending.insert(
                    signed.id(),
                    PendingEntry {
                        pool_error: reason.clone(),
                        ..PendingEntry::default()
                    },
                );
            }
            return Ok(first_id);
        }

        let mut chain = inner.chain.clone();
        let mut created = Vec::with_capacity(group.len());
        for signed in group {
            created.push(execute(&mut chain, &inner.programs, &signed.transaction)?);
        }

        inner.chain = chain;
        inner.committed_groups += 1;
        let confirm_at = inner.round + inner.confirmation_delay;
        for (signed, application_index) in group.iter().zip(created) {
            inner.pending.insert(
                signed.id(),
                PendingEntry {
                    confirm_at,
                    application_index,
                    pool_error: String::new(),
                },
            );
        }
        tracing::debug!(tx_id = %first_id, size = group.len(), confirm_at, "group committed");
        Ok(first_id)
    }

    fn check_validity(&self, tx: &Transaction, round: u64) -> Result<()> {
        let id = tx.id();
        if tx.genesis_hash != self.genesis_hash {
            return Err(node_error(400, format!("transaction {id}: genesis hash mismatch")));
        }
        if round < tx.first_valid || round > tx.last_valid {
            return Err(node_error(
                400,
                format!(
                    "transaction {id}: txn dead: round {round} outside [{}, {}]",
                    tx.first_valid, tx.last_valid
                ),
            ));
        }
        if tx.fee < MIN_TX_FEE {
            return Err(node_error(
                400,
                format!("transaction {id}: fee {} below minimum {MIN_TX_FEE}", tx.fee),
            ));
        }
        Ok(())
    }
}

fn check_group(txs: &[Transaction]) -> Result<()> {
    if txs.len() > MAX_GROUP_SIZE {
        return Err(node_error(
            400,
            format!("group of {} exceeds {MAX_GROUP_SIZE}", txs.len()),
        ));
    }
    if txs.len() == 1 && txs[0].group.is_none() {
        return Ok(());
    }
    let expected = compute_group_id(txs)?;
    if txs.iter().any(|tx| tx.group != Some(expected)) {
        return Err(node_error(400, "incomplete group: group id mismatch"));
    }
    Ok(())
}

fn check_authorization(
    programs: &HashMap<Vec<u8>, ProgramKind>,
    signed: &SignedTransaction,
    txs: &[Transaction],
    index: usize,
) -> Result<()> {
    let id = signed.id();
    if !signed.verify_authorization() {
        return Err(node_error(
            400,
            format!("transaction {id}: signature validation failed"),
        ));
    }
    if let Authorization::Logic(bytecode) = &signed.authorization {
        match programs.get(bytecode) {
            Some(ProgramKind::Escrow(application_id)) => {
                escrow_guard::evaluate(txs, index, *application_id).map_err(|violation| {
                    node_rejection(format!(
                        "transaction {id}: rejected by logic: escrow guard: {violation}"
                    ))
                })?;
            }
            _ => {
                return Err(node_rejection(format!(
                    "transaction {id}: rejected by logic: program is not a recognized escrow"
                )))
            }
        }
    }
    Ok(())
}

/// Apply one transaction to `chain`. Returns the new application id for a
/// creation.
fn execute(
    chain: &mut Chain,
    programs: &HashMap<Vec<u8>, ProgramKind>,
    tx: &Transaction,
) -> Result<Option<u64>> {
    let id = tx.id();
    match &tx.kind {
        TransactionKind::Payment(payment) => {
            let spend = payment.amount.checked_add(tx.fee).ok_or_else(|| {
                node_rejection(format!("transaction {id}: overspend (amount overflow)"))
            })?;
            chain.debit(&tx.sender, spend, &id)?;
            chain.credit(&payment.receiver, payment.amount, &id)?;
            if let Some(close_to) = payment.close_remainder_to.filter(|a| !a.is_zero()) {
                let rest = chain.balance(&tx.sender);
                chain.debit(&tx.sender, rest, &id)?;
                chain.credit(&close_to, rest, &id)?;
            }
            Ok(None)
        }
        TransactionKind::ApplicationCall(call) => {
            chain.debit(&tx.sender, tx.fee, &id)?;
            if call.is_create() {
                create_application(chain, programs, tx.sender, call, &id).map(Some)
            } else {
                call_application(chain, tx.sender, call, &id).map(|()| None)
            }
        }
    }
}

fn create_application(
    chain: &mut Chain,
    programs: &HashMap<Vec<u8>, ProgramKind>,
    creator: Address,
    call: &ApplicationCall,
    tx_id: &str,
) -> Result<u64> {
    if programs.get(&call.approval_program) != Some(&ProgramKind::Approval)
        || programs.get(&call.clear_program) != Some(&ProgramKind::Clear)
    {
        return Err(node_error(
            400,
            format!("transaction {tx_id}: unrecognized application programs"),
        ));
    }
    let outcome = lending_app::apply(AppState::default(), &AppEvent::Create);
    if let Verdict::Rejected(rejection) = outcome.verdict {
        return Err(node_rejection(format!(
            "transaction {tx_id}: rejected by ApprovalProgram: {rejection}"
        )));
    }

    let application_id = chain.next_application_id;
    chain.next_application_id += 1;
    chain.applications.insert(
        application_id,
        Application {
            creator,
            global: outcome.state.global,
        },
    );
    Ok(application_id)
}

fn call_application(
    chain: &mut Chain,
    sender: Address,
    call: &ApplicationCall,
    tx_id: &str,
) -> Result<()> {
    let key = (call.app_id, sender);
    let global = chain
        .applications
        .get(&call.app_id)
        .map(|app| app.global)
        .ok_or_else(|| {
            node_error(
                400,
                format!("transaction {tx_id}: application {} does not exist", call.app_id),
            )
        })?;
    let local = chain.local.get(&key).copied();

    match call.on_complete {
        OnComplete::OptIn if local.is_some() => {
            return Err(node_error(
                400,
                format!(
                    "transaction {tx_id}: account {sender} has already opted in to app {}",
                    call.app_id
                ),
            ))
        }
        OnComplete::ClearState if local.is_none() => {
            return Err(node_error(
                400,
                format!(
                    "transaction {tx_id}: account {sender} is not currently opted in to app {}",
                    call.app_id
                ),
            ))
        }
        _ => {}
    }

    let event = AppEvent::Call {
        on_complete: call.on_complete,
        args: call.args.clone(),
        escrow_balance: call.accounts.first().map(|a| chain.balance(a)),
    };
    let outcome = lending_app::apply(AppState { global, local }, &event);
    if let Verdict::Rejected(rejection) = outcome.verdict {
        tracing::debug!(tx_id, app_id = call.app_id, %rejection, "application call rejected");
        return Err(node_rejection(format!(
            "transaction {tx_id}: rejected by ApprovalProgram: {rejection}"
        )));
    }

    if let Some(app) = chain.applications.get_mut(&call.app_id) {
        app.global = outcome.state.global;
    }
    match outcome.state.local {
        Some(state) => chain.local.insert(key, state),
        None => chain.local.remove(&key),
    };
    Ok(())
}

fn node_error(status: u16, message: impl Into<String>) -> LedgerError {
    LedgerError::Node {
        status,
        message: message.into(),
    }
}

/// A 400 classified the way a real node's message would be.
fn node_rejection(message: String) -> LedgerError {
    classify_node_message(400, &format!("TransactionPool.Remember: {message}"))
}

fn compiled_bytes(source: &str) -> Vec<u8> {
    let mut bytecode = Vec::with_capacity(33);
    bytecode.push(TEAL_VERSION);
    bytecode.extend_from_slice(&sha512_256(source.as_bytes()));
    bytecode
}

// ---------------------------------------------------------------------------
// LedgerClient
// ---------------------------------------------------------------------------

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn compile(&self, source: &str) -> Result<CompiledProgram> {
        let kind = if source == build_state_machine_source() {
            ProgramKind::Approval
        } else if source == build_clear_source() {
            ProgramKind::Clear
        } else if let Some(application_id) = parse_escrow_application_id(source) {
            ProgramKind::Escrow(application_id)
        } else {
            return Err(node_error(400, "compile error: unrecognized program source"));
        };

        let bytecode = compiled_bytes(source);
        self.touch().programs.insert(bytecode.clone(), kind);
        Ok(CompiledProgram::from_bytecode(bytecode))
    }

    async fn suggested_params(&self) -> Result<SuggestedParams> {
        let round = self.touch().round;
        Ok(SuggestedParams {
            fee_per_byte: 0,
            min_fee: MIN_TX_FEE,
            last_round: round,
            genesis_id: GENESIS_ID.to_string(),
            genesis_hash: self.genesis_hash,
        })
    }

    async fn submit(&self, group: &[SignedTransaction]) -> Result<String> {
        let mut inner = self.touch();
        self.admit(&mut inner, group)
    }

    async fn pending_info(&self, tx_id: &str) -> Result<PendingInfo> {
        let inner = self.touch();
        let entry = inner
            .pending
            .get(tx_id)
            .ok_or_else(|| node_error(404, format!("txn does not exist: {tx_id}")))?;

        if !entry.pool_error.is_empty() {
            return Ok(PendingInfo {
                pool_error: entry.pool_error.clone(),
                ..PendingInfo::default()
            });
        }
        if entry.confirm_at > inner.round {
            return Ok(PendingInfo::default());
        }
        Ok(PendingInfo {
            confirmed_round: entry.confirm_at,
            pool_error: String::new(),
            application_index: entry.application_index,
        })
    }

    async fn account_application_state(
        &self,
        address: &Address,
        app_id: u64,
    ) -> Result<Option<LocalState>> {
        Ok(self.touch().chain.local.get(&(app_id, *address)).copied())
    }

    async fn current_round(&self) -> Result<u64> {
        Ok(self.touch().round)
    }

    async fn await_round(&self, round: u64) -> Result<u64> {
        let mut inner = self.touch();
        inner.round = inner.round.max(round);
        Ok(inner.round)
    }

    async fn account_balance(&self, address: &Address) -> Result<u64> {
        Ok(self.touch().chain.balance(address))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
