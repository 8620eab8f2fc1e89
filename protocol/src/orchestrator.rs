//! # Transaction Orchestrator
//!
//! Turns operation-level intents (contribute, borrow, repay, opt in) into
//! correctly shaped, correctly signed transaction groups and drives them
//! to confirmation.
//!
//! The orchestrator enforces nothing about lending rules. The borrow cap
//! and pool solvency live in the application program, and the escrow
//! refuses to pay out unless the application call sits next to it in the
//! same group. The orchestrator's job is to build exactly the shapes those
//! programs accept.
//!
//! ```text
//! contribute:  [ pay  contributor -> escrow ]                     (key sig)
//! repay:       [ pay  borrower    -> escrow ]                     (key sig)
//! borrow:      [ appl borrower "borrow" amount, accounts=[escrow] (key sig)
//!              , pay  escrow      -> borrower ]                   (logic sig)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::account::{Account, Address};
use crate::config::{
    env_var, resolve_application_id, PoolConfig, BORROW_METHOD,
    DEFAULT_MAX_CONFIRMATION_ROUNDS, DEPLOY_CONFIRMATION_ROUNDS, ENV_APPLICATION_ID,
    GLOBAL_NUM_UINTS, LOCAL_NUM_UINTS, NOTE_BORROW, NOTE_CONTRIBUTE, NOTE_REPAY,
};
use crate::confirmation::{await_confirmation, Confirmation};
use crate::error::{LedgerError, Result};
use crate::ledger::{LedgerClient, LocalState};
use crate::program::{
    build_clear_source, build_escrow_source, build_state_machine_source, CompiledProgram,
};
use crate::transaction::{
    assign_group_id, sign_group, sign_transaction, OnComplete, SignedTransaction, Signer,
    StateSchema, TransactionBuilder,
};

// ---------------------------------------------------------------------------
// Settings and results
// ---------------------------------------------------------------------------

/// Immutable orchestrator configuration, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// The active lending application. `None` or zero means "not
    /// configured"; operations that need it fail with
    /// [`LedgerError::MissingApplicationId`].
    pub application_id: Option<u64>,
    /// Pool admin wallet. Only pool-funded operations need it.
    pub pool: Option<PoolConfig>,
    pub max_confirmation_rounds: u64,
    pub deploy_confirmation_rounds: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            application_id: None,
            pool: None,
            max_confirmation_rounds: DEFAULT_MAX_CONFIRMATION_ROUNDS,
            deploy_confirmation_rounds: DEPLOY_CONFIRMATION_ROUNDS,
        }
    }
}

impl OrchestratorSettings {
    pub fn with_application_id(mut self, application_id: u64) -> Self {
        self.application_id = Some(application_id);
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    /// `LENDING_APP_ID`, `POOL_ADDRESS` and `POOL_MNEMONIC` from the
    /// environment.
    ///
    /// A missing application id stays `None` and surfaces only when an
    /// operation needs it. The pool wallet is `None` only when neither pool
    /// variable is set; a partial or malformed wallet fails here.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_var)
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let application_id = match var(ENV_APPLICATION_ID) {
            Some(raw) if !raw.trim().is_empty() => resolve_application_id(Some(&raw)).ok(),
            _ => None,
        };
        Ok(Self {
            application_id,
            pool: PoolConfig::from_lookup_optional(&var)?,
            ..Self::default()
        })
    }
}

/// Outcome of a confirmed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReceipt {
    pub transaction_id: String,
    pub confirmed_round: u64,
    /// The escrow involved, for operations that touch the pool.
    pub escrow_address: Option<Address>,
}

impl OperationReceipt {
    fn from_confirmation(confirmation: Confirmation, escrow_address: Option<Address>) -> Self {
        Self {
            transaction_id: confirmation.transaction_id,
            confirmed_round: confirmation.confirmed_round,
            escrow_address,
        }
    }
}

/// A freshly created lending application and its escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub application_id: u64,
    pub transaction_id: String,
    pub confirmed_round: u64,
    pub escrow_address: Address,
}

/// Balance and lending state of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    pub address: Address,
    pub balance: u64,
    /// `None` when not opted in, or when no application is configured.
    pub local_state: Option<LocalState>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Composes, signs, submits and confirms lending operations.
///
/// Operations are independent sequential pipelines; the orchestrator can
/// be shared (`Arc<Orchestrator<_>>`) across concurrent callers. The only
/// internal state is the escrow compilation cache.
pub struct Orchestrator<L: LedgerClient> {
    ledger: Arc<L>,
    settings: OrchestratorSettings,
    escrows: Mutex<HashMap<u64, CompiledProgram>>,
}

impl<L: LedgerClient> Orchestrator<L> {
    pub fn new(ledger: Arc<L>, settings: OrchestratorSettings) -> Self {
        Self {
            ledger,
            settings,
            escrows: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// The configured application id. Never creates one.
    pub fn resolve_application_id(&self) -> Result<u64> {
        match self.settings.application_id {
            Some(id) if id > 0 => Ok(id),
            _ => Err(LedgerError::MissingApplicationId),
        }
    }

    /// Compiled escrow for `application_id`, compiled once and cached.
    pub async fn escrow(&self, application_id: u64) -> Result<CompiledProgram> {
        let cached = self.escrows.lock().get(&application_id).cloned();
        if let Some(program) = cached {
            tracing::debug!(application_id, "escrow cache hit");
            return Ok(program);
        }

        let program = self
            .ledger
            .compile(&build_escrow_source(application_id))
            .await?;
        tracing::debug!(application_id, escrow = %program.address(), "escrow compiled");
        self.escrows
            .lock()
            .insert(application_id, program.clone());
        Ok(program)
    }

    /// Opt `account` into the application unless it already is.
    ///
    /// Returns `None` when nothing had to be done. Application id zero is
    /// refused: an application call without one creates an application.
    pub async fn ensure_opted_in(
        &self,
        account: &Account,
        application_id: u64,
    ) -> Result<Option<OperationReceipt>> {
        if application_id == 0 {
            return Err(LedgerError::MissingApplicationId);
        }
        let address = account.address();
        if self
            .ledger
            .account_application_state(&address, application_id)
            .await?
            .is_some()
        {
            tracing::debug!(%address, application_id, "already opted in");
            return Ok(None);
        }

        let params = self.ledger.suggested_params().await?;
        let tx = TransactionBuilder::app_call(address, application_id, OnComplete::OptIn)
            .build(&params);
        let signed = sign_transaction(tx, Signer::Account(account))?;
        let confirmation = self
            .submit_and_confirm(vec![signed], self.settings.max_confirmation_rounds)
            .await?;

        tracing::info!(
            %address,
            application_id,
            tx_id = %confirmation.transaction_id,
            round = confirmation.confirmed_round,
            "opted in"
        );
        Ok(Some(OperationReceipt::from_confirmation(confirmation, None)))
    }

    /// Pay `amount` minor units from `contributor` into the pool escrow.
    pub async fn contribute(&self, contributor: &Account, amount: u64) -> Result<OperationReceipt> {
        let receipt = self.pay_escrow(contributor, amount, NOTE_CONTRIBUTE).await?;
        tracing::info!(
            contributor = %contributor.address(),
            amount,
            tx_id = %receipt.transaction_id,
            round = receipt.confirmed_round,
            "contribution confirmed"
        );
        Ok(receipt)
    }

    /// Borrow `amount` minor units from the pool escrow.
    ///
    /// Submits `[application call, escrow payment]` as one atomic group; the
    /// application enforces the per-account cap and pool solvency, and the
    /// escrow only pays when that call is present and names the receiver as
    /// its sender.
    ///
    /// If `expected` is given it must be the borrower's address; this is
    /// checked before anything is sent.
    ///
    /// The solvency check is read-then-spend on the ledger: two groups
    /// evaluated close together can both see enough balance. No lock is
    /// taken here; callers sharing one pool must serialize borrows
    /// themselves if that matters.
    pub async fn borrow(
        &self,
        borrower: &Account,
        amount: u64,
        expected: Option<&Address>,
    ) -> Result<OperationReceipt> {
        let address = borrower.address();
        if let Some(expected) = expected {
            if *expected != address {
                return Err(LedgerError::InvalidAddress(format!(
                    "{} does not match the borrower's recovery phrase",
                    expected
                )));
            }
        }

        let application_id = self.resolve_application_id()?;
        self.ensure_opted_in(borrower, application_id).await?;
        let escrow = self.escrow(application_id).await?;
        let params = self.ledger.suggested_params().await?;

        let mut group = vec![
            TransactionBuilder::app_call(address, application_id, OnComplete::NoOp)
                .arg(BORROW_METHOD)
                .arg(amount.to_be_bytes().to_vec())
                .account(escrow.address())
                .build(&params),
            TransactionBuilder::payment(escrow.address(), address, amount)
                .note(NOTE_BORROW)
                .build(&params),
        ];
        assign_group_id(&mut group)?;
        let signed = sign_group(
            group,
            &[Signer::Account(borrower), Signer::Program(&escrow)],
        )?;

        let confirmation = self
            .submit_and_confirm(signed, self.settings.max_confirmation_rounds)
            .await?;
        tracing::info!(
            borrower = %address,
            amount,
            escrow = %escrow.address(),
            tx_id = %confirmation.transaction_id,
            round = confirmation.confirmed_round,
            "borrow confirmed"
        );
        Ok(OperationReceipt::from_confirmation(
            confirmation,
            Some(escrow.address()),
        ))
    }

    /// Pay `amount` minor units from `borrower` back into the escrow.
    ///
    /// A plain payment: the application is not called, so the on-chain
    /// `borrowed_amount` is not reduced.
    pub async fn repay(&self, borrower: &Account, amount: u64) -> Result<OperationReceipt> {
        let receipt = self.pay_escrow(borrower, amount, NOTE_REPAY).await?;
        tracing::info!(
            borrower = %borrower.address(),
            amount,
            tx_id = %receipt.transaction_id,
            round = receipt.confirmed_round,
            "repayment confirmed"
        );
        Ok(receipt)
    }

    /// Discard `account`'s local state with a clear-state call.
    pub async fn clear_state(&self, account: &Account) -> Result<OperationReceipt> {
        let application_id = self.resolve_application_id()?;
        let params = self.ledger.suggested_params().await?;
        let tx = TransactionBuilder::app_call(
            account.address(),
            application_id,
            OnComplete::ClearState,
        )
        .build(&params);
        let signed = sign_transaction(tx, Signer::Account(account))?;
        let confirmation = self
            .submit_and_confirm(vec![signed], self.settings.max_confirmation_rounds)
            .await?;
        tracing::info!(
            address = %account.address(),
            application_id,
            tx_id = %confirmation.transaction_id,
            "local state cleared"
        );
        Ok(OperationReceipt::from_confirmation(confirmation, None))
    }

    /// Create the lending application with `creator` as its owner.
    ///
    /// Administrative: nothing on the request path calls this.
    pub async fn create_application(&self, creator: &Account) -> Result<Deployment> {
        let approval = self.ledger.compile(&build_state_machine_source()).await?;
        let clear = self.ledger.compile(&build_clear_source()).await?;
        let params = self.ledger.suggested_params().await?;

        let tx = TransactionBuilder::app_create(
            creator.address(),
            approval.bytecode().to_vec(),
            clear.bytecode().to_vec(),
            StateSchema::uints(GLOBAL_NUM_UINTS),
            StateSchema::uints(LOCAL_NUM_UINTS),
        )
        .build(&params);
        let signed = sign_transaction(tx, Signer::Account(creator))?;
        let confirmation = self
            .submit_and_confirm(vec![signed], self.settings.deploy_confirmation_rounds)
            .await?;

        let application_id = confirmation.application_index.ok_or_else(|| {
            LedgerError::Deployment(format!(
                "transaction {} confirmed without an application index",
                confirmation.transaction_id
            ))
        })?;
        let escrow = self.escrow(application_id).await?;

        tracing::info!(
            application_id,
            creator = %creator.address(),
            escrow = %escrow.address(),
            tx_id = %confirmation.transaction_id,
            "lending application created"
        );
        Ok(Deployment {
            application_id,
            transaction_id: confirmation.transaction_id,
            confirmed_round: confirmation.confirmed_round,
            escrow_address: escrow.address(),
        })
    }

    /// Balance and (if an application is configured) local state.
    pub async fn account_status(&self, address: &Address) -> Result<AccountStatus> {
        let balance = self.ledger.account_balance(address).await?;
        let local_state = match self.resolve_application_id() {
            Ok(application_id) => {
                self.ledger
                    .account_application_state(address, application_id)
                    .await?
            }
            Err(_) => None,
        };
        Ok(AccountStatus {
            address: *address,
            balance,
            local_state,
        })
    }

    /// Recover the pool wallet and check it controls the configured address.
    pub fn pool_account(&self) -> Result<Account> {
        let pool = self
            .settings
            .pool
            .as_ref()
            .ok_or(LedgerError::MissingPoolAddress)?;
        let account = Account::from_mnemonic(&pool.recovery_phrase)?;
        if account.address() != pool.address {
            return Err(LedgerError::InvalidPoolAddress);
        }
        Ok(account)
    }

    /// Move `amount` minor units of liquidity from the pool wallet into the
    /// escrow.
    pub async fn fund_escrow(&self, amount: u64) -> Result<OperationReceipt> {
        let pool = self.pool_account()?;
        self.contribute(&pool, amount).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn pay_escrow(&self, sender: &Account, amount: u64, note: &str) -> Result<OperationReceipt> {
        let application_id = self.resolve_application_id()?;
        let escrow = self.escrow(application_id).await?;
        let params = self.ledger.suggested_params().await?;

        let tx = TransactionBuilder::payment(sender.address(), escrow.address(), amount)
            .note(note)
            .build(&params);
        let signed = sign_transaction(tx, Signer::Account(sender))?;
        let confirmation = self
            .submit_and_confirm(vec![signed], self.settings.max_confirmation_rounds)
            .await?;
        Ok(OperationReceipt::from_confirmation(
            confirmation,
            Some(escrow.address()),
        ))
    }

    async fn submit_and_confirm(
        &self,
        signed: Vec<SignedTransaction>,
        max_rounds: u64,
    ) -> Result<Confirmation> {
        let tx_id = self.ledger.submit(&signed).await?;
        tracing::debug!(tx_id = %tx_id, size = signed.len(), "submitted");
        await_confirmation(self.ledger.as_ref(), &tx_id, max_rounds).await
    }
}
