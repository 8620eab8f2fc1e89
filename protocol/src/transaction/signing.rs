//! Transaction authorization.
//!
//! A transaction is authorized in one of two ways: an Ed25519 signature by
//! the sender's key, or a logic signature, where the sender *is* a program
//! and presenting its bytecode is the authorization. Both come out of the
//! same [`Signer::authorize`] call, so signing a mixed group is one loop.

use super::builder::Transaction;
use super::encoding::{MapBuilder, Value};
use crate::account::{Account, Address};
use crate::crypto::keys::{self, Signature};
use crate::error::{LedgerError, Result};
use crate::program::CompiledProgram;

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Ed25519 over `"TX" || canonical bytes`.
    Signature(Signature),
    /// The program bytecode. Valid only when the sender is its address.
    Logic(Vec<u8>),
}

/// Something that can authorize a transaction.
#[derive(Debug, Clone, Copy)]
pub enum Signer<'a> {
    Account(&'a Account),
    Program(&'a CompiledProgram),
}

impl<'a> Signer<'a> {
    /// The address this signer can authorize for.
    pub fn address(&self) -> Address {
        match self {
            Signer::Account(account) => account.address(),
            Signer::Program(program) => program.address(),
        }
    }

    pub fn authorize(&self, tx: &Transaction) -> Authorization {
        match self {
            Signer::Account(account) => Authorization::Signature(account.sign(&tx.bytes_to_sign())),
            Signer::Program(program) => Authorization::Logic(program.bytecode().to_vec()),
        }
    }
}

impl<'a> From<&'a Account> for Signer<'a> {
    fn from(account: &'a Account) -> Self {
        Signer::Account(account)
    }
}

impl<'a> From<&'a CompiledProgram> for Signer<'a> {
    fn from(program: &'a CompiledProgram) -> Self {
        Signer::Program(program)
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub authorization: Authorization,
}

impl SignedTransaction {
    /// The id of the inner transaction. Authorization does not affect it.
    pub fn id(&self) -> String {
        self.transaction.id()
    }

    /// `{sig: ..., txn: {...}}` or `{lsig: {l: ...}, txn: {...}}`.
    pub fn to_msgpack(&self) -> Vec<u8> {
        let map = match &self.authorization {
            Authorization::Signature(sig) => MapBuilder::new().bin("sig", sig.as_bytes()),
            Authorization::Logic(program) => {
                MapBuilder::new().map("lsig", MapBuilder::new().bin("l", program))
            }
        };
        map.value("txn", self.transaction.to_value())
            .finish()
            .encode()
    }

    /// Check the authorization against the sender.
    ///
    /// For a logic signature this only proves the program matches the
    /// sender address; running the program is the ledger's job.
    pub fn verify_authorization(&self) -> bool {
        let sender = self.transaction.sender;
        match &self.authorization {
            Authorization::Signature(sig) => {
                keys::verify(sender.as_bytes(), &self.transaction.bytes_to_sign(), sig)
            }
            Authorization::Logic(program) => Address::from_program(program) == sender,
        }
    }
}

/// Authorize a single transaction.
///
/// Fails if the signer does not control the sender address: this crate
/// never rekeys, so a mismatch is always a construction bug.
pub fn sign_transaction(tx: Transaction, signer: Signer<'_>) -> Result<SignedTransaction> {
    if signer.address() != tx.sender {
        return Err(LedgerError::Construction(format!(
            "signer {} cannot authorize a transaction sent by {}",
            signer.address(),
            tx.sender
        )));
    }
    let authorization = signer.authorize(&tx);
    Ok(SignedTransaction {
        transaction: tx,
        authorization,
    })
}

/// Authorize every member of a group, pairing transactions and signers by
/// position.
pub fn sign_group(txs: Vec<Transaction>, signers: &[Signer<'_>]) -> Result<Vec<SignedTransaction>> {
    if txs.len() != signers.len() {
        return Err(LedgerError::Construction(format!(
            "{} transactions but {} signers",
            txs.len(),
            signers.len()
        )));
    }
    txs.into_iter()
        .zip(signers.iter())
        .map(|(tx, signer)| sign_transaction(tx, *signer))
        .collect()
}

/// Concatenated wire encodings, the body of a group submission.
pub fn encode_group(signed: &[SignedTransaction]) -> Vec<u8> {
    signed.iter().flat_map(SignedTransaction::to_msgpack).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
