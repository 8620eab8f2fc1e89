//! # Account Derivation
//!
//! An [`Account`] is a signing keypair plus the address it controls. It is
//! either generated fresh or recovered from a 25-word phrase, lives for the
//! single operation that needs it, and is never persisted by this crate.
//!
//! ```
//! use campustrust_protocol::account::Account;
//!
//! let account = Account::generate();
//! let phrase = account.mnemonic();
//! let recovered = Account::from_mnemonic(&phrase).unwrap();
//! assert_eq!(recovered.address(), account.address());
//! ```

pub mod address;
pub mod mnemonic;

use std::fmt;

pub use address::Address;

use crate::crypto::keys::{Keypair, SECRET_KEY_LENGTH};
use crate::crypto::Signature;
use crate::error::Result;

/// A keypair and its ledger address.
#[derive(Clone)]
pub struct Account {
    keypair: Keypair,
    address: Address,
}

impl Account {
    /// New random account. No external calls, cannot fail.
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    /// Recover an account from its recovery phrase.
    ///
    /// Fails with [`LedgerError::InvalidRecoveryPhrase`](crate::LedgerError)
    /// and never includes the phrase in the error.
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let seed = mnemonic::mnemonic_to_seed(phrase)?;
        Ok(Self::from_keypair(Keypair::from_seed(&seed)))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        let address = Address::from_bytes(keypair.public_key_bytes());
        Self { keypair, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The 25-word recovery phrase for this account.
    pub fn mnemonic(&self) -> String {
        mnemonic::seed_to_mnemonic(&self.keypair.seed())
    }

    /// Exported 64-byte secret key (`seed || public key`).
    pub fn secret_key(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.keypair.secret_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.keypair.sign(message)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address.to_string())
            .finish_non_exhaustive()
    }
}
