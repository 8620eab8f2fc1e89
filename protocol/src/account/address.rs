//! Ledger addresses.
//!
//! An address is a 32-byte Ed25519 public key, or the SHA-512/256 of
//! `"Program" || bytecode` for a logic-signature account. Its text form is
//! base32 (RFC 4648, no padding) of the 32 bytes followed by a 4-byte
//! checksum, the last four bytes of SHA-512/256 of the key: 58 characters.

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::PROGRAM_DOMAIN;
use crate::crypto::{domain_hash, sha512_256};
use crate::error::LedgerError;

/// Length of the textual form.
pub const ADDRESS_TEXT_LENGTH: usize = 58;

const CHECKSUM_LENGTH: usize = 4;

/// A 32-byte ledger address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 32]);

impl Address {
    /// The all-zero address. Used by the ledger to mean "field not set".
    pub const ZERO: Address = Address([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Address controlled by a compiled program instead of a key.
    pub fn from_program(bytecode: &[u8]) -> Self {
        Self(domain_hash(PROGRAM_DOMAIN, bytecode))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    fn checksum(&self) -> [u8; CHECKSUM_LENGTH] {
        let digest = sha512_256(&self.0);
        let mut out = [0u8; CHECKSUM_LENGTH];
        out.copy_from_slice(&digest[32 - CHECKSUM_LENGTH..]);
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; 32 + CHECKSUM_LENGTH];
        buf[..32].copy_from_slice(&self.0);
        buf[32..].copy_from_slice(&self.checksum());
        f.write_str(&BASE32_NOPAD.encode(&buf))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_string();
        write!(f, "Address({}...{})", &text[..6], &text[ADDRESS_TEXT_LENGTH - 4..])
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::InvalidAddress(s.to_string());

        if s.len() != ADDRESS_TEXT_LENGTH {
            return Err(invalid());
        }
        let decoded = BASE32_NOPAD.decode(s.as_bytes()).map_err(|_| invalid())?;
        if decoded.len() != 32 + CHECKSUM_LENGTH {
            return Err(invalid());
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&decoded[..32]);
        let address = Address(key);
        if address.checksum()[..] != decoded[32..] {
            return Err(invalid());
        }
        Ok(address)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
