//! # Hashing Utilities
//!
//! The ledger uses exactly one hash function for identifiers: SHA-512/256
//! (SHA-512 with a distinct IV, truncated to 256 bits). Transaction ids,
//! group ids, program addresses and address checksums all come from it.
//!
//! Every identifier hash is domain-separated by a short ASCII prefix
//! (`"TX"`, `"TG"`, `"Program"`) so that bytes valid in one context can
//! never be replayed as a hash preimage in another.

use sha2::{Digest, Sha512_256};

/// SHA-512/256 of `data`.
///
/// # Example
///
/// ```
/// use campustrust_protocol::crypto::sha512_256;
///
/// let digest = sha512_256(b"campustrust");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-512/256 of `domain || data`, fed sequentially without a temporary
/// concatenation buffer.
pub fn domain_hash(domain: &[u8], data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}
