//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for account keys and transaction signatures.
//! - **SHA-512/256** (`sha2`) for every ledger identifier.
//!
//! Nothing here is clever, and that is the point.

pub mod hash;
pub mod keys;

pub use hash::{domain_hash, sha512_256};
pub use keys::{Keypair, Signature};
