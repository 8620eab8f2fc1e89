//! # Key Management
//!
//! Ed25519 keypairs for ledger accounts.
//!
//! A ledger address *is* an Ed25519 public key, so this type is the root of
//! every account: signing a transaction, deriving an address and producing a
//! recovery phrase all start here.
//!
//! ## Security considerations
//!
//! - Signing keys are zeroized on drop (ed25519-dalek does this).
//! - Key generation uses the OS RNG.
//! - Key bytes are never logged, and `Debug` prints only the public half.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;

/// Ed25519 seed length. The seed is what the recovery phrase encodes.
pub const SEED_LENGTH: usize = 32;

/// Exported secret key length: `seed || public key`.
pub const SECRET_KEY_LENGTH: usize = 64;

/// An Ed25519 keypair.
///
/// Deliberately not `Serialize`: exporting key material should be an
/// explicit call to [`Keypair::secret_key`] or [`Keypair::seed`].
pub struct Keypair {
    signing_key: SigningKey,
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Keypair {
    /// Fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// The 32-byte seed. This is what a recovery phrase encodes.
    pub fn seed(&self) -> [u8; SEED_LENGTH] {
        self.signing_key.to_bytes()
    }

    /// The 64-byte exported secret key, `seed || public key`.
    ///
    /// Handle with care: this is full control of the account.
    pub fn secret_key(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_keypair_bytes()
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Deterministic Ed25519 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        verify(&self.public_key_bytes(), message, signature)
    }
}

/// Verify `signature` over `message` against a raw 32-byte public key.
///
/// Returns `false` for malformed keys instead of erroring; callers only ever
/// want a yes/no answer here.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &Signature) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig = DalekSignature::from_bytes(&signature.0);
    verifying_key.verify(message, &sig).is_ok()
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair(pub={})", hex::encode(self.public_key_bytes()))
    }
}

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        write!(f, "Signature({}...{})", &hex_str[..8], &hex_str[120..])
    }
}
