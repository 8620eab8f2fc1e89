//! # Recovery Phrases
//!
//! 25-word phrases over the BIP-39 English word list. The 32-byte Ed25519
//! seed is packed into 11-bit little-endian groups (24 words) and a 25th
//! word carries the first 11 bits of SHA-512/256(seed) as a checksum.
//!
//! 24 words hold 264 bits, so decoding yields 33 bytes; the seed is the
//! first 32 and the 33rd is padding that must be zero.
//!
//! ```
//! use campustrust_protocol::account::mnemonic::{mnemonic_to_seed, seed_to_mnemonic};
//!
//! let seed = [42u8; 32];
//! let phrase = seed_to_mnemonic(&seed);
//! assert_eq!(phrase.split(' ').count(), 25);
//! assert_eq!(mnemonic_to_seed(&phrase).unwrap(), seed);
//! ```

use bip39::Language;
use thiserror::Error;

use crate::crypto::sha512_256;

/// Words in a complete phrase, checksum included.
pub const MNEMONIC_WORDS: usize = 25;

const BITS_PER_WORD: u32 = 11;
const WORD_MASK: u32 = 0x7ff;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a phrase failed to decode.
///
/// None of these variants carries the offending word: a mistyped word is
/// usually one letter away from the real one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MnemonicError {
    #[error("expected {MNEMONIC_WORDS} words, got {0}")]
    WrongWordCount(usize),

    /// Position is 1-based, for humans.
    #[error("word {position} is not in the word list")]
    UnknownWord { position: usize },

    #[error("checksum word does not match")]
    BadChecksum,

    #[error("phrase does not encode a 32-byte key")]
    BadPadding,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a 32-byte seed as a 25-word phrase.
pub fn seed_to_mnemonic(seed: &[u8; 32]) -> String {
    let list = Language::English.word_list();
    let mut indices = bytes_to_indices(seed);
    indices.push(checksum_index(seed));

    indices
        .iter()
        .map(|&i| list[i as usize])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a 25-word phrase back into its seed.
///
/// Words are matched case-insensitively and any run of whitespace
/// separates them.
pub fn mnemonic_to_seed(phrase: &str) -> Result<[u8; 32], MnemonicError> {
    let words: Vec<String> = phrase.split_whitespace().map(str::to_lowercase).collect();
    if words.len() != MNEMONIC_WORDS {
        return Err(MnemonicError::WrongWordCount(words.len()));
    }

    let list = Language::English.word_list();
    let mut indices = Vec::with_capacity(MNEMONIC_WORDS);
    for (i, word) in words.iter().enumerate() {
        let index = list
            .iter()
            .position(|candidate| *candidate == word.as_str())
            .ok_or(MnemonicError::UnknownWord { position: i + 1 })?;
        indices.push(index as u32);
    }

    let checksum = indices.pop().ok_or(MnemonicError::WrongWordCount(0))?;
    let bytes = indices_to_bytes(&indices);
    if bytes.len() != 33 || bytes[32] != 0 {
        return Err(MnemonicError::BadPadding);
    }

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&bytes[..32]);
    if checksum_index(&seed) != checksum {
        return Err(MnemonicError::BadChecksum);
    }
    Ok(seed)
}

fn checksum_index(seed: &[u8; 32]) -> u32 {
    let digest = sha512_256(seed);
    // First 11 bits, little-endian across the first two bytes.
    (u32::from(digest[0]) | (u32::from(digest[1]) << 8)) & WORD_MASK
}

fn bytes_to_indices(bytes: &[u8]) -> Vec<u32> {
    let mut out = Vec::with_capacity(bytes.len() * 8 / BITS_PER_WORD as usize + 1);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in bytes {
        buffer |= u32::from(byte) << bits;
        bits += 8;
        if bits >= BITS_PER_WORD {
            out.push(buffer & WORD_MASK);
            buffer >>= BITS_PER_WORD;
            bits -= BITS_PER_WORD;
        }
    }
    if bits > 0 {
        out.push(buffer & WORD_MASK);
    }
    out
}

fn indices_to_bytes(indices: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(indices.len() * BITS_PER_WORD as usize / 8 + 1);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &index in indices {
        buffer |= index << bits;
        bits += BITS_PER_WORD;
        while bits >= 8 {
            out.push((buffer & 0xff) as u8);
            buffer >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        out.push((buffer & 0xff) as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_various_seeds() {
        for fill in [0u8, 1, 0x7f, 0xff] {
            let seed = [fill; 32];
            let phrase = seed_to_mnemonic(&seed);
            assert_eq!(phrase.split(' ').count(), MNEMONIC_WORDS);
            assert_eq!(mnemonic_to_seed(&phrase).unwrap(), seed);
        }
    }

    #[test]
    fn zero_seed_is_all_first_word_plus_checksum() {
        let phrase = seed_to_mnemonic(&[0u8; 32]);
        let words: Vec<&str> = phrase.split(' ').collect();
        assert!(words[..24].iter().all(|w| *w == "abandon"));
    }

    #[test]
    fn tolerates_case_and_spacing() {
        let seed = [9u8; 32];
        let phrase = seed_to_mnemonic(&seed).to_uppercase().replace(' ', "  \n ");
        assert_eq!(mnemonic_to_seed(&phrase).unwrap(), seed);
    }

    #[test]
    fn wrong_word_count() {
        assert_eq!(
            mnemonic_to_seed("abandon abandon"),
            Err(MnemonicError::WrongWordCount(2))
        );
        assert_eq!(mnemonic_to_seed(""), Err(MnemonicError::WrongWordCount(0)));
    }

    #[test]
    fn unknown_word_reports_position_not_word() {
        let phrase = seed_to_mnemonic(&[3u8; 32]);
        let mut words: Vec<&str> = phrase.split(' ').collect();
        words[4] = "notaword";
        let err = mnemonic_to_seed(&words.join(" ")).unwrap_err();
        assert_eq!(err, MnemonicError::UnknownWord { position: 5 });
        assert!(!err.to_string().contains("notaword"));
    }

    #[test]
    fn swapped_checksum_word_is_rejected() {
        let phrase = seed_to_mnemonic(&[5u8; 32]);
        let mut words: Vec<&str> = phrase.split(' ').collect();
        let replacement = if words[24] == "zoo" { "abandon" } else { "zoo" };
        words[24] = replacement;
        assert_eq!(
            mnemonic_to_seed(&words.join(" ")),
            Err(MnemonicError::BadChecksum)
        );
    }

    #[test]
    fn nonzero_padding_is_rejected() {
        // "zoo" is index 2047: all eleven bits set, so the 24th word spills
        // into the padding byte.
        let phrase = seed_to_mnemonic(&[0u8; 32]);
        let mut words: Vec<&str> = phrase.split(' ').collect();
        words[23] = "zoo";
        assert_eq!(
            mnemonic_to_seed(&words.join(" ")),
            Err(MnemonicError::BadPadding)
        );
    }
}
