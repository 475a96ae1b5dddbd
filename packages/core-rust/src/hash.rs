//! Placeholder business payload generation.
//!
//! The producer attaches a pseudo-random token to every request: 32 random
//! bytes hashed with SHA-256 and rendered as 64 uppercase hex characters.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes fed into the hash.
const NONCE_LEN: usize = 32;

/// SHA-256 of `bytes`, rendered as uppercase hex.
///
/// # Examples
///
/// ```
/// use relay_core::hash::sha256_hex_upper;
///
/// assert_eq!(
///     sha256_hex_upper(b""),
///     "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
/// );
/// ```
#[must_use]
pub fn sha256_hex_upper(bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(bytes))
}

/// Generates a fresh payload token.
#[must_use]
pub fn random_payload_token() -> String {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    sha256_hex_upper(&nonce)
}
