//! Per-attempt identifiers sent in the `Nadi-Transporter-Id` header.

use sha2::{Digest, Sha256, Sha512};

/// Length of an attempt identifier in hex characters.
pub const ATTEMPT_ID_LEN: usize = 64;

/// Fresh identifier for one upload attempt, so the server can recognise a
/// retried delivery.
///
/// 32 random bytes from the thread-local CSPRNG are hashed with SHA-512, and
/// the hex digest is hashed again with SHA-256. Panics only if the operating
/// system entropy source fails.
pub fn attempt_id() -> String {
    let seed: [u8; 32] = rand::random();
    let inner = hex::encode(Sha512::digest(seed));
    hex::encode(Sha256::digest(inner.as_bytes()))
}
