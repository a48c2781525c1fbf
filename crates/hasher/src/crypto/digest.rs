//! SHA-256 digest of text input, rendered as lowercase hexadecimal.

use sha2::{Digest, Sha256};

/// Algorithm label attached to responses, spans, and metrics.
pub const DIGEST_ALGORITHM: &str = "SHA256";

/// Length of a hex-encoded SHA-256 digest (32 bytes, two characters each).
pub const DIGEST_HEX_LEN: usize = 64;

/// Hash the UTF-8 bytes of `input` with SHA-256 and return the lowercase hex
/// digest.
///
/// Always returns exactly [`DIGEST_HEX_LEN`] characters, including for the
/// empty string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
