//! Digest primitives.
//!
//! This module is intentionally free of HTTP and telemetry dependencies: the
//! digest function never logs. Callers decide what to record about the input.

pub mod digest;

pub use digest::{sha256_hex, DIGEST_ALGORITHM, DIGEST_HEX_LEN};
