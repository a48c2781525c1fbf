//! Request and response types exchanged with the hashing service.
//!
//! These types are serialised as JSON over the public HTTP API.

use serde::{Deserialize, Serialize};

/// Name of the digest algorithm reported in every [`HashResponse`].
pub const HASH_ALGORITHM: &str = "SHA256";

/// Status string reported by `GET /health`.
pub const HEALTHY: &str = "healthy";

// ---------------------------------------------------------------------------
// Hash endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /hash`.
///
/// `text` may be absent or `null`; both are treated as the empty string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashRequest {
    /// Text to hash.
    #[serde(default)]
    pub text: Option<String>,
}

impl HashRequest {
    /// Consume the request and return the text to hash, defaulting to `""`.
    pub fn into_text(self) -> String {
        self.text.unwrap_or_default()
    }
}

/// Successful response body for `POST /hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashResponse {
    /// The text that was hashed, echoed back verbatim.
    pub input: String,
    /// Lowercase hex SHA-256 digest of the UTF-8 bytes of `input`.
    pub hash: String,
    /// Always [`HASH_ALGORITHM`].
    pub algorithm: String,
}

impl HashResponse {
    /// Build a response for `input` and its already computed `hash`.
    pub fn new(input: String, hash: String) -> Self {
        Self {
            input,
            hash,
            algorithm: HASH_ALGORITHM.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status the service
/// produces itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"not_found"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always [`HEALTHY`].
    pub status: String,
}

impl HealthResponse {
    /// The one and only health response the service emits.
    pub fn healthy() -> Self {
        Self {
            status: HEALTHY.into(),
        }
    }
}
