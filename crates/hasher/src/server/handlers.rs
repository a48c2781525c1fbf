//! Axum request handlers for all service endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use common::protocol::{ErrorResponse, HashRequest, HashResponse, HealthResponse};
use tracing::{info, info_span};

use super::state::AppState;
use crate::crypto::{sha256_hex, DIGEST_ALGORITHM, DIGEST_HEX_LEN};

/// Fixed-length stand-in for the input text on spans. Its length does not
/// depend on the input.
pub const MASKED_INPUT: &str = "********";

/// Number of digest characters included in log lines.
const LOGGED_DIGEST_PREFIX: usize = 16;

/// Static input form. Posts `{"text": ...}` to `/hash` and renders the result.
const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// `GET /` — the HTML input form.
pub async fn index() -> Html<&'static str> {
    info!("main page accessed");
    Html(INDEX_HTML)
}

/// `POST /hash` — SHA-256 digest of the `text` field.
///
/// A missing or `null` `text` hashes the empty string. Malformed JSON is
/// rejected by the [`Json`] extractor before this handler runs.
pub async fn generate_hash(
    State(state): State<AppState>,
    Json(req): Json<HashRequest>,
) -> Json<HashResponse> {
    let input = req.into_text();
    let input_length = input.chars().count();

    let span = info_span!(
        "generate_hash",
        input.length = input_length,
        input.masked = MASKED_INPUT,
        hash.algorithm = DIGEST_ALGORITHM,
    );

    let hash = span.in_scope(|| {
        info!(input_length, "generating hash");
        let hash = sha256_hex(&input);
        debug_assert_eq!(hash.len(), DIGEST_HEX_LEN);
        info!(
            hash_prefix = &hash[..LOGGED_DIGEST_PREFIX],
            "generated hash"
        );
        hash
    });

    state.metrics.record_hash(DIGEST_ALGORITHM, input.len());
    Json(HashResponse::new(input, hash))
}

/// `GET /health` — liveness check.
///
/// Always `200 OK`; never consults telemetry state.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
