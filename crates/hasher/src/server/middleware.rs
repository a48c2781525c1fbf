//! Axum middleware applied to every route.
//!
//! Each request gets an `http.request` span (exported as an OTLP server span
//! when export is enabled) and a duration measurement, without any per-route
//! instrumentation code.

use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{field, info_span, Span};

use super::state::AppState;

/// Route label used when no route matched (the 404 fallback).
const UNMATCHED_ROUTE: &str = "unmatched";

/// Build the per-request span. Used as the `TraceLayer` span factory.
pub fn make_request_span<B>(req: &axum::http::Request<B>) -> Span {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ROUTE, MatchedPath::as_str);

    info_span!(
        "http.request",
        otel.name = %format!("{} {}", req.method(), route),
        otel.kind = "server",
        http.request.method = %req.method(),
        http.route = route,
        url.path = %req.uri().path(),
        http.response.status_code = field::Empty,
    )
}

/// Record the response status on the request span.
pub fn record_response_status<B>(res: &axum::http::Response<B>, _latency: Duration, span: &Span) {
    span.record("http.response.status_code", res.status().as_u16());
}

/// Record request count and duration, labelled by method, route, and status.
pub async fn track_metrics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_owned(), |p| p.as_str().to_owned());

    let response = next.run(req).await;

    state.metrics.record_request(
        &method,
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
