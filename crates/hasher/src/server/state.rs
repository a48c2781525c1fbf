//! Shared application state injected into every Axum handler.

use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;

use crate::telemetry::INSTRUMENTATION_SCOPE;

/// Request-level metric instruments.
///
/// Instrument handles are `Arc`-backed, so cloning is cheap.
#[derive(Clone)]
pub struct HttpMetrics {
    requests: Counter<u64>,
    duration: Histogram<f64>,
    hash_requests: Counter<u64>,
    hash_input_size: Histogram<u64>,
}

impl HttpMetrics {
    /// Create all instruments on `meter`.
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter("http.server.requests")
                .with_description("Number of HTTP requests served")
                .build(),
            duration: meter
                .f64_histogram("http.server.request.duration")
                .with_description("Duration of HTTP requests")
                .with_unit("s")
                .build(),
            hash_requests: meter
                .u64_counter("hash.requests")
                .with_description("Number of digests computed")
                .build(),
            hash_input_size: meter
                .u64_histogram("hash.input.size")
                .with_description("Size of hashed input")
                .with_unit("By")
                .build(),
        }
    }

    /// Record one completed HTTP request.
    pub fn record_request(&self, method: &str, route: &str, status: u16, seconds: f64) {
        let attrs = [
            KeyValue::new("http.request.method", method.to_owned()),
            KeyValue::new("http.route", route.to_owned()),
            KeyValue::new("http.response.status_code", i64::from(status)),
        ];
        self.requests.add(1, &attrs);
        self.duration.record(seconds, &attrs);
    }

    /// Record one computed digest over `input_bytes` bytes.
    pub fn record_hash(&self, algorithm: &'static str, input_bytes: usize) {
        let attrs = [KeyValue::new("hash.algorithm", algorithm)];
        self.hash_requests.add(1, &attrs);
        self.hash_input_size
            .record(u64::try_from(input_bytes).unwrap_or(u64::MAX), &attrs);
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Request and digest instruments.
    pub metrics: HttpMetrics,
}

impl AppState {
    /// Create a new [`AppState`] whose instruments live on `meter`.
    pub fn new(meter: &Meter) -> Self {
        Self {
            metrics: HttpMetrics::new(meter),
        }
    }
}

impl Default for AppState {
    /// Creates an [`AppState`] backed by a reader-less meter provider,
    /// suitable for tests.
    fn default() -> Self {
        Self::new(&SdkMeterProvider::default().meter(INSTRUMENTATION_SCOPE))
    }
}
