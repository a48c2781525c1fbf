//! OpenTelemetry setup: traces, structured logs, and metrics exported via OTLP/gRPC.
//!
//! [`init`] runs once, synchronously, before the HTTP server binds. It always
//! installs the `tracing` subscriber and a meter provider. Exporters are only
//! built when an endpoint is configured; otherwise the service runs with
//! export disabled and instruments record into a reader-less provider.
//!
//! The returned [`TelemetryGuard`] owns every provider. `main` holds it for
//! the lifetime of the process and hands the meter to the router, so no
//! `opentelemetry::global` provider state is used.
//!
//! # Telemetry invariants
//!
//! - Raw request text never appears in any span attribute, metric label, or
//!   log field. Only its length and a fixed-length mask are recorded.
//! - Export failures stay inside the SDK batch workers and never surface in
//!   HTTP responses.

pub mod error;
pub mod guard;
pub mod init;
pub mod resource;
pub mod system;

use std::time::Duration;

pub use error::TelemetryError;
pub use guard::TelemetryGuard;
pub use init::{build_providers, init};

/// Instrumentation scope name for the service's own tracer and meter.
pub const INSTRUMENTATION_SCOPE: &str = "sha256-hasher";

/// Lower bound on the in-memory queue of each batch processor.
const MIN_QUEUE_SIZE: usize = 2048;

/// Scheduling knobs for one batched signal (spans or log records).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTuning {
    /// Delay between two consecutive exports.
    pub scheduled_delay: Duration,
    /// Maximum number of records per export call.
    pub max_export_batch_size: usize,
    /// Maximum number of buffered records; the excess is dropped.
    pub max_queue_size: usize,
}

impl BatchTuning {
    /// Tuning with the given delay and batch size and a queue large enough
    /// to hold several batches.
    pub fn new(scheduled_delay: Duration, max_export_batch_size: usize) -> Self {
        Self {
            scheduled_delay,
            max_export_batch_size,
            max_queue_size: MIN_QUEUE_SIZE.max(max_export_batch_size.saturating_mul(4)),
        }
    }
}

/// Everything needed to export telemetry to a collector.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// OTLP/gRPC endpoint, e.g. `https://collector.example.com:443`.
    pub endpoint: String,
    /// Raw `k=v,k2=v2` list sent as gRPC metadata.
    pub headers: String,
    /// Span batching.
    pub traces: BatchTuning,
    /// Log record batching.
    pub logs: BatchTuning,
    /// Metric collection interval.
    pub metric_interval: Duration,
    /// Register process CPU and memory gauges.
    pub system_metrics: bool,
}

/// Options for [`init`]. `export: None` runs the service with export disabled.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    /// Base `service.name` resource attribute.
    pub service_name: String,
    /// Raw `k=v,k2=v2` resource attributes merged over the defaults.
    pub resource_attributes: String,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Exporter wiring; `None` disables export.
    pub export: Option<ExportOptions>,
}

impl TelemetryOptions {
    /// Options with export disabled.
    #[cfg(test)]
    pub fn disabled(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            resource_attributes: String::new(),
            log_level: "info".into(),
            export: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_tuning_queue_holds_several_batches() {
        let small = BatchTuning::new(Duration::from_millis(500), 128);
        assert_eq!(small.max_queue_size, MIN_QUEUE_SIZE);

        let large = BatchTuning::new(Duration::from_millis(500), 4096);
        assert_eq!(large.max_queue_size, 4096 * 4);
        assert!(large.max_export_batch_size <= large.max_queue_size);
    }

    #[test]
    fn disabled_options_have_no_export() {
        let opts = TelemetryOptions::disabled("svc");
        assert_eq!(opts.service_name, "svc");
        assert!(opts.export.is_none());
    }
}
