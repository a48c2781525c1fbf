//! Errors raised while bootstrapping or tearing down telemetry.

use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Telemetry bootstrap and shutdown errors.
///
/// Bootstrap errors are fatal: the service refuses to start rather than run
/// with a half-configured pipeline.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// An `OTEL_EXPORTER_OTLP_HEADERS` entry is not a valid gRPC metadata pair.
    #[error("invalid OTLP header {0:?}")]
    InvalidHeader(String),

    /// The OTLP exporter for one signal could not be constructed.
    #[error("failed to build OTLP {signal} exporter: {source}")]
    Exporter {
        /// `"span"`, `"log"`, or `"metric"`.
        signal: &'static str,
        #[source]
        source: ExporterBuildError,
    },

    /// A global `tracing` subscriber was already installed.
    #[error("failed to initialise tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),

    /// A provider failed to flush or shut down.
    #[error("failed to shut down {signal} provider: {source}")]
    Shutdown {
        /// `"tracer"`, `"logger"`, or `"meter"`.
        signal: &'static str,
        #[source]
        source: OTelSdkError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_header_display_names_the_entry() {
        let e = TelemetryError::InvalidHeader("bad key=v".into());
        assert!(e.to_string().contains("bad key=v"));
    }
}
