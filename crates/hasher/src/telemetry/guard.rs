//! Ownership and shutdown of the OpenTelemetry providers.

use std::collections::BTreeMap;

use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;

use super::system::SystemMetrics;
use super::{TelemetryError, INSTRUMENTATION_SCOPE};

/// Holds every telemetry provider built at startup.
///
/// Dropping the guard flushes and shuts down the providers, so pending spans,
/// log records, and metrics are exported before the process exits. Call
/// [`TelemetryGuard::shutdown`] instead to observe shutdown errors.
pub struct TelemetryGuard {
    pub(super) tracer_provider: Option<SdkTracerProvider>,
    pub(super) logger_provider: Option<SdkLoggerProvider>,
    pub(super) meter_provider: SdkMeterProvider,
    /// Set once the meter provider has been shut down explicitly.
    pub(super) meter_shut_down: bool,
    pub(super) resource_attributes: BTreeMap<String, String>,
    pub(super) system_metrics: Option<SystemMetrics>,
}

impl TelemetryGuard {
    /// A meter for the service's own instruments.
    ///
    /// Always usable: with export disabled it records into a provider that
    /// has no reader.
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(INSTRUMENTATION_SCOPE)
    }

    /// `true` when spans, logs, and metrics are exported to a collector.
    pub fn export_enabled(&self) -> bool {
        self.tracer_provider.is_some()
    }

    /// `true` when process resource gauges are registered.
    pub fn system_metrics_enabled(&self) -> bool {
        self.system_metrics.is_some()
    }

    /// The resource attributes attached to every exported signal.
    pub fn resource_attributes(&self) -> &BTreeMap<String, String> {
        &self.resource_attributes
    }

    /// The tracer provider, if export is enabled.
    pub fn tracer_provider(&self) -> Option<&SdkTracerProvider> {
        self.tracer_provider.as_ref()
    }

    /// The logger provider, if export is enabled.
    pub fn logger_provider(&self) -> Option<&SdkLoggerProvider> {
        self.logger_provider.as_ref()
    }

    /// Flush and shut down all providers, returning the first error.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Shutdown`] if a provider fails to shut down.
    pub fn shutdown(mut self) -> Result<(), TelemetryError> {
        if let Some(provider) = self.tracer_provider.take() {
            provider
                .shutdown()
                .map_err(|source| TelemetryError::Shutdown {
                    signal: "tracer",
                    source,
                })?;
        }

        if let Some(provider) = self.logger_provider.take() {
            provider
                .shutdown()
                .map_err(|source| TelemetryError::Shutdown {
                    signal: "logger",
                    source,
                })?;
        }

        self.meter_shut_down = true;
        self.meter_provider
            .shutdown()
            .map_err(|source| TelemetryError::Shutdown {
                signal: "meter",
                source,
            })
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // The subscriber may already be gone; write to stderr directly.
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("error shutting down tracer provider: {e}");
            }
        }

        if let Some(provider) = self.logger_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("error shutting down logger provider: {e}");
            }
        }

        if !self.meter_shut_down {
            if let Err(e) = self.meter_provider.shutdown() {
                eprintln!("error shutting down meter provider: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::telemetry::{build_providers, TelemetryOptions};

    #[test]
    fn meter_records_until_shutdown() {
        let guard = build_providers(&TelemetryOptions::disabled("sha256-hasher")).unwrap();
        let counter = guard.meter().u64_counter("guard.test").build();
        counter.add(1, &[]);
        guard.shutdown().unwrap();
    }

    #[test]
    fn drop_without_explicit_shutdown() {
        let guard = build_providers(&TelemetryOptions::disabled("sha256-hasher")).unwrap();
        let _meter = guard.meter();
        drop(guard);
    }
}
