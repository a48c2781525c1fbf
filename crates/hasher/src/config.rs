//! Configuration loading and validation for the hasher service.
//!
//! All values are read from environment variables at startup, after an
//! optional `.env` file has been merged into the process environment. The
//! process exits with a clear error message if any variable is invalid.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::telemetry::{BatchTuning, ExportOptions, TelemetryOptions};

/// Validated hasher service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Interface the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`). `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Base `service.name` resource attribute.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP/gRPC collector endpoint. Unset or empty disables export.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Extra gRPC metadata sent with every export, as `k=v,k2=v2`.
    #[serde(default)]
    pub otel_exporter_otlp_headers: Option<String>,

    /// Resource attributes merged over the defaults, as `k=v,k2=v2`.
    #[serde(default)]
    pub otel_resource_attributes: Option<String>,

    /// Delay between span export batches, in milliseconds.
    #[serde(default = "default_trace_export_delay_ms")]
    pub trace_export_delay_ms: u64,

    /// Maximum spans per export batch.
    #[serde(default = "default_trace_export_batch_size")]
    pub trace_export_batch_size: usize,

    /// Delay between log export batches, in milliseconds.
    #[serde(default = "default_log_export_delay_ms")]
    pub log_export_delay_ms: u64,

    /// Maximum log records per export batch.
    #[serde(default = "default_log_export_batch_size")]
    pub log_export_batch_size: usize,

    /// Interval between metric collections, in milliseconds.
    #[serde(default = "default_metric_export_interval_ms")]
    pub metric_export_interval_ms: u64,

    /// Export process CPU and memory gauges. Only honoured when export is on.
    #[serde(default = "default_system_metrics_enabled")]
    pub system_metrics_enabled: bool,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    5000
}
fn default_log_level() -> String {
    "info".into()
}
fn default_service_name() -> String {
    "sha256-hasher".into()
}
fn default_trace_export_delay_ms() -> u64 {
    1000
}
fn default_trace_export_batch_size() -> usize {
    256
}
fn default_log_export_delay_ms() -> u64 {
    1000
}
fn default_log_export_batch_size() -> usize {
    256
}
fn default_metric_export_interval_ms() -> u64 {
    5000
}
fn default_system_metrics_enabled() -> bool {
    true
}

/// Merge a `.env` file from the working directory (or a parent) into the
/// process environment, if one exists. Variables already set are left
/// untouched. Returns the path of the file that was loaded.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenv::dotenv() {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            // Telemetry is not yet up; write to stderr directly.
            eprintln!("WARN: ignoring unreadable .env file: {e}");
            None
        }
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        self.host
            .parse::<IpAddr>()
            .with_context(|| format!("HOST must be an IP address, got {:?}", self.host))?;

        if self.port == 0 {
            anyhow::bail!("PORT must be > 0");
        }
        ensure_non_empty(&self.service_name, "SERVICE_NAME")?;

        if let Some(endpoint) = self.export_endpoint() {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                anyhow::bail!(
                    "OTEL_EXPORTER_OTLP_ENDPOINT must start with http:// or https://, got {endpoint:?}"
                );
            }
        }

        ensure_positive(self.trace_export_delay_ms, "TRACE_EXPORT_DELAY_MS")?;
        ensure_positive(self.trace_export_batch_size as u64, "TRACE_EXPORT_BATCH_SIZE")?;
        ensure_positive(self.log_export_delay_ms, "LOG_EXPORT_DELAY_MS")?;
        ensure_positive(self.log_export_batch_size as u64, "LOG_EXPORT_BATCH_SIZE")?;
        ensure_positive(self.metric_export_interval_ms, "METRIC_EXPORT_INTERVAL_MS")?;
        Ok(())
    }

    /// The configured exporter endpoint, treating an empty value as unset.
    pub fn export_endpoint(&self) -> Option<&str> {
        self.otel_exporter_otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Socket address the HTTP server binds to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid HOST {:?}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Derive the telemetry bootstrap options from this configuration.
    pub fn telemetry_options(&self) -> TelemetryOptions {
        let export = self.export_endpoint().map(|endpoint| ExportOptions {
            endpoint: endpoint.to_owned(),
            headers: self.otel_exporter_otlp_headers.clone().unwrap_or_default(),
            traces: BatchTuning::new(
                Duration::from_millis(self.trace_export_delay_ms),
                self.trace_export_batch_size,
            ),
            logs: BatchTuning::new(
                Duration::from_millis(self.log_export_delay_ms),
                self.log_export_batch_size,
            ),
            metric_interval: Duration::from_millis(self.metric_export_interval_ms),
            system_metrics: self.system_metrics_enabled,
        });

        TelemetryOptions {
            service_name: self.service_name.clone(),
            resource_attributes: self.otel_resource_attributes.clone().unwrap_or_default(),
            log_level: self.log_level.clone(),
            export,
        }
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

fn ensure_positive(value: u64, name: &str) -> Result<()> {
    if value == 0 {
        anyhow::bail!("{name} must be > 0");
    }
    Ok(())
}
