//! Provider construction and `tracing` subscriber installation.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::tonic_types::metadata::MetadataMap;
use opentelemetry_otlp::tonic_types::transport::ClientTlsConfig;
use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::logs::{
    BatchConfigBuilder as LogBatchConfigBuilder, BatchLogProcessor, SdkLoggerProvider,
};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{
    BatchConfigBuilder as TraceBatchConfigBuilder, BatchSpanProcessor, SdkTracerProvider,
};
use opentelemetry_sdk::Resource;
use tracing::{info, warn, Subscriber};
use tracing_subscriber::{
    filter::filter_fn, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use super::resource::{build_resource, parse_key_value_list, resource_attributes};
use super::system::SystemMetrics;
use super::{ExportOptions, TelemetryError, TelemetryGuard, TelemetryOptions, INSTRUMENTATION_SCOPE};

/// Targets of the export transport itself. Their events are kept out of the
/// log bridge so exporting a record never produces another record.
const TRANSPORT_TARGETS: &[&str] = &["opentelemetry", "tonic", "h2", "hyper", "tower", "reqwest"];

/// Build the providers and install the global `tracing` subscriber.
///
/// Configures:
/// - A JSON-formatted [`tracing_subscriber`] layer for structured log output.
/// - When exporting, a [`tracing_opentelemetry`] layer turning spans into OTLP
///   spans and an [`OpenTelemetryTracingBridge`] forwarding events as OTLP log
///   records.
/// - A meter provider, with a periodic OTLP reader when exporting.
///
/// Must run before the router is built so request metrics have a provider.
///
/// # Errors
///
/// Returns an error if an exporter cannot be built, a header is invalid, or a
/// subscriber is already installed.
pub fn init(options: &TelemetryOptions) -> Result<TelemetryGuard, TelemetryError> {
    let guard = build_providers(options)?;

    install_subscriber(
        &options.log_level,
        guard.tracer_provider(),
        guard.logger_provider(),
    )?;

    match &options.export {
        Some(export) => info!(
            endpoint = %export.endpoint,
            system_metrics = guard.system_metrics_enabled(),
            "OTLP export configured"
        ),
        None => warn!(
            "OTEL_EXPORTER_OTLP_ENDPOINT not configured; telemetry will not be exported"
        ),
    }

    Ok(guard)
}

/// Build every provider without touching global state.
///
/// # Errors
///
/// Returns an error if an exporter cannot be built or a header is invalid.
pub fn build_providers(options: &TelemetryOptions) -> Result<TelemetryGuard, TelemetryError> {
    let attributes = resource_attributes(&options.service_name, &options.resource_attributes);
    let resource = build_resource(&attributes);

    let Some(export) = &options.export else {
        // No reader: instruments stay valid and recording is a no-op.
        let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
        return Ok(TelemetryGuard {
            tracer_provider: None,
            logger_provider: None,
            meter_provider,
            meter_shut_down: false,
            resource_attributes: attributes,
            system_metrics: None,
        });
    };

    let metadata = export_metadata(&export.headers)?;
    let tracer_provider = build_tracer_provider(export, &metadata, resource.clone())?;
    let logger_provider = build_logger_provider(export, &metadata, resource.clone())?;
    let meter_provider = build_meter_provider(export, &metadata, resource)?;

    let system_metrics = export
        .system_metrics
        .then(|| SystemMetrics::register(&meter_provider.meter(INSTRUMENTATION_SCOPE)));

    Ok(TelemetryGuard {
        tracer_provider: Some(tracer_provider),
        logger_provider: Some(logger_provider),
        meter_provider,
        meter_shut_down: false,
        resource_attributes: attributes,
        system_metrics,
    })
}

/// Convert the raw `k=v,k2=v2` header list into gRPC metadata.
fn export_metadata(raw: &str) -> Result<MetadataMap, TelemetryError> {
    let mut headers = HeaderMap::new();
    for (key, value) in parse_key_value_list(raw) {
        let name = key
            .parse::<HeaderName>()
            .map_err(|_| TelemetryError::InvalidHeader(key.clone()))?;
        let value = value
            .parse::<HeaderValue>()
            .map_err(|_| TelemetryError::InvalidHeader(key.clone()))?;
        headers.insert(name, value);
    }
    Ok(MetadataMap::from_headers(headers))
}

/// TLS settings for `https://` endpoints, trusting the platform's root store.
fn tls_config(endpoint: &str) -> Option<ClientTlsConfig> {
    endpoint
        .starts_with("https://")
        .then(|| ClientTlsConfig::new().with_enabled_roots())
}

fn build_tracer_provider(
    export: &ExportOptions,
    metadata: &MetadataMap,
    resource: Resource,
) -> Result<SdkTracerProvider, TelemetryError> {
    let mut builder = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(export.endpoint.as_str())
        .with_metadata(metadata.clone());
    if let Some(tls) = tls_config(&export.endpoint) {
        builder = builder.with_tls_config(tls);
    }
    let exporter = builder
        .build()
        .map_err(|source| TelemetryError::Exporter {
            signal: "span",
            source,
        })?;

    let batch_config = TraceBatchConfigBuilder::default()
        .with_max_queue_size(export.traces.max_queue_size)
        .with_max_export_batch_size(export.traces.max_export_batch_size)
        .with_scheduled_delay(export.traces.scheduled_delay)
        .build();

    let processor = BatchSpanProcessor::builder(exporter)
        .with_batch_config(batch_config)
        .build();

    Ok(SdkTracerProvider::builder()
        .with_span_processor(processor)
        .with_resource(resource)
        .build())
}

fn build_logger_provider(
    export: &ExportOptions,
    metadata: &MetadataMap,
    resource: Resource,
) -> Result<SdkLoggerProvider, TelemetryError> {
    let mut builder = LogExporter::builder()
        .with_tonic()
        .with_endpoint(export.endpoint.as_str())
        .with_metadata(metadata.clone());
    if let Some(tls) = tls_config(&export.endpoint) {
        builder = builder.with_tls_config(tls);
    }
    let exporter = builder
        .build()
        .map_err(|source| TelemetryError::Exporter {
            signal: "log",
            source,
        })?;

    let batch_config = LogBatchConfigBuilder::default()
        .with_max_queue_size(export.logs.max_queue_size)
        .with_max_export_batch_size(export.logs.max_export_batch_size)
        .with_scheduled_delay(export.logs.scheduled_delay)
        .build();

    let processor = BatchLogProcessor::builder(exporter)
        .with_batch_config(batch_config)
        .build();

    Ok(SdkLoggerProvider::builder()
        .with_log_processor(processor)
        .with_resource(resource)
        .build())
}

fn build_meter_provider(
    export: &ExportOptions,
    metadata: &MetadataMap,
    resource: Resource,
) -> Result<SdkMeterProvider, TelemetryError> {
    let mut builder = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(export.endpoint.as_str())
        .with_metadata(metadata.clone());
    if let Some(tls) = tls_config(&export.endpoint) {
        builder = builder.with_tls_config(tls);
    }
    let exporter = builder
        .build()
        .map_err(|source| TelemetryError::Exporter {
            signal: "metric",
            source,
        })?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(export.metric_interval)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build())
}

fn install_subscriber(
    log_level: &str,
    tracer_provider: Option<&SdkTracerProvider>,
    logger_provider: Option<&SdkLoggerProvider>,
) -> Result<(), TelemetryError> {
    subscriber(log_level, tracer_provider, logger_provider).try_init()?;
    Ok(())
}

/// Compose the subscriber: env filter, JSON output, and the span and log
/// bridges for whichever providers are present.
pub(crate) fn subscriber(
    log_level: &str,
    tracer_provider: Option<&SdkTracerProvider>,
    logger_provider: Option<&SdkLoggerProvider>,
) -> impl Subscriber + Send + Sync + 'static {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let otel_layer = tracer_provider
        .map(|tp| tracing_opentelemetry::layer().with_tracer(tp.tracer(INSTRUMENTATION_SCOPE)));

    let log_bridge = logger_provider.map(|lp| {
        OpenTelemetryTracingBridge::new(lp)
            .with_filter(filter_fn(|meta| !is_transport_target(meta.target())))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .with(otel_layer)
        .with(log_bridge)
}

fn is_transport_target(target: &str) -> bool {
    TRANSPORT_TARGETS.iter().any(|prefix| {
        target == *prefix
            || target
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with("::") || rest.starts_with('_'))
    })
}
