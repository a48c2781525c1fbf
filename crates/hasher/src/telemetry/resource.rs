//! Resource attributes identifying this service instance to the collector.

use std::collections::BTreeMap;

use opentelemetry::KeyValue;
use opentelemetry_sdk::resource::{ResourceDetector, TelemetryResourceDetector};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::{
    SERVICE_NAME, SERVICE_VERSION, TELEMETRY_SDK_LANGUAGE, TELEMETRY_SDK_NAME,
    TELEMETRY_SDK_VERSION,
};

/// Parse a comma-separated `key=value` list.
///
/// Keys and values are trimmed. The first `=` splits a pair, so values may
/// contain `=`. Entries without `=` or with an empty key are skipped.
pub fn parse_key_value_list(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_owned(), value.trim().to_owned()))
        })
        .collect()
}

/// Build the resource attribute map: fixed service identity first, then the
/// user-supplied `OTEL_RESOURCE_ATTRIBUTES` pairs, which win on conflict.
pub fn resource_attributes(service_name: &str, raw_overrides: &str) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::from([
        (SERVICE_NAME.to_owned(), service_name.to_owned()),
        (
            SERVICE_VERSION.to_owned(),
            env!("CARGO_PKG_VERSION").to_owned(),
        ),
        (TELEMETRY_SDK_NAME.to_owned(), "opentelemetry".to_owned()),
        (TELEMETRY_SDK_LANGUAGE.to_owned(), "rust".to_owned()),
        (TELEMETRY_SDK_VERSION.to_owned(), sdk_version()),
    ]);
    attributes.extend(parse_key_value_list(raw_overrides));
    attributes
}

/// Version of the OpenTelemetry SDK linked into this binary, as reported by
/// the SDK's own telemetry detector.
fn sdk_version() -> String {
    TelemetryResourceDetector
        .detect()
        .iter()
        .find(|(key, _)| key.as_str() == TELEMETRY_SDK_VERSION)
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

/// Convert the attribute map into an SDK [`Resource`].
///
/// Built from an empty base so that only the attributes above are reported;
/// the SDK's own environment detectors would re-read `OTEL_RESOURCE_ATTRIBUTES`
/// without the trimming rules applied here.
pub fn build_resource(attributes: &BTreeMap<String, String>) -> Resource {
    Resource::builder_empty()
        .with_attributes(
            attributes
                .iter()
                .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
        )
        .build()
}
