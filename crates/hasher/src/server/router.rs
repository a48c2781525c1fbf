//! Axum router construction.

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/hash", post(handlers::generate_hash))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        // Input size is not validated.
        .layer(DefaultBodyLimit::disable())
        .layer(from_fn_with_state(state.clone(), middleware::track_metrics))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::make_request_span::<Body>)
                .on_response(middleware::record_response_status::<Body>),
        )
        .layer(CompressionLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::http::{header, Request, StatusCode};
    use axum_test::TestServer;
    use futures::StreamExt;
    use opentelemetry::logs::AnyValue;
    use opentelemetry::trace::SpanKind;
    use opentelemetry_sdk::logs::{InMemoryLogExporter, SdkLoggerProvider};
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::crypto::sha256_hex;
    use crate::server::handlers::MASKED_INPUT;
    use crate::telemetry::init::subscriber;
    use crate::telemetry::{build_providers, TelemetryOptions};

    fn test_server() -> TestServer {
        TestServer::new(build(AppState::default())).unwrap()
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = build(AppState::default());
        let req = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn index_serves_html_form() {
        let resp = test_server().get("/").await;
        resp.assert_status_ok();
        let content_type = resp.header(header::CONTENT_TYPE);
        assert!(content_type.to_str().unwrap().starts_with("text/html"));
        assert!(resp.text().contains("<form"));
    }

    #[tokio::test]
    async fn hash_empty_body_object() {
        let resp = test_server().post("/hash").json(&json!({})).await;
        resp.assert_status_ok();
        resp.assert_json(&json!({
            "input": "",
            "hash": "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            "algorithm": "SHA256",
        }));
    }

    #[tokio::test]
    async fn hash_is_idempotent() {
        let server = test_server();
        let first = server
            .post("/hash")
            .json(&json!({"text": "repeat me"}))
            .await
            .json::<serde_json::Value>();
        let second = server
            .post("/hash")
            .json(&json!({"text": "repeat me"}))
            .await
            .json::<serde_json::Value>();
        assert_eq!(first["hash"], second["hash"]);
        assert_eq!(first["hash"], sha256_hex("repeat me"));
    }

    #[tokio::test]
    async fn hash_accepts_input_above_default_body_limit() {
        let text = "x".repeat(3 * 1024 * 1024);
        let resp = test_server().post("/hash").json(&json!({"text": text})).await;
        resp.assert_status_ok();
        let body = resp.json::<serde_json::Value>();
        assert_eq!(body["hash"], sha256_hex(&text));
        assert_eq!(body["hash"].as_str().unwrap().len(), 64);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upload_runs_to_completion() {
        let chunks = futures::stream::iter([r#"{"text":""#, r#"slow"}"#])
            .enumerate()
            .then(|(i, chunk)| async move {
                if i > 0 {
                    tokio::time::sleep(Duration::from_secs(31)).await;
                }
                Ok::<_, std::io::Error>(chunk)
            });
        let req = Request::builder()
            .method("POST")
            .uri("/hash")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from_stream(chunks))
            .unwrap();

        let resp = build(AppState::default()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["input"], "slow");
        assert_eq!(body["hash"], sha256_hex("slow"));
    }

    fn attribute(span: &SpanData, key: &str) -> Option<String> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.to_string())
    }

    #[tokio::test]
    async fn hash_span_nests_under_request_span_and_events_become_logs() {
        let span_exporter = InMemorySpanExporter::default();
        let log_exporter = InMemoryLogExporter::default();
        let tracer_provider = SdkTracerProvider::builder()
            .with_simple_exporter(span_exporter.clone())
            .build();
        let logger_provider = SdkLoggerProvider::builder()
            .with_simple_exporter(log_exporter.clone())
            .build();
        let _default = tracing::subscriber::set_default(subscriber(
            "info",
            Some(&tracer_provider),
            Some(&logger_provider),
        ));

        let secret = "top secret";
        let req = Request::builder()
            .method("POST")
            .uri("/hash")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "text": secret }).to_string()))
            .unwrap();
        let resp = build(AppState::default()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        // The request span stays open until the response body is dropped.
        drop(resp);

        let spans = span_exporter.get_finished_spans().unwrap();
        let hash_span = spans
            .iter()
            .find(|s| s.name == "generate_hash")
            .expect("generate_hash span exported");
        let request_span = spans
            .iter()
            .find(|s| s.span_context.span_id() == hash_span.parent_span_id)
            .expect("generate_hash has an exported parent");
        assert_eq!(request_span.name, "POST /hash");
        assert_eq!(request_span.span_kind, SpanKind::Server);
        assert_eq!(attribute(request_span, "http.route").as_deref(), Some("/hash"));
        assert_eq!(
            attribute(request_span, "http.response.status_code").as_deref(),
            Some("200")
        );

        assert_eq!(
            attribute(hash_span, "input.length"),
            Some(secret.chars().count().to_string())
        );
        assert_eq!(attribute(hash_span, "input.masked").as_deref(), Some(MASKED_INPUT));
        assert_eq!(attribute(hash_span, "hash.algorithm").as_deref(), Some("SHA256"));
        for span in &spans {
            assert!(
                span.attributes
                    .iter()
                    .all(|kv| !kv.value.to_string().contains(secret)),
                "raw input leaked into span {}",
                span.name
            );
        }

        let logs = log_exporter.get_emitted_logs().unwrap();
        let bodies: Vec<String> = logs
            .iter()
            .filter_map(|log| match log.record.body() {
                Some(AnyValue::String(body)) => Some(body.as_str().to_owned()),
                _ => None,
            })
            .collect();
        assert!(bodies.iter().any(|b| b == "generating hash"), "{bodies:?}");
        assert!(bodies.iter().any(|b| b == "generated hash"), "{bodies:?}");
        assert!(logs
            .iter()
            .all(|log| !format!("{:?}", log.record).contains(secret)));
    }

    #[tokio::test]
    async fn hash_is_post_only() {
        let resp = test_server().get("/hash").await;
        assert!(resp.status_code().is_client_error());
    }

    #[tokio::test]
    async fn health_route_reports_healthy() {
        let resp = test_server().get("/health").await;
        resp.assert_status_ok();
        resp.assert_json(&json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn serves_with_export_disabled() {
        let guard = build_providers(&TelemetryOptions::disabled("sha256-hasher")).unwrap();
        assert!(!guard.export_enabled());

        let server = TestServer::new(build(AppState::new(&guard.meter()))).unwrap();
        server.get("/health").await.assert_json(&json!({"status": "healthy"}));
        server
            .post("/hash")
            .json(&json!({"text": "hello"}))
            .await
            .assert_json(&json!({
                "input": "hello",
                "hash": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
                "algorithm": "SHA256",
            }));
    }
}
