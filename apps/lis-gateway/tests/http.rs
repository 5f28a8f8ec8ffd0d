use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use lis_gateway::{AppState, LinkGenerator, build_router};
use lis_sync::{HealthCircuit, SyncError};
use tower::ServiceExt;

#[derive(Default)]
struct FakeLinks {
    fail: bool,
    requested: Mutex<Vec<String>>,
}

#[async_trait]
impl LinkGenerator for FakeLinks {
    async fn generate(&self, barcode: &str) -> Result<String, SyncError> {
        self.requested
            .lock()
            .expect("lock")
            .push(barcode.to_string());
        if self.fail {
            return Err(SyncError::Status {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(format!("https://results.example/LAB7ORD{barcode}"))
    }
}

fn state(circuit: Arc<HealthCircuit>, links: Arc<FakeLinks>) -> AppState {
    let links: Arc<dyn LinkGenerator> = links;
    AppState {
        circuit,
        links: Some(links),
    }
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

fn generate(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate_result_public")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn ping_reflects_circuit_state() {
    let circuit = Arc::new(HealthCircuit::new());
    let app = build_router(state(Arc::clone(&circuit), Arc::new(FakeLinks::default())));

    let response = app
        .clone()
        .oneshot(Request::get("/ping").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_text(response).await, "pong");

    circuit.record_failure("timeout");
    let response = app
        .oneshot(Request::get("/ping").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_text(response).await, "server connection lost");
}

#[tokio::test]
async fn generate_returns_plain_text_link() {
    let links = Arc::new(FakeLinks::default());
    let app = build_router(state(Arc::new(HealthCircuit::new()), Arc::clone(&links)));

    let response = app
        .oneshot(generate(r#"{"barcode": "S1"}"#))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/plain")
    );
    assert_eq!(body_text(response).await, "https://results.example/LAB7ORDS1");
    assert_eq!(*links.requested.lock().expect("lock"), vec!["S1".to_string()]);
}

#[tokio::test]
async fn malformed_or_empty_barcode_is_bad_request() {
    let links = Arc::new(FakeLinks::default());
    let app = build_router(state(Arc::new(HealthCircuit::new()), Arc::clone(&links)));

    for body in ["not json", r#"{"barcode": ""}"#, "{}"] {
        let response = app.clone().oneshot(generate(body)).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
    }
    assert!(links.requested.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn upstream_failure_is_internal_error() {
    let links = Arc::new(FakeLinks {
        fail: true,
        ..FakeLinks::default()
    });
    let app = build_router(state(Arc::new(HealthCircuit::new()), links));

    let response = app
        .oneshot(generate(r#"{"barcode": "S1"}"#))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body_text(response)
            .await
            .starts_with("Failed to generate public link:")
    );
}

#[tokio::test]
async fn cors_preflight_is_allowed() {
    let app = build_router(state(
        Arc::new(HealthCircuit::new()),
        Arc::new(FakeLinks::default()),
    ));
    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/generate_result_public")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
}
