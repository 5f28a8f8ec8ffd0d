//! HTTP 辅助接口
//!
//! - `GET /ping`：上游连接状态（熔断断开时 503）
//! - `POST /generate_result_public`：按条码申请结果公开链接

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lis_sync::{HealthCircuit, ResultLinkService, SyncError};
use lis_telemetry::new_request_ids;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, warn};

/// 结果链接生成接口（便于替换上游实现）。
#[async_trait]
pub trait LinkGenerator: Send + Sync {
    async fn generate(&self, barcode: &str) -> Result<String, SyncError>;
}

#[async_trait]
impl LinkGenerator for ResultLinkService {
    async fn generate(&self, barcode: &str) -> Result<String, SyncError> {
        ResultLinkService::generate(self, barcode).await
    }
}

#[derive(Clone)]
pub struct AppState {
    pub circuit: Arc<HealthCircuit>,
    /// 未启用外发同步时为空
    pub links: Option<Arc<dyn LinkGenerator>>,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    barcode: String,
}

/// 创建 HTTP 路由（含 CORS、请求追踪）。
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/ping", get(ping))
        .route("/generate_result_public", post(generate_result_public))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_context))
        .layer(cors)
}

async fn ping(State(state): State<AppState>) -> Response {
    if !state.circuit.is_active() {
        return text(StatusCode::SERVICE_UNAVAILABLE, "server connection lost");
    }
    text(StatusCode::OK, "pong")
}

async fn generate_result_public(State(state): State<AppState>, body: Bytes) -> Response {
    let request: GenerateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(target: "lis.http", error = %err, "invalid_request_body");
            return text(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };
    let barcode = request.barcode.trim();
    if barcode.is_empty() {
        return text(StatusCode::BAD_REQUEST, "Barcode is required");
    }
    let Some(links) = &state.links else {
        return text(StatusCode::SERVICE_UNAVAILABLE, "result sync disabled");
    };

    match links.generate(barcode).await {
        Ok(link) => text(StatusCode::OK, link),
        Err(err) => {
            error!(target: "lis.http", barcode, error = %err, "generate_public_link_failed");
            text(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to generate public link: {err}"),
            )
        }
    }
}

fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain")],
        body.into(),
    )
        .into_response()
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    // 生成 request_id 与 trace_id，并注入请求扩展与日志
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}
