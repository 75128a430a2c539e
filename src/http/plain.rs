//! Plain HTTP transport: one JSON-RPC request per `POST /mcp`, plus
//! health, tool listing and metrics endpoints.

use crate::config::HttpConfig;
use crate::error::TransportError;
use crate::http::{
    JSON_MEDIA_TYPE, RunningServer, cors, header_values, json_response, parse_request, status_for,
};
use crate::protocol::{Dispatcher, JsonRpcRequest, JsonRpcResponse};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Request counters for `POST /mcp`.
#[derive(Debug)]
pub struct RequestMetrics {
    started_at: Instant,
    total: AtomicU64,
    success: AtomicU64,
    errors: AtomicU64,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }
}

impl RequestMetrics {
    pub fn record(&self, response: &JsonRpcResponse) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if response.is_error() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        } else {
            self.success.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> RequestCounts {
        RequestCounts {
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestCounts {
    pub total: u64,
    pub success: u64,
    pub errors: u64,
}

#[derive(Serialize)]
struct HealthBody<'a> {
    status: &'static str,
    timestamp: String,
    version: &'a str,
}

#[derive(Serialize)]
struct MetricsBody<'a> {
    server: ServerMetrics<'a>,
    requests: RequestCounts,
}

#[derive(Serialize)]
struct ServerMetrics<'a> {
    uptime: u64,
    version: &'a str,
    transport: &'static str,
}

#[derive(Clone)]
struct PlainState {
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<RequestMetrics>,
}

/// Plain request/response HTTP transport.
pub struct HttpTransport {
    dispatcher: Arc<Dispatcher>,
    config: HttpConfig,
    metrics: Arc<RequestMetrics>,
}

impl HttpTransport {
    pub fn new(dispatcher: Arc<Dispatcher>, config: HttpConfig) -> Self {
        Self {
            dispatcher,
            config,
            metrics: Arc::new(RequestMetrics::default()),
        }
    }

    pub fn addr(&self) -> String {
        self.config.addr()
    }

    pub fn metrics(&self) -> &Arc<RequestMetrics> {
        &self.metrics
    }

    pub fn router(&self) -> Router {
        let state = PlainState {
            dispatcher: Arc::clone(&self.dispatcher),
            metrics: Arc::clone(&self.metrics),
        };

        let router = Router::new()
            .route("/mcp", post(handle_mcp))
            .route("/health", get(handle_health))
            .route("/tools", get(handle_tools))
            .route("/metrics", get(handle_metrics))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(GlobalConcurrencyLimitLayer::new(self.config.max_connections));

        match cors::layer(&self.config.cors, cors::plain_allow_headers()) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }

    pub async fn start(self) -> Result<RunningServer, TransportError> {
        let addr = self.addr();
        info!("Starting MCP HTTP server on {}", addr);
        let app = self.router();
        RunningServer::bind(&self.config, app, CancellationToken::new(), Vec::new()).await
    }
}

async fn handle_mcp(
    State(state): State<PlainState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = header_values(&headers, &header::CONTENT_TYPE);
    if !content_type.contains(JSON_MEDIA_TYPE) {
        warn!(content_type = %content_type, "Rejected non-JSON request");
        return (StatusCode::BAD_REQUEST, "Content-Type must be application/json").into_response();
    }

    let response = match parse_request(&body) {
        Ok(request) => state.dispatcher.dispatch(request),
        Err(response) => {
            debug!("Failed to parse request body");
            response
        }
    };
    state.metrics.record(&response);
    json_response(status_for(&response), &response)
}

async fn handle_health(State(state): State<PlainState>) -> Response {
    Json(HealthBody {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: &state.dispatcher.server_info().version,
    })
    .into_response()
}

async fn handle_tools(State(state): State<PlainState>) -> Response {
    let request = JsonRpcRequest::new("tools/list").with_id("tools-list");
    let response = state.dispatcher.dispatch(request);
    json_response(status_for(&response), &response)
}

async fn handle_metrics(State(state): State<PlainState>) -> Response {
    Json(MetricsBody {
        server: ServerMetrics {
            uptime: state.metrics.uptime_secs(),
            version: &state.dispatcher.server_info().version,
            transport: "http",
        },
        requests: state.metrics.snapshot(),
    })
    .into_response()
}
