//! MCP streamable HTTP transport.
//!
//! One endpoint, `/mcp`:
//!
//! * every request must carry `MCP-Protocol-Version`;
//! * an `Mcp-Session-Id`, when present, must name a live session;
//! * `POST` runs one JSON-RPC call and answers with JSON, or with a single
//!   SSE `message` event for `tools/call` when the client accepts SSE;
//! * `GET` opens a long-lived SSE stream, creating a session if needed.

use crate::config::HttpConfig;
use crate::error::TransportError;
use crate::http::session::{REAP_INTERVAL, SessionStore};
use crate::http::{
    JSON_MEDIA_TYPE, RunningServer, SSE_MEDIA_TYPE, cors, header_values, json_response,
    parse_request, sse, status_for,
};
use crate::protocol::{Dispatcher, JsonRpcResponse};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

pub const PROTOCOL_VERSION_HEADER: HeaderName = HeaderName::from_static("mcp-protocol-version");
pub const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("mcp-session-id");

#[derive(Clone)]
struct StreamableState {
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<SessionStore>,
    shutdown: CancellationToken,
    heartbeat_interval: Duration,
}

/// Streamable HTTP transport with its own session store.
pub struct StreamableHttpTransport {
    dispatcher: Arc<Dispatcher>,
    config: HttpConfig,
    sessions: Arc<SessionStore>,
    shutdown: CancellationToken,
    heartbeat_interval: Duration,
    reap_interval: Duration,
}

impl StreamableHttpTransport {
    pub fn new(dispatcher: Arc<Dispatcher>, config: HttpConfig) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_timeout));
        Self {
            dispatcher,
            config,
            sessions,
            shutdown: CancellationToken::new(),
            heartbeat_interval: sse::HEARTBEAT_INTERVAL,
            reap_interval: REAP_INTERVAL,
        }
    }

    pub fn addr(&self) -> String {
        self.config.addr()
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// The `/mcp` router, with CORS, timeout, concurrency and trace layers.
    pub fn router(&self) -> Router {
        let state = StreamableState {
            dispatcher: Arc::clone(&self.dispatcher),
            sessions: Arc::clone(&self.sessions),
            shutdown: self.shutdown.clone(),
            heartbeat_interval: self.heartbeat_interval,
        };

        let router = Router::new()
            .route("/mcp", any(handle_mcp))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(GlobalConcurrencyLimitLayer::new(self.config.max_connections));

        match cors::layer(&self.config.cors, cors::streamable_allow_headers()) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }

    /// Bind and serve, with the session reaper running alongside.
    ///
    /// Shutting the returned server down also ends open SSE streams and the
    /// reaper.
    pub async fn start(self) -> Result<RunningServer, TransportError> {
        let addr = self.addr();
        info!("Starting MCP streamable HTTP server on {}", addr);

        let app = self.router();
        let reaper = self
            .sessions
            .spawn_reaper(self.reap_interval, self.shutdown.child_token());
        RunningServer::bind(&self.config, app, self.shutdown, vec![reaper]).await
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

async fn handle_mcp(
    State(state): State<StreamableState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let has_version = headers
        .get(&PROTOCOL_VERSION_HEADER)
        .is_some_and(|v| !v.is_empty());
    if !has_version {
        warn!(%method, "Rejected request without protocol version");
        return plain(StatusCode::BAD_REQUEST, "MCP-Protocol-Version header required");
    }

    let session_id = headers
        .get(&SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    if let Some(id) = &session_id
        && !state.sessions.validate(id)
    {
        warn!(session_id = %id, "Rejected invalid or expired session");
        return plain(StatusCode::UNAUTHORIZED, "Invalid or expired session");
    }

    let accept = header_values(&headers, &header::ACCEPT);
    match method {
        Method::POST => handle_post(&state, &accept, &body, session_id),
        Method::GET => handle_get(&state, &accept, session_id),
        _ => plain(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
    }
}

fn handle_post(
    state: &StreamableState,
    accept: &str,
    body: &[u8],
    session_id: Option<String>,
) -> Response {
    let accepts_sse = accept.contains(SSE_MEDIA_TYPE);
    if !accept.contains(JSON_MEDIA_TYPE) && !accepts_sse {
        return plain(
            StatusCode::BAD_REQUEST,
            "Accept header must include application/json or text/event-stream",
        );
    }

    let request = match parse_request(body) {
        Ok(request) => request,
        Err(response) => return json_response(status_for(&response), &response),
    };

    let stream = accepts_sse && request.method == "tools/call";
    let response = state.dispatcher.dispatch(request);

    if stream {
        sse_message(&response, session_id.as_deref())
    } else {
        json_response(status_for(&response), &response)
    }
}

fn handle_get(state: &StreamableState, accept: &str, session_id: Option<String>) -> Response {
    if !accept.contains(SSE_MEDIA_TYPE) {
        return plain(
            StatusCode::BAD_REQUEST,
            "Accept header must include text/event-stream for GET requests",
        );
    }

    let session_id = session_id.unwrap_or_else(|| {
        let id = state.sessions.create();
        info!(session_id = %id, "Created new session");
        id
    });

    let stream = sse::session_stream(
        session_id.clone(),
        state.heartbeat_interval,
        state.shutdown.child_token(),
    );
    with_session_header(Sse::new(stream).into_response(), Some(&session_id))
}

fn sse_message(response: &JsonRpcResponse, session_id: Option<&str>) -> Response {
    match sse::message_event(response) {
        Ok(event) => {
            debug!(id = ?response.id, "Delivering response as SSE event");
            with_session_header(Sse::new(sse::single(event)).into_response(), session_id)
        }
        Err(e) => {
            error!(error = %e, "Failed to encode SSE event");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode response")
        }
    }
}

fn with_session_header(mut response: Response, session_id: Option<&str>) -> Response {
    if let Some(value) = session_id.and_then(|id| HeaderValue::from_str(id).ok()) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    response
}
