//! HTTP transports: plain request/response and streamable HTTP with SSE.
//!
//! Both transports share the JSON-RPC status mapping, request parsing, CORS
//! policy and the [`RunningServer`] lifecycle handle defined here.

pub mod cors;
pub mod plain;
pub mod session;
pub mod sse;
pub mod streamable;

pub use plain::HttpTransport;
pub use session::{Session, SessionStore};
pub use streamable::StreamableHttpTransport;

use crate::config::HttpConfig;
use crate::error::{ErrorCode, ProtocolError, TransportError};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, RequestId};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const SSE_MEDIA_TYPE: &str = "text/event-stream";

/// HTTP status for a dispatch outcome.
pub fn status_for(response: &JsonRpcResponse) -> StatusCode {
    let Some(error) = &response.error else {
        return StatusCode::OK;
    };
    match error.error_code() {
        Some(ErrorCode::InvalidRequest | ErrorCode::InvalidParams) => StatusCode::BAD_REQUEST,
        Some(ErrorCode::MethodNotFound) => StatusCode::NOT_FOUND,
        Some(ErrorCode::InternalError) | None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Decode a request body.
///
/// On failure the returned error response echoes the `id` of the raw JSON
/// object when one can be recovered.
pub fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    serde_json::from_slice::<JsonRpcRequest>(body).map_err(|e| {
        let id = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|raw| raw.get("id").and_then(RequestId::from_value));
        JsonRpcResponse::error(id, ProtocolError::InvalidRequest(e.to_string()).into())
    })
}

pub(crate) fn json_response(status: StatusCode, response: &JsonRpcResponse) -> Response {
    (status, Json(response)).into_response()
}

/// All values of `name`, comma-joined.
pub(crate) fn header_values(headers: &HeaderMap, name: &HeaderName) -> String {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(",")
}

/// Hex-encoded token from `len` bytes of OS randomness.
pub(crate) fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A bound, serving HTTP transport.
///
/// Dropping the handle leaves the server running; call
/// [`RunningServer::shutdown`] to drain it.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
    background: Vec<JoinHandle<()>>,
}

impl RunningServer {
    /// Bind the configured address and serve `app` until `shutdown` is
    /// cancelled. Serves HTTPS when the config carries a certificate and key.
    pub(crate) async fn bind(
        config: &HttpConfig,
        app: Router,
        shutdown: CancellationToken,
        background: Vec<JoinHandle<()>>,
    ) -> Result<Self, TransportError> {
        let addr = config.addr();
        match config.tls() {
            Some((cert, key)) => {
                Self::bind_tls(&addr, cert, key, app, shutdown, background).await
            }
            None => Self::bind_plain(&addr, app, shutdown, background).await,
        }
    }

    async fn bind_plain(
        addr: &str,
        app: Router,
        shutdown: CancellationToken,
        background: Vec<JoinHandle<()>>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| bind_error(addr, source))?;
        let local_addr = listener.local_addr().map_err(TransportError::Serve)?;
        info!(addr = %local_addr, "HTTP server listening");

        let signal = shutdown.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        Ok(Self {
            local_addr,
            shutdown,
            server,
            background,
        })
    }

    async fn bind_tls(
        addr: &str,
        cert: &Path,
        key: &Path,
        app: Router,
        shutdown: CancellationToken,
        mut background: Vec<JoinHandle<()>>,
    ) -> Result<Self, TransportError> {
        let tls = RustlsConfig::from_pem_file(cert, key)
            .await
            .map_err(|source| TransportError::Tls {
                path: cert.display().to_string(),
                source,
            })?;

        let socket_addr = tokio::net::lookup_host(addr)
            .await
            .map_err(|source| bind_error(addr, source))?
            .next()
            .ok_or_else(|| bind_error(addr, std::io::ErrorKind::AddrNotAvailable.into()))?;

        let handle = Handle::new();
        let server = tokio::spawn(
            axum_server::bind_rustls(socket_addr, tls)
                .handle(handle.clone())
                .serve(app.into_make_service()),
        );

        let Some(local_addr) = handle.listening().await else {
            // The server task ends with the bind error when it never listened.
            return Err(match server.await {
                Ok(Err(source)) => bind_error(addr, source),
                joined => flatten(joined).err().unwrap_or_else(|| {
                    TransportError::Task("TLS server stopped before listening".into())
                }),
            });
        };
        info!(addr = %local_addr, "HTTPS server listening");

        // axum-server drains on its handle rather than on a future.
        let signal = shutdown.clone();
        background.push(tokio::spawn(async move {
            signal.cancelled().await;
            handle.graceful_shutdown(None);
        }));

        Ok(Self {
            local_addr,
            shutdown,
            server,
            background,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections, cancel open streams and background tasks,
    /// and wait up to `deadline` for in-flight requests to finish.
    ///
    /// Past the deadline the server task is aborted and
    /// [`TransportError::ShutdownTimeout`] is returned.
    pub async fn shutdown(self, deadline: Duration) -> Result<(), TransportError> {
        info!(addr = %self.local_addr, "Shutting down HTTP server...");
        self.shutdown.cancel();

        let abort = self.server.abort_handle();
        let result = match tokio::time::timeout(deadline, self.server).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                abort.abort();
                warn!(?deadline, "Graceful shutdown timed out; forcing close");
                Err(TransportError::ShutdownTimeout(deadline))
            }
        };

        join_background(self.background).await;
        result
    }

    /// Serve until `signal` resolves, then shut down within `deadline`.
    ///
    /// Returns early if the server task stops on its own.
    pub async fn run_until<F>(mut self, signal: F, deadline: Duration) -> Result<(), TransportError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = signal => {}
            joined = &mut self.server => {
                self.shutdown.cancel();
                join_background(self.background).await;
                return flatten(joined);
            }
        }
        self.shutdown(deadline).await
    }
}

fn bind_error(addr: &str, source: std::io::Error) -> TransportError {
    TransportError::Bind {
        addr: addr.to_string(),
        source,
    }
}

fn flatten(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), TransportError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::Serve(e)),
        Err(e) => Err(TransportError::Task(e.to_string())),
    }
}

async fn join_background(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }
}
