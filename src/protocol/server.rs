//! MCP server front end: owns the dispatcher and drives the stdio loop.

use crate::error::{McpError, Result};
use crate::protocol::handler::Dispatcher;
use crate::protocol::transport::{Inbound, StdioTransport, Transport};
use crate::protocol::types::*;
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// MCP Server.
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(registry: Arc<ToolRegistry>, info: ServerInfo) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(registry, info)),
        }
    }

    /// Shared dispatcher, for handing to HTTP transports.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn info(&self) -> &ServerInfo {
        self.dispatcher.server_info()
    }

    /// Run the server over process stdin/stdout.
    #[instrument(skip(self), fields(server = %self.info().name))]
    pub async fn run(&self) -> Result<()> {
        let transport = StdioTransport::stdio();
        self.run_with_transport(&transport).await
    }

    /// Serve requests from `transport` until end of input.
    ///
    /// Requests are handled one at a time, so responses are written in input
    /// order. A read error ends the loop and is returned; write errors are
    /// returned as well since the peer can no longer be reached.
    pub async fn run_with_transport<T: Transport + ?Sized>(&self, transport: &T) -> Result<()> {
        let info = self.info();
        info!("Starting MCP server: {} v{}", info.name, info.version);

        loop {
            let response = match transport.read_message().await? {
                Some(Inbound::Request(request)) => self.dispatcher.dispatch(request),
                Some(Inbound::Malformed(err)) => JsonRpcResponse::error(None, err.into()),
                None => {
                    debug!("EOF received, shutting down");
                    break;
                }
            };

            if let Err(e) = transport.write_response(&response).await {
                error!("Failed to send response: {}", e);
                return Err(e);
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Builder for MCP Server.
pub struct McpServerBuilder {
    registry: Option<Arc<ToolRegistry>>,
    name: String,
    version: String,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn build(self) -> Result<McpServer> {
        let registry = self.registry.ok_or_else(|| McpError::Internal {
            message: "Tool registry is required".into(),
        })?;

        Ok(McpServer::new(
            registry,
            ServerInfo {
                name: self.name,
                version: self.version,
            },
        ))
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
