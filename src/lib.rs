//! Calculator MCP server.
//!
//! Exposes a registry of tools over the Model Context Protocol, reachable
//! through stdio, plain HTTP or streamable HTTP with Server-Sent Events.
//!
//! # Example
//!
//! ```no_run
//! use calc_mcp_server::{
//!     config::HttpConfig,
//!     http::HttpTransport,
//!     protocol::McpServerBuilder,
//!     tools::create_registry,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = McpServerBuilder::new()
//!         .registry(Arc::new(create_registry()))
//!         .build()?;
//!
//!     let running = HttpTransport::new(server.dispatcher(), HttpConfig::default())
//!         .start()
//!         .await?;
//!     let ctrl_c = async { tokio::signal::ctrl_c().await.unwrap_or(()) };
//!     running.run_until(ctrl_c, Duration::from_secs(10)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod protocol;
pub mod tools;

pub use config::{HttpConfig, HttpConfigBuilder, ServerConfig, TransportKind};
pub use error::{McpError, Result};
pub use http::{HttpTransport, RunningServer, StreamableHttpTransport};
pub use protocol::{Dispatcher, McpServer, McpServerBuilder};
pub use tools::{ToolHandler, ToolRegistry, create_registry};
