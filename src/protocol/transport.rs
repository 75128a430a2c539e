//! Line-delimited transport for JSON-RPC messages.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::types::{JsonRpcRequest, JsonRpcResponse};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::{debug, error, trace};

/// One decoded input line.
#[derive(Debug)]
pub enum Inbound {
    Request(JsonRpcRequest),
    /// The line was not a JSON-RPC request.
    Malformed(ProtocolError),
}

/// Transport trait for MCP communication.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Next message, or `None` at end of input.
    async fn read_message(&self) -> Result<Option<Inbound>>;
    async fn write_response(&self, response: &JsonRpcResponse) -> Result<()>;
}

/// Newline-delimited JSON transport over any async reader/writer pair.
pub struct StdioTransport<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
}

impl StdioTransport<BufReader<Stdin>, Stdout> {
    /// Transport bound to the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    /// Read the next non-blank line as raw bytes.
    ///
    /// Bytes are not required to be UTF-8 here; a bad line is reported by
    /// the decoder so later lines are still served.
    async fn read_line(&self) -> Result<Option<Vec<u8>>> {
        let mut reader = self.reader.lock().await;
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => return Ok(None), // EOF
                Ok(_) => {
                    let trimmed = line.trim_ascii();
                    if trimmed.is_empty() {
                        continue;
                    }
                    trace!("Received line: {}", String::from_utf8_lossy(trimmed));
                    return Ok(Some(trimmed.to_vec()));
                }
                Err(e) => {
                    error!("Error reading input: {}", e);
                    return Err(McpError::Io(e));
                }
            }
        }
    }

    /// Write a line and flush it.
    async fn write_line(&self, content: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        trace!("Sending line: {}", content);
        writer.write_all(content.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_message(&self) -> Result<Option<Inbound>> {
        let Some(line) = self.read_line().await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<JsonRpcRequest>(&line) {
            Ok(request) => {
                debug!("Received request: method={}", request.method);
                Ok(Some(Inbound::Request(request)))
            }
            Err(e) => {
                error!("Failed to parse message: {}", e);
                Ok(Some(Inbound::Malformed(ProtocolError::ParseError(e.to_string()))))
            }
        }
    }

    async fn write_response(&self, response: &JsonRpcResponse) -> Result<()> {
        let json = serde_json::to_string(response)?;
        debug!("Sending response: id={:?}", response.id);
        self.write_line(&json).await
    }
}
