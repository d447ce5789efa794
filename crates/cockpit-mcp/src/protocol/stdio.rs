//! stdio Transport for MCP
//!
//! Newline-delimited JSON-RPC over stdin/stdout. Logs go to stderr.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, warn};

use super::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::server::McpServer;

/// Sent when a response cannot be serialized, so the client never hangs
const FALLBACK_ERROR: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;

/// stdio Transport for MCP server
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }

    /// Serve requests until stdin closes
    pub async fn run(self, server: McpServer) -> Result<(), io::Error> {
        serve(
            server,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
        .await
    }
}

/// Read one request per line from `input` and answer on `output`.
///
/// A line that is not UTF-8 or not a JSON-RPC request gets a parse error
/// reply; the loop only ends when `input` closes or `output` fails.
async fn serve<R, W>(mut server: McpServer, mut input: R, mut output: W) -> Result<(), io::Error>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                debug!("Received: {} bytes", line.len());
                match serde_json::from_str::<JsonRpcRequest>(line) {
                    Ok(request) => server.handle_request(request).await,
                    Err(e) => {
                        warn!("Failed to parse request: {}", e);
                        Some(JsonRpcResponse::error(None, JsonRpcError::parse_error()))
                    }
                }
            }
            Err(e) => {
                warn!("Request is not valid UTF-8: {}", e);
                Some(JsonRpcResponse::error(None, JsonRpcError::parse_error()))
            }
        };

        if let Some(response) = response {
            write_response(&mut output, &response).await?;
        }
    }

    debug!("stdin closed");
    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    out: &mut W,
    response: &JsonRpcResponse,
) -> Result<(), io::Error> {
    let json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            FALLBACK_ERROR.to_string()
        }
    };
    debug!("Sending: {} bytes", json.len());
    out.write_all(json.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}
