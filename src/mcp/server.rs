//! MCP stdio server
//!
//! Reads one JSON-RPC message per line and writes one response per line.
//! Requests are handled concurrently; all responses go through a single
//! writer so lines never interleave. Nothing else may write to the output
//! stream, which is why logging goes to stderr.

use super::catalog;
use super::protocol::{
    InitializeResult, McpError, McpMethod, McpRequest, McpResponse, ServerInfo, ToolCallParams,
    ToolCallResult, PROTOCOL_VERSION,
};
use crate::gateway::Gateway;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Server name reported during initialization
pub const SERVER_NAME: &str = "cipherbot";

/// MCP server in front of a [`Gateway`]
pub struct McpServer {
    gateway: Arc<Gateway>,
}

impl McpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Serve stdin/stdout until stdin closes
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve line-delimited JSON-RPC from `reader` to `writer`
    ///
    /// Returns once the reader reaches EOF and every in-flight request has
    /// been answered.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP server listening on stdio");
        let (tx, mut rx) = mpsc::unbounded_channel::<McpResponse>();

        let read_loop = async move {
            let mut lines = reader.lines();
            let mut in_flight = JoinSet::new();

            while let Some(line) = lines
                .next_line()
                .await
                .context("Failed to read from MCP input")?
            {
                if line.trim().is_empty() {
                    continue;
                }

                let server = Arc::clone(&self);
                let tx = tx.clone();
                in_flight.spawn(async move {
                    if let Some(response) = server.handle_line(&line).await {
                        // The writer only goes away when output already failed.
                        let _ = tx.send(response);
                    }
                });

                while let Some(finished) = in_flight.try_join_next() {
                    log_join(finished);
                }
            }

            debug!(pending = in_flight.len(), "Input closed, draining in-flight requests");
            while let Some(finished) = in_flight.join_next().await {
                log_join(finished);
            }
            drop(tx);
            Ok::<(), anyhow::Error>(())
        };

        let write_loop = async {
            while let Some(response) = rx.recv().await {
                let mut line = serde_json::to_vec(&response).context("Failed to serialize response")?;
                line.push(b'\n');
                writer
                    .write_all(&line)
                    .await
                    .context("Failed to write MCP response")?;
                writer.flush().await.context("Failed to flush MCP output")?;
            }
            Ok::<(), anyhow::Error>(())
        };

        tokio::try_join!(read_loop, write_loop)?;
        info!("MCP input closed, shutting down");
        Ok(())
    }

    /// Handle one raw input line
    ///
    /// Returns `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Received malformed JSON");
                return Some(McpResponse::err(
                    Value::Null,
                    McpError::parse_error(format!("Parse error: {}", e)),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<McpRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(McpResponse::err(
                id,
                McpError::invalid_request(format!("Invalid request: {}", e)),
            )),
        }
    }

    /// Handle one parsed request
    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        let method = McpMethod::from(request.method.as_str());

        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        let result = match &method {
            McpMethod::Initialize => to_value(&InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: json!({ "tools": { "listChanged": false } }),
                server_info: ServerInfo {
                    name: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            }),
            McpMethod::Ping => Ok(json!({})),
            McpMethod::ToolsList => Ok(json!({ "tools": catalog::tools() })),
            McpMethod::ToolsCall => self.call(request.params).await,
            McpMethod::Initialized | McpMethod::Other(_) => {
                Err(McpError::method_not_found(method.as_str()))
            }
        };

        Some(match result {
            Ok(result) => McpResponse::ok(id, result),
            Err(error) => McpResponse::err(id, error),
        })
    }

    async fn call(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: ToolCallParams = params
            .ok_or_else(|| McpError::invalid_params("Missing tool call parameters"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| McpError::invalid_params(format!("Invalid tool call parameters: {}", e)))
            })?;

        let response =
            catalog::call_tool(&self.gateway, &params.name, params.arguments.as_ref()).await?;
        to_value(&ToolCallResult::text(response.text, response.is_error))
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::internal_error(e.to_string()))
}

fn log_join(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "Request handler task failed");
    }
}
