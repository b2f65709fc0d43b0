//! MCP (Model Context Protocol) Server
//!
//! The transport shell around the gateway: JSON-RPC 2.0 over line-delimited
//! stdio, built directly on Tokio and Serde (no external SDK).
//!
//! # Architecture
//!
//! The implementation is organized into three layers:
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Catalog Layer** (`catalog`): the named operations, their schemas and routing
//! 3. **Server Layer** (`server`): the concurrent line-oriented server loop

// Protocol layer: JSON-RPC 2.0 message types
pub mod protocol;

// Operation catalog and tools/call routing
pub mod catalog;

// Line-oriented server loop
pub mod server;

// Re-export commonly used types for convenience
pub use protocol::{
    Content, InitializeResult, McpError, McpMethod, McpRequest, McpResponse, ServerInfo, Tool,
    ToolCallParams, ToolCallResult,
};
pub use server::McpServer;

// Property-based tests module
#[cfg(test)]
mod proptests;
