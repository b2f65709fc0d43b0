//! CipherBot Gateway Library
//!
//! A command-execution gateway that lets an automated agent run a curated
//! set of command-line security tools and touch a confined slice of the
//! host filesystem, exposed as MCP operations over stdio.
//!
//! - [`tools`]: input sanitization, the allow-list and the process runner
//! - [`gateway`]: the named operations built on top of them
//! - [`mcp`]: the JSON-RPC transport shell

pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod mcp;
pub mod metrics;
pub mod metrics_server;
pub mod tools;
