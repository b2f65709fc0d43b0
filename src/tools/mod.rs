//! Tool Execution Subsystem
//!
//! This module holds the policy and execution primitives the gateway is
//! built from. It enforces the rules that keep untrusted requests from
//! turning into arbitrary commands.
//!
//! # Security Features
//!
//! - **Allow-listing**: Generic dispatch may only launch registered tools
//! - **List Invocation**: Commands are executed as argument vectors, never through a shell
//! - **Input Sanitization**: Free-form tokens, paths and identifiers are neutralized
//! - **Timeout Enforcement**: Every execution runs under an operation-specific timeout
//! - **Scoped Elevation**: Privileged runs require an explicit elevation capability
//!
//! # Architecture
//!
//! The module is organized into:
//! - `sanitize.rs`: Pure input sanitizers
//! - `registry.rs`: The allow-list of dispatchable tools
//! - `executor.rs`: Subprocess supervision with timeout handling
//! - `timeout.rs`: Timeout presets per kind of operation
//!
//! # Example
//!
//! ```no_run
//! use cipherbot_gateway::tools::{
//!     split_arguments, AllowList, CommandSpec, ExecutionTimeout, Invocation, ProcessRunner,
//!     ToolExecutor,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = AllowList::default();
//!     let executor = ToolExecutor::new();
//!
//!     if registry.is_permitted("whatweb") {
//!         let spec = CommandSpec::new("whatweb", split_arguments("http://example.com"));
//!         let invocation = Invocation::new(spec, ExecutionTimeout::standard())
//!             .elevated(registry.requires_elevation("whatweb"));
//!
//!         let outcome = executor.run(invocation).await;
//!         println!("Exit code: {}", outcome.exit_code());
//!         println!("Stdout: {}", outcome.stdout());
//!     }
//! }
//! ```

mod executor;
mod registry;
mod sanitize;
mod timeout;

pub use executor::{
    CommandSpec, Elevation, ExecutionFailure, ExecutionOutcome, ExecutorConfig, Invocation,
    PartialOutput, ProcessRunner, ToolExecutor,
};
pub use registry::{AllowList, ToolId, DEFAULT_ELEVATED_TOOLS, DEFAULT_PERMITTED_TOOLS};
pub use sanitize::{
    sanitize_identifier_token, sanitize_path, sanitize_shell_token, split_arguments,
    SHELL_METACHARACTERS,
};
pub use timeout::ExecutionTimeout;
