//! Property-Based Tests for the MCP Server
//!
//! These tests use proptest to check invariants of request handling for
//! random inputs.
//!
//! # Test Strategies
//!
//! - **Robustness**: arbitrary input lines never panic and yield at most one response
//! - **Id Echo**: numeric and string ids come back unchanged
//! - **Argument Coercion**: scalar tool arguments never turn into protocol errors
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib mcp::proptests
//! ```

use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::gateway::testing::RecordingRunner;
use crate::gateway::{Gateway, GatewaySettings};
use crate::mcp::server::McpServer;
use crate::tools::AllowList;

fn server() -> McpServer {
    McpServer::new(Arc::new(Gateway::new(
        GatewaySettings::default(),
        Arc::new(AllowList::default()),
        Arc::new(RecordingRunner::new()),
    )))
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

// Helper: Generate request ids of both allowed shapes
fn arb_id() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9-]{1,16}".prop_map(Value::String),
    ]
}

// Helper: Generate scalar argument values
fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[ -~]{0,20}".prop_map(Value::String),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Arbitrary input never panics the handler
    #[test]
    fn prop_arbitrary_lines_are_handled(line in ".{0,200}") {
        let server = server();
        let response = block_on(server.handle_line(&line));
        if let Some(response) = response {
            prop_assert!(response.result.is_some() != response.error.is_some());
        }
    }

    /// Ids are echoed verbatim
    #[test]
    fn prop_ids_are_echoed(id in arb_id()) {
        let server = server();
        let line = json!({"jsonrpc": "2.0", "id": id.clone(), "method": "ping"}).to_string();
        let response = block_on(server.handle_line(&line)).unwrap();
        prop_assert_eq!(response.id, id);
    }

    /// Scalar arguments are coerced to text instead of being rejected
    #[test]
    fn prop_scalar_arguments_are_accepted(target in arb_scalar(), ports in arb_scalar()) {
        let server = server();
        let line = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": "nmap_scan", "arguments": {"target": target, "ports": ports}}
        })
        .to_string();

        let response = block_on(server.handle_line(&line)).unwrap();
        prop_assert!(response.error.is_none());
        let result = response.result.unwrap();
        prop_assert!(result["content"][0]["text"].is_string());
    }
}
