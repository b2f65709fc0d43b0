//! Operation catalog
//!
//! The named operations exposed over MCP, their parameter schemas, and the
//! routing from a `tools/call` request to the gateway. Every parameter is a
//! named string; a missing parameter takes its documented default.

use super::protocol::{McpError, Tool};
use crate::gateway::{Gateway, ToolResponse};
use crate::metrics;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

struct Param {
    name: &'static str,
    description: &'static str,
    default: &'static str,
}

struct Operation {
    name: &'static str,
    description: &'static str,
    params: &'static [Param],
}

const fn param(name: &'static str, description: &'static str) -> Param {
    Param {
        name,
        description,
        default: "",
    }
}

const fn param_or(name: &'static str, description: &'static str, default: &'static str) -> Param {
    Param {
        name,
        description,
        default,
    }
}

const OPERATIONS: &[Operation] = &[
    // Package management
    Operation {
        name: "install_tool",
        description: "Install a new security tool or package using apt and add it to the approved tools.",
        params: &[param("package", "Package name to install")],
    },
    Operation {
        name: "search_tool",
        description: "Search for available packages in apt repositories.",
        params: &[param("query", "Search term")],
    },
    Operation {
        name: "remove_tool",
        description: "Remove an installed package using apt and drop it from the approved tools.",
        params: &[param("package", "Package name to remove")],
    },
    Operation {
        name: "list_installed_tools",
        description: "List all currently installed packages.",
        params: &[],
    },
    Operation {
        name: "install_pip_package",
        description: "Install a Python package into the gateway's virtual environment.",
        params: &[param("package", "Python package name")],
    },
    // Filesystem
    Operation {
        name: "fs_read",
        description: "Read a text file. Path is relative to the mounted host directory.",
        params: &[param("path", "File path")],
    },
    Operation {
        name: "fs_write",
        description: "Write content to a file, creating parent directories. Path is relative to the mounted host directory.",
        params: &[param("path", "File path"), param("content", "Text to write")],
    },
    Operation {
        name: "fs_execute",
        description: "Execute a script or binary from the mounted host directory.",
        params: &[
            param("path", "Executable path"),
            param("arguments", "Whitespace-separated arguments"),
        ],
    },
    Operation {
        name: "fs_list",
        description: "List directory contents. Path is relative to the mounted host directory.",
        params: &[param_or("path", "Directory path", ".")],
    },
    Operation {
        name: "fs_mkdir",
        description: "Create a directory and any missing parents.",
        params: &[param("path", "Directory path")],
    },
    Operation {
        name: "fs_delete",
        description: "Permanently delete a file or directory tree.",
        params: &[param("path", "Path to delete")],
    },
    // Tool dispatch
    Operation {
        name: "run_tool",
        description: "Run an approved bug-bounty or pentesting tool with the given arguments.",
        params: &[
            param("tool", "Tool name from the approved list"),
            param("arguments", "Whitespace-separated arguments"),
        ],
    },
    Operation {
        name: "nmap_scan",
        description: "Network port scan of a host using nmap (elevated).",
        params: &[
            param("target", "Target IP or hostname"),
            param_or("scan_type", "One of basic, quick, full, service", "basic"),
            param("ports", "Port list, e.g. 22,80,8000-8100"),
        ],
    },
    Operation {
        name: "nikto_scan",
        description: "Scan a web server for vulnerabilities using nikto (elevated).",
        params: &[param("target", "Target URL or hostname")],
    },
    Operation {
        name: "ffuf_scan",
        description: "Fast web fuzzer for directory and parameter discovery.",
        params: &[
            param("url", "Target URL; FUZZ marks the fuzzing position"),
            param_or("wordlist", "common or big", "common"),
        ],
    },
    Operation {
        name: "sqlmap_test",
        description: "Test a web application for SQL injection using sqlmap (elevated).",
        params: &[
            param("url", "Target URL"),
            param("data", "POST body to test"),
        ],
    },
    Operation {
        name: "nuclei_scan",
        description: "Template-based vulnerability scan using nuclei (elevated).",
        params: &[
            param("target", "Target URL or host"),
            param_or("templates", "Template path or tag", "default"),
        ],
    },
    Operation {
        name: "whatweb_scan",
        description: "Identify web technologies and frameworks.",
        params: &[param("target", "Target URL or hostname")],
    },
];

/// Definitions of every operation for `tools/list`
pub fn tools() -> Vec<Tool> {
    OPERATIONS
        .iter()
        .map(|op| {
            let properties: Map<String, Value> = op
                .params
                .iter()
                .map(|p| {
                    (
                        p.name.to_string(),
                        json!({
                            "type": "string",
                            "description": p.description,
                            "default": p.default,
                        }),
                    )
                })
                .collect();

            Tool {
                name: op.name.to_string(),
                description: op.description.to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": properties,
                }),
            }
        })
        .collect()
}

/// Resolved string arguments for one call
struct Arguments {
    values: Vec<String>,
}

impl Arguments {
    fn resolve(op: &Operation, raw: Option<&Value>) -> Result<Self, McpError> {
        let empty = Map::new();
        let map = match raw {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => return Err(McpError::invalid_params("Tool arguments must be an object")),
        };

        let values = op
            .params
            .iter()
            .map(|p| match map.get(p.name) {
                None | Some(Value::Null) => Ok(p.default.to_string()),
                Some(Value::String(s)) => Ok(s.clone()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                Some(Value::Bool(b)) => Ok(b.to_string()),
                Some(_) => Err(McpError::invalid_params(format!(
                    "Argument '{}' must be a string",
                    p.name
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { values })
    }

    fn get(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Route a `tools/call` to the gateway
///
/// Unknown operations and malformed arguments are protocol errors; anything
/// the operation itself reports comes back as a [`ToolResponse`].
pub async fn call_tool(
    gateway: &Gateway,
    name: &str,
    arguments: Option<&Value>,
) -> Result<ToolResponse, McpError> {
    let op = OPERATIONS
        .iter()
        .find(|op| op.name == name)
        .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {}", name)))?;
    let args = Arguments::resolve(op, arguments)?;
    debug!(operation = name, args = ?args.values, "Tool call");

    let response = match op.name {
        "install_tool" => gateway.install_tool(args.get(0)).await,
        "search_tool" => gateway.search_tool(args.get(0)).await,
        "remove_tool" => gateway.remove_tool(args.get(0)).await,
        "list_installed_tools" => gateway.list_installed_tools().await,
        "install_pip_package" => gateway.install_pip_package(args.get(0)).await,
        "fs_read" => gateway.fs_read(args.get(0)).await,
        "fs_write" => gateway.fs_write(args.get(0), args.get(1)).await,
        "fs_execute" => gateway.fs_execute(args.get(0), args.get(1)).await,
        "fs_list" => gateway.fs_list(args.get(0)).await,
        "fs_mkdir" => gateway.fs_mkdir(args.get(0)).await,
        "fs_delete" => gateway.fs_delete(args.get(0)).await,
        "run_tool" => gateway.run_tool(args.get(0), args.get(1)).await,
        "nmap_scan" => gateway.nmap_scan(args.get(0), args.get(1), args.get(2)).await,
        "nikto_scan" => gateway.nikto_scan(args.get(0)).await,
        "ffuf_scan" => gateway.ffuf_scan(args.get(0), args.get(1)).await,
        "sqlmap_test" => gateway.sqlmap_test(args.get(0), args.get(1)).await,
        "nuclei_scan" => gateway.nuclei_scan(args.get(0), args.get(1)).await,
        "whatweb_scan" => gateway.whatweb_scan(args.get(0)).await,
        other => return Err(McpError::invalid_params(format!("Unknown tool: {}", other))),
    };

    metrics::record_operation(name, response.is_error);
    info!(operation = name, is_error = response.is_error, "Tool call finished");
    Ok(response)
}
