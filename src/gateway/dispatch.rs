//! Generic tool dispatch

use super::{Gateway, SuccessPolicy, ToolResponse};
use crate::error::{GatewayError, ValidationError};
use crate::metrics;
use crate::tools::{split_arguments, CommandSpec, ExecutionTimeout, ToolId};
use tracing::warn;

impl Gateway {
    /// Run an allow-listed tool with a whitespace-separated argument string
    ///
    /// Elevation comes from the registry. A tool that is not permitted is
    /// rejected with the current allow-list and nothing is launched.
    pub async fn run_tool(&self, tool: &str, arguments: &str) -> ToolResponse {
        ToolResponse::from_result(self.dispatch_tool(tool, arguments).await)
    }

    async fn dispatch_tool(&self, tool: &str, arguments: &str) -> Result<ToolResponse, GatewayError> {
        let tool = ToolId::parse(tool).ok_or(ValidationError::Missing { what: "Tool name" })?;

        if !self.allow_list.is_permitted(tool.as_str()) {
            warn!(tool = %tool, "Rejected tool not on the allow-list");
            metrics::ALLOW_LIST_REJECTIONS_TOTAL.inc();
            return Err(ValidationError::NotPermitted {
                tool: tool.to_string(),
                allowed: self.allow_list.permitted(),
            }
            .into());
        }

        let spec = CommandSpec::new(tool.as_str(), split_arguments(arguments));
        let elevate = self.allow_list.requires_elevation(tool.as_str());
        let header = format!(
            "Tool: {}\nCommand: {}\nSudo: {}\n\n",
            tool,
            spec.display(),
            elevate
        );

        let outcome = self
            .execute(spec, ExecutionTimeout::standard(), elevate)
            .await;

        Ok(ToolResponse::judged(
            SuccessPolicy::ExitCode.is_success(&outcome),
            || format!("{}Output:\n{}", header, outcome.stdout()),
            || {
                format!(
                    "{}Error (code {}):\n{}\n\nOutput:\n{}",
                    header,
                    outcome.exit_code(),
                    outcome.stderr(),
                    outcome.stdout()
                )
            },
        ))
    }
}
