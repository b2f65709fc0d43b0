//! Package management operations
//!
//! These follow the generic dispatch pattern against apt and pip. A
//! successful apt install or removal is the only path that mutates the
//! allow-list.

use super::{non_empty, require, Gateway, SuccessPolicy, ToolResponse};
use crate::error::{GatewayError, ValidationError};
use crate::tools::{sanitize_identifier_token, CommandSpec, ExecutionTimeout};

fn package_name(raw: &str) -> Result<String, ValidationError> {
    require(raw, "Package name")?;
    non_empty(
        sanitize_identifier_token(raw),
        ValidationError::Invalid {
            what: "package name",
        },
    )
}

impl Gateway {
    /// Refresh the apt cache and install a package, adding it to the allow-list
    pub async fn install_tool(&self, package: &str) -> ToolResponse {
        ToolResponse::from_result(self.apt_install(package).await)
    }

    async fn apt_install(&self, package: &str) -> Result<ToolResponse, GatewayError> {
        let package = package_name(package)?;

        let refresh = self
            .execute(
                CommandSpec::new("apt", ["update"]),
                ExecutionTimeout::metadata(),
                false,
            )
            .await;
        if !SuccessPolicy::ExitCode.is_success(&refresh) {
            return Ok(ToolResponse::failure(format!(
                "Error updating apt cache:\n{}",
                refresh.stderr()
            )));
        }

        let outcome = self
            .execute(
                CommandSpec::new("apt", ["install", "-y", package.as_str()]),
                ExecutionTimeout::standard(),
                false,
            )
            .await;

        if SuccessPolicy::ExitCode.is_success(&outcome) {
            self.allow_list.add(&package);
            Ok(ToolResponse::success(format!(
                "Successfully installed: {}\n\nOutput:\n{}\n\nPackage has been added to available tools.",
                package,
                outcome.stdout()
            )))
        } else {
            Ok(ToolResponse::failure(format!(
                "Failed to install {}:\n{}\n\nOutput:\n{}",
                package,
                outcome.stderr(),
                outcome.stdout()
            )))
        }
    }

    /// Search the apt repositories
    pub async fn search_tool(&self, query: &str) -> ToolResponse {
        ToolResponse::from_result(self.apt_search(query).await)
    }

    async fn apt_search(&self, query: &str) -> Result<ToolResponse, GatewayError> {
        require(query, "Search query")?;
        let query = non_empty(
            sanitize_identifier_token(query),
            ValidationError::Invalid {
                what: "search query",
            },
        )?;

        let outcome = self
            .execute(
                CommandSpec::new("apt", ["search", query.as_str()]),
                ExecutionTimeout::search(),
                false,
            )
            .await;

        Ok(ToolResponse::judged(
            SuccessPolicy::ExitCodeOrOutput.is_success(&outcome),
            || format!("Search results for '{}':\n\n{}", query, outcome.stdout()),
            || format!("Search failed:\n{}", outcome.stderr()),
        ))
    }

    /// Remove a package, dropping it from the allow-list
    pub async fn remove_tool(&self, package: &str) -> ToolResponse {
        ToolResponse::from_result(self.apt_remove(package).await)
    }

    async fn apt_remove(&self, package: &str) -> Result<ToolResponse, GatewayError> {
        let package = package_name(package)?;

        let outcome = self
            .execute(
                CommandSpec::new("apt", ["remove", "-y", package.as_str()]),
                ExecutionTimeout::metadata(),
                false,
            )
            .await;

        if SuccessPolicy::ExitCode.is_success(&outcome) {
            self.allow_list.remove(&package);
            Ok(ToolResponse::success(format!(
                "Successfully removed: {}\n\nOutput:\n{}",
                package,
                outcome.stdout()
            )))
        } else {
            Ok(ToolResponse::failure(format!(
                "Failed to remove {}:\n{}\n\nOutput:\n{}",
                package,
                outcome.stderr(),
                outcome.stdout()
            )))
        }
    }

    /// List installed packages
    pub async fn list_installed_tools(&self) -> ToolResponse {
        let outcome = self
            .execute(
                CommandSpec::new("dpkg", ["-l"]),
                ExecutionTimeout::listing(),
                false,
            )
            .await;

        ToolResponse::judged(
            SuccessPolicy::ExitCode.is_success(&outcome),
            || format!("Installed packages:\n\n{}", outcome.stdout()),
            || format!("Failed to list packages:\n{}", outcome.stderr()),
        )
    }

    /// Install a Python package into the gateway's virtual environment
    pub async fn install_pip_package(&self, package: &str) -> ToolResponse {
        ToolResponse::from_result(self.pip_install(package).await)
    }

    async fn pip_install(&self, package: &str) -> Result<ToolResponse, GatewayError> {
        let package = package_name(package)?;
        let pip = self.settings.pip_path.to_string_lossy().into_owned();

        let outcome = self
            .execute(
                CommandSpec::new(pip, ["install", package.as_str()]),
                ExecutionTimeout::standard(),
                false,
            )
            .await;

        Ok(ToolResponse::judged(
            SuccessPolicy::ExitCode.is_success(&outcome),
            || {
                format!(
                    "Successfully installed Python package: {}\n\nOutput:\n{}",
                    package,
                    outcome.stdout()
                )
            },
            || {
                format!(
                    "Failed to install {}:\n{}\n\nOutput:\n{}",
                    package,
                    outcome.stderr(),
                    outcome.stdout()
                )
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{completed, RecordingRunner};
    use super::super::GatewaySettings;
    use super::*;
    use crate::tools::{AllowList, ExecutionFailure, ExecutionOutcome};
    use std::sync::Arc;

    fn gateway(runner: Arc<RecordingRunner>) -> Gateway {
        Gateway::new(GatewaySettings::default(), Arc::new(AllowList::default()), runner)
    }

    #[tokio::test]
    async fn test_install_adds_to_allow_list() {
        let runner = Arc::new(RecordingRunner::with_outcomes([
            completed(0, "Reading package lists...", ""),
            completed(0, "Setting up foo", ""),
        ]));
        let gateway = gateway(runner.clone());
        assert!(!gateway.allow_list().is_permitted("foo"));

        let response = gateway.install_tool("foo").await;

        assert!(!response.is_error);
        assert!(response.text.starts_with("Successfully installed: foo\n\nOutput:\nSetting up foo"));
        assert!(gateway.allow_list().is_permitted("foo"));

        let recorded = runner.invocations();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].spec.argv(), &["apt", "update"]);
        assert_eq!(recorded[0].timeout, ExecutionTimeout::metadata());
        assert_eq!(recorded[1].spec.argv(), &["apt", "install", "-y", "foo"]);
        assert!(recorded.iter().all(|inv| !inv.elevate));
    }

    #[tokio::test]
    async fn test_installed_tool_is_dispatchable() {
        let runner = Arc::new(RecordingRunner::new());
        let gateway = gateway(runner.clone());

        assert!(gateway.run_tool("foo", "").await.text.contains("not in the approved list"));
        gateway.install_tool("foo").await;

        let response = gateway.run_tool("foo", "--version").await;
        assert!(!response.text.contains("not in the approved list"));
        assert_eq!(runner.invocations().last().unwrap().spec.argv(), &["foo", "--version"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_skips_install() {
        let runner = Arc::new(RecordingRunner::with_outcomes([completed(100, "", "lock held")]));
        let gateway = gateway(runner.clone());

        let response = gateway.install_tool("foo").await;

        assert!(response.is_error);
        assert_eq!(response.text, "Error updating apt cache:\nlock held");
        assert_eq!(runner.invocations().len(), 1);
        assert!(!gateway.allow_list().is_permitted("foo"));
    }

    #[tokio::test]
    async fn test_failed_install_leaves_allow_list() {
        let runner = Arc::new(RecordingRunner::with_outcomes([
            completed(0, "", ""),
            completed(100, "", "Unable to locate package foo"),
        ]));
        let gateway = gateway(runner);

        let response = gateway.install_tool("foo").await;

        assert!(response.is_error);
        assert!(response.text.starts_with("Failed to install foo:\nUnable to locate package foo"));
        assert!(!gateway.allow_list().is_permitted("foo"));
    }

    #[tokio::test]
    async fn test_package_name_validation() {
        let runner = Arc::new(RecordingRunner::new());
        let gateway = gateway(runner.clone());

        assert_eq!(gateway.install_tool("  ").await.text, "Error: Package name is required");
        assert_eq!(gateway.remove_tool("$;|").await.text, "Error: Invalid package name");
        assert_eq!(gateway.search_tool("").await.text, "Error: Search query is required");
        assert_eq!(gateway.search_tool("!!").await.text, "Error: Invalid search query");
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_install_sanitizes_identifier() {
        let runner = Arc::new(RecordingRunner::new());
        gateway(runner.clone()).install_tool("curl; rm -rf /").await;

        assert_eq!(
            runner.invocations()[1].spec.argv(),
            &["apt", "install", "-y", "curlrm-rf"]
        );
    }

    #[tokio::test]
    async fn test_remove_drops_from_allow_list() {
        let runner = Arc::new(RecordingRunner::new());
        let gateway = gateway(runner.clone());

        let response = gateway.remove_tool("Gobuster").await;

        assert!(!response.is_error);
        assert!(!gateway.allow_list().is_permitted("gobuster"));
        assert_eq!(runner.invocations()[0].spec.argv(), &["apt", "remove", "-y", "Gobuster"]);
    }

    #[tokio::test]
    async fn test_search_accepts_noisy_output() {
        let runner = Arc::new(RecordingRunner::with_outcomes([completed(1, "nmap/stable", "WARNING")]));
        let response = gateway(runner).search_tool("nmap").await;

        assert!(!response.is_error);
        assert_eq!(response.text, "Search results for 'nmap':\n\nnmap/stable");
    }

    #[tokio::test]
    async fn test_list_installed_failure() {
        let runner = Arc::new(RecordingRunner::with_outcomes([ExecutionOutcome::Failed(
            ExecutionFailure::Launch {
                message: "Failed to launch dpkg: No such file or directory".into(),
            },
        )]));
        let response = gateway(runner).list_installed_tools().await;

        assert!(response.is_error);
        assert_eq!(
            response.text,
            "Failed to list packages:\nFailed to launch dpkg: No such file or directory"
        );
    }

    #[tokio::test]
    async fn test_pip_uses_configured_path() {
        let runner = Arc::new(RecordingRunner::new());
        let settings = GatewaySettings {
            pip_path: "/venv/bin/pip".into(),
            ..GatewaySettings::default()
        };
        let gateway = Gateway::new(settings, Arc::new(AllowList::default()), runner.clone());

        let response = gateway.install_pip_package("requests").await;

        assert!(response.text.starts_with("Successfully installed Python package: requests"));
        assert_eq!(runner.invocations()[0].spec.argv(), &["/venv/bin/pip", "install", "requests"]);
        assert!(!gateway.allow_list().is_permitted("requests"));
    }
}
