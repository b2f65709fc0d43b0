//! Gateway / Dispatch Layer
//!
//! The gateway turns a named operation with string parameters into at most
//! a few process invocations and a single text response. Validation always
//! runs in the same order and stops at the first failure:
//!
//! 1. required fields are present
//! 2. sanitization leaves a non-empty value
//! 3. the tool is on the allow-list (generic dispatch only)
//! 4. format-specific defaults are applied
//! 5. the command is executed
//!
//! Operations never return `Err`. Every failure is rendered into a
//! [`ToolResponse`] with `is_error` set.

mod dispatch;
mod filesystem;
mod packages;
mod policy;
mod report;
mod scans;

pub use filesystem::FilesystemBridge;
pub use policy::SuccessPolicy;
pub use report::ToolResponse;
pub use scans::NmapMode;

use crate::config::Config;
use crate::error::ValidationError;
use crate::tools::{
    AllowList, CommandSpec, Elevation, ExecutionOutcome, ExecutionTimeout, ExecutorConfig,
    Invocation, ProcessRunner, ToolExecutor,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Locations the gateway needs besides the allow-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Base directory of the Filesystem Bridge
    pub fs_root: PathBuf,

    /// Python package manager used by `install_pip_package`
    pub pip_path: PathBuf,

    /// Directory holding `common.txt` and `big.txt` for fuzzing
    pub wordlist_dir: PathBuf,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            fs_root: PathBuf::from("/host"),
            pip_path: PathBuf::from("/opt/cipherbot-venv/bin/pip"),
            wordlist_dir: PathBuf::from("/usr/share/wordlists/dirb"),
        }
    }
}

/// The command-execution gateway
pub struct Gateway {
    allow_list: Arc<AllowList>,
    runner: Arc<dyn ProcessRunner>,
    filesystem: FilesystemBridge,
    settings: GatewaySettings,
}

impl Gateway {
    pub fn new(
        settings: GatewaySettings,
        allow_list: Arc<AllowList>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            allow_list,
            runner,
            filesystem: FilesystemBridge::new(settings.fs_root.clone()),
            settings,
        }
    }

    /// Build a gateway backed by a real [`ToolExecutor`]
    pub fn from_config(config: &Config) -> Self {
        let gateway = &config.gateway;
        let executor = ToolExecutor::with_config(ExecutorConfig {
            max_output_size: gateway.max_output_bytes,
            preserve_partial_output: gateway.preserve_partial_output,
            max_concurrent: gateway.max_concurrent_processes,
            elevation: Elevation::from_prefix(gateway.elevation.clone()),
        });
        let allow_list = AllowList::new(&config.allow_list.tools, &config.allow_list.elevated);

        Self::new(
            GatewaySettings {
                fs_root: gateway.fs_root.clone(),
                pip_path: gateway.pip_path.clone(),
                wordlist_dir: gateway.wordlist_dir.clone(),
            },
            Arc::new(allow_list),
            Arc::new(executor),
        )
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub fn filesystem(&self) -> &FilesystemBridge {
        &self.filesystem
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    async fn execute(
        &self,
        spec: CommandSpec,
        timeout: ExecutionTimeout,
        elevate: bool,
    ) -> ExecutionOutcome {
        self.runner
            .run(Invocation::new(spec, timeout).elevated(elevate))
            .await
    }
}

/// Reject a blank required field
fn require(raw: &str, what: &'static str) -> Result<(), ValidationError> {
    if raw.trim().is_empty() {
        Err(ValidationError::Missing { what })
    } else {
        Ok(())
    }
}

/// Reject a value that sanitized to nothing
fn non_empty(value: String, err: ValidationError) -> Result<String, ValidationError> {
    if value.is_empty() {
        Err(err)
    } else {
        Ok(value)
    }
}
