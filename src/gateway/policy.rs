//! Per-operation success policies
//!
//! Some tools exit non-zero even when they produced a useful report, so each
//! operation names the rule that decides whether its outcome counts as a
//! success.

use crate::tools::ExecutionOutcome;

/// Rule mapping an outcome to success or failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessPolicy {
    /// Only exit code 0 is a success
    ExitCode,

    /// Exit code 0, or any completed run that wrote to stdout
    ExitCodeOrOutput,
}

impl SuccessPolicy {
    /// Judge an outcome
    ///
    /// Timeouts and launch failures are failures under every policy, even
    /// when partial stdout was kept.
    pub fn is_success(self, outcome: &ExecutionOutcome) -> bool {
        match outcome {
            ExecutionOutcome::Completed {
                exit_code, stdout, ..
            } => match self {
                Self::ExitCode => *exit_code == 0,
                Self::ExitCodeOrOutput => *exit_code == 0 || !stdout.is_empty(),
            },
            ExecutionOutcome::Failed(_) => false,
        }
    }
}
