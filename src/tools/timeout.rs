//! Execution Timeout Management
//!
//! Every subprocess runs under a wall-clock timeout chosen by the operation
//! according to how long it is expected to take.

use std::time::Duration;

/// Execution timeout configuration
///
/// Timeouts are enforced to prevent commands from hanging indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    /// The timeout duration
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::standard()
    }
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use cipherbot_gateway::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.as_secs(), 30);
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Create a timeout from seconds
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Get the timeout in whole seconds
    pub fn as_secs(&self) -> u64 {
        self.duration.as_secs()
    }

    /// Listing operations such as enumerating installed packages (1 minute)
    pub fn listing() -> Self {
        Self::from_secs(60)
    }

    /// Repository searches (2 minutes)
    pub fn search() -> Self {
        Self::from_secs(120)
    }

    /// Package metadata work and script execution (5 minutes)
    pub fn metadata() -> Self {
        Self::from_secs(300)
    }

    /// Default for tool dispatch, installs and most scans (10 minutes)
    pub fn standard() -> Self {
        Self::from_secs(600)
    }

    /// Full network scans (15 minutes)
    pub fn active_scan() -> Self {
        Self::from_secs(900)
    }
}
