// Configuration File Support
//
// This module provides configuration file parsing for the CipherBot gateway.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the XDG config directory: ~/.config/cipherbot/config.toml

use crate::tools::{DEFAULT_ELEVATED_TOOLS, DEFAULT_PERMITTED_TOOLS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Gateway execution and filesystem settings
    pub gateway: GatewayConfig,

    /// Seed contents of the tool allow-list
    pub allow_list: AllowListConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base directory for the filesystem operations
    pub fs_root: PathBuf,

    /// Python package manager binary
    pub pip_path: PathBuf,

    /// Argument prefix for privileged runs; empty disables elevation
    pub elevation: Vec<String>,

    /// Cap on concurrently running processes (0 = unlimited)
    pub max_concurrent_processes: usize,

    /// Keep output captured before a timeout
    pub preserve_partial_output: bool,

    /// Per-stream capture limit in bytes (0 = unlimited)
    pub max_output_bytes: usize,

    /// Directory holding the fuzzing wordlists
    pub wordlist_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            fs_root: PathBuf::from("/host"),
            pip_path: PathBuf::from("/opt/cipherbot-venv/bin/pip"),
            elevation: vec!["sudo".to_string()],
            max_concurrent_processes: 0,
            preserve_partial_output: false,
            max_output_bytes: 1024 * 1024,
            wordlist_dir: PathBuf::from("/usr/share/wordlists/dirb"),
        }
    }
}

/// Allow-list seed configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AllowListConfig {
    /// Tools permitted for generic dispatch at startup
    pub tools: Vec<String>,

    /// Tools that always run elevated
    pub elevated: Vec<String>,
}

impl Default for AllowListConfig {
    fn default() -> Self {
        Self {
            tools: DEFAULT_PERMITTED_TOOLS.iter().map(|t| t.to_string()).collect(),
            elevated: DEFAULT_ELEVATED_TOOLS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to serve Prometheus metrics
    pub enabled: bool,

    /// Listen address for the metrics server
    pub bind: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "127.0.0.1:9090".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a specific path
    ///
    /// A missing file yields defaults. Environment overrides are applied in
    /// both cases and the result is validated.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?
        } else {
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/cipherbot/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "cipherbot", "cipherbot") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("cipherbot")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - CIPHERBOT_LOG_LEVEL
    /// - CIPHERBOT_LOG_FORMAT
    /// - CIPHERBOT_FS_ROOT
    /// - CIPHERBOT_PIP_PATH
    /// - CIPHERBOT_MAX_PROCESSES
    /// - CIPHERBOT_PRESERVE_PARTIAL_OUTPUT
    /// - CIPHERBOT_METRICS_ENABLED
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Unparsable numeric or boolean values leave the current setting alone.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Logging overrides
        if let Some(level) = lookup("CIPHERBOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("CIPHERBOT_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Gateway overrides
        if let Some(root) = lookup("CIPHERBOT_FS_ROOT") {
            self.gateway.fs_root = PathBuf::from(root);
        }
        if let Some(pip) = lookup("CIPHERBOT_PIP_PATH") {
            self.gateway.pip_path = PathBuf::from(pip);
        }
        if let Some(limit) = lookup("CIPHERBOT_MAX_PROCESSES") {
            if let Ok(limit) = limit.parse::<usize>() {
                self.gateway.max_concurrent_processes = limit;
            }
        }
        if let Some(preserve) = lookup("CIPHERBOT_PRESERVE_PARTIAL_OUTPUT") {
            self.gateway.preserve_partial_output =
                preserve.parse().unwrap_or(self.gateway.preserve_partial_output);
        }

        // Metrics overrides
        if let Some(enabled) = lookup("CIPHERBOT_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        // Validate gateway configuration
        if self.gateway.fs_root.as_os_str().is_empty() {
            anyhow::bail!("Filesystem root must not be empty");
        }
        if !self.gateway.fs_root.is_absolute() {
            anyhow::bail!(
                "Filesystem root must be an absolute path: {:?}",
                self.gateway.fs_root
            );
        }
        if self.gateway.pip_path.as_os_str().is_empty() {
            anyhow::bail!("pip path must not be empty");
        }

        // Validate metrics configuration
        self.metrics_addr()?;

        Ok(())
    }

    /// Parsed metrics listen address
    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        self.metrics
            .bind
            .parse()
            .with_context(|| format!("Invalid metrics bind address: {}", self.metrics.bind))
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.gateway.fs_root, PathBuf::from("/host"));
        assert_eq!(config.gateway.elevation, vec!["sudo"]);
        assert_eq!(config.gateway.max_concurrent_processes, 0);
        assert!(!config.gateway.preserve_partial_output);
        assert_eq!(config.gateway.max_output_bytes, 1024 * 1024);
        assert_eq!(config.allow_list.tools.len(), 26);
        assert_eq!(config.allow_list.elevated.len(), 6);
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.bind, "127.0.0.1:9090");
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_fs_root() {
        let mut config = Config::default();
        config.gateway.fs_root = PathBuf::new();
        assert!(config.validate().is_err());

        config.gateway.fs_root = PathBuf::from("relative/root");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_pip_path() {
        let mut config = Config::default();
        config.gateway.pip_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_metrics_bind() {
        let mut config = Config::default();
        config.metrics.bind = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path);
        assert!(config.is_ok());
    }

    #[test]
    fn test_parse_valid_toml_config() {
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[gateway]
fs_root = "/mnt/target"
pip_path = "/usr/bin/pip3"
elevation = []
max_concurrent_processes = 4
preserve_partial_output = true

[allow_list]
tools = ["nmap", "whatweb"]
elevated = ["nmap"]

[metrics]
enabled = true
bind = "0.0.0.0:9100"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.gateway.fs_root, PathBuf::from("/mnt/target"));
        assert!(config.gateway.elevation.is_empty());
        assert_eq!(config.gateway.max_concurrent_processes, 4);
        assert!(config.gateway.preserve_partial_output);
        assert_eq!(config.gateway.max_output_bytes, 1024 * 1024);
        assert_eq!(config.allow_list.tools, vec!["nmap", "whatweb"]);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics_addr().unwrap().port(), 9100);
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging
level = "debug"
"#; // Invalid TOML

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path());
        assert!(config.is_err());
    }

    #[test]
    fn test_config_partial_toml() {
        let config: Config = toml::from_str(
            r#"
[gateway]
fs_root = "/srv"
"#,
        )
        .unwrap();

        assert_eq!(config.gateway.fs_root, PathBuf::from("/srv"));
        // Other fields should have defaults
        assert_eq!(config.gateway.elevation, vec!["sudo"]);
        assert_eq!(config.allow_list, AllowListConfig::default());
        assert_eq!(config.metrics.bind, "127.0.0.1:9090");
    }

    #[test]
    fn test_overrides() {
        let config = Config::default().apply_overrides(vars(&[
            ("CIPHERBOT_LOG_LEVEL", "debug"),
            ("CIPHERBOT_LOG_FORMAT", "json"),
            ("CIPHERBOT_FS_ROOT", "/data"),
            ("CIPHERBOT_PIP_PATH", "/usr/local/bin/pip"),
            ("CIPHERBOT_MAX_PROCESSES", "3"),
            ("CIPHERBOT_PRESERVE_PARTIAL_OUTPUT", "true"),
            ("CIPHERBOT_METRICS_ENABLED", "true"),
        ]));

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.gateway.fs_root, PathBuf::from("/data"));
        assert_eq!(config.gateway.pip_path, PathBuf::from("/usr/local/bin/pip"));
        assert_eq!(config.gateway.max_concurrent_processes, 3);
        assert!(config.gateway.preserve_partial_output);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_overrides_invalid_values() {
        let config = Config::default().apply_overrides(vars(&[
            ("CIPHERBOT_MAX_PROCESSES", "many"),
            ("CIPHERBOT_PRESERVE_PARTIAL_OUTPUT", "yes please"),
            ("CIPHERBOT_METRICS_ENABLED", "1"),
        ]));

        // Should keep defaults for invalid values
        assert_eq!(config.gateway.max_concurrent_processes, 0);
        assert!(!config.gateway.preserve_partial_output);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "WARN".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::WARN);
    }

    #[test]
    fn test_toml_output_parses_back() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[gateway]"));
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_valid_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = Config::default();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "Log level {} should be valid", level);
        }
    }
}
