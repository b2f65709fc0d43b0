//! Specialized scan wrappers
//!
//! Each wrapper is bound to one executable with a fixed argument layout,
//! elevation flag, timeout and success policy. Wrappers are authorized by
//! construction and never consult the allow-list.

use super::{non_empty, Gateway, SuccessPolicy, ToolResponse};
use crate::error::{GatewayError, ValidationError};
use crate::tools::{sanitize_shell_token, CommandSpec, ExecutionOutcome, ExecutionTimeout};

/// nmap scan profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NmapMode {
    /// Service version detection
    #[default]
    Basic,
    /// Top ports only
    Quick,
    /// Every TCP port
    Full,
    /// Version detection plus default scripts
    Service,
}

impl NmapMode {
    /// Parse a mode name; unknown names fall back to [`NmapMode::Basic`]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "quick" => Self::Quick,
            "full" => Self::Full,
            "service" => Self::Service,
            _ => Self::Basic,
        }
    }

    pub fn flags(self) -> &'static [&'static str] {
        match self {
            Self::Basic => &["-sV"],
            Self::Quick => &["-F"],
            Self::Full => &["-p-"],
            Self::Service => &["-sV", "-sC"],
        }
    }
}

/// Sanitize a required free-form field
fn required_token(raw: &str, what: &'static str) -> Result<String, ValidationError> {
    non_empty(sanitize_shell_token(raw), ValidationError::Missing { what })
}

/// Default to plain HTTP when no scheme is given
fn with_http_scheme(target: String) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target
    } else {
        format!("http://{}", target)
    }
}

/// Append the fuzz marker unless the URL already carries one
fn with_fuzz_marker(url: String) -> String {
    if url.contains("FUZZ") {
        url
    } else if url.ends_with('/') {
        format!("{}FUZZ", url)
    } else {
        format!("{}/FUZZ", url)
    }
}

/// Keep only digits, commas and hyphens
fn port_list(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '-'))
        .collect()
}

/// Sanitize an optional field; blank or the given sentinel means absent
fn optional_token(raw: &str, sentinel: Option<&str>) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || sentinel == Some(trimmed) {
        return None;
    }
    Some(sanitize_shell_token(trimmed)).filter(|token| !token.is_empty())
}

fn report(
    outcome: &ExecutionOutcome,
    policy: SuccessPolicy,
    ok: impl FnOnce() -> String,
    err: impl FnOnce() -> String,
) -> ToolResponse {
    ToolResponse::judged(policy.is_success(outcome), ok, err)
}

impl Gateway {
    /// Network port scan with nmap (elevated)
    pub async fn nmap_scan(&self, target: &str, scan_type: &str, ports: &str) -> ToolResponse {
        ToolResponse::from_result(self.nmap(target, scan_type, ports).await)
    }

    async fn nmap(&self, target: &str, scan_type: &str, ports: &str) -> Result<ToolResponse, GatewayError> {
        let target = required_token(target, "Valid target IP or hostname")?;

        let mut spec = CommandSpec::new("nmap", NmapMode::parse(scan_type).flags().iter().copied());
        spec.push(target.as_str());
        let ports = port_list(ports);
        if !ports.is_empty() {
            spec.push("-p");
            spec.push(ports);
        }

        let outcome = self.execute(spec, ExecutionTimeout::active_scan(), true).await;
        Ok(report(
            &outcome,
            SuccessPolicy::ExitCode,
            || format!("Nmap Scan Results for {}:\n\n{}", target, outcome.stdout()),
            || format!("Nmap scan failed:\n{}\n\nOutput:\n{}", outcome.stderr(), outcome.stdout()),
        ))
    }

    /// Web server vulnerability scan with nikto (elevated)
    pub async fn nikto_scan(&self, target: &str) -> ToolResponse {
        ToolResponse::from_result(self.nikto(target).await)
    }

    async fn nikto(&self, target: &str) -> Result<ToolResponse, GatewayError> {
        let target = with_http_scheme(required_token(target, "Valid target URL or hostname")?);
        let spec = CommandSpec::new("nikto", ["-h", target.as_str(), "-Format", "txt"]);

        let outcome = self.execute(spec, ExecutionTimeout::standard(), true).await;
        Ok(report(
            &outcome,
            SuccessPolicy::ExitCodeOrOutput,
            || format!("Nikto Scan Results for {}:\n\n{}", target, outcome.stdout()),
            || format!("Nikto scan failed:\n{}", outcome.stderr()),
        ))
    }

    /// Directory and parameter fuzzing with ffuf
    ///
    /// `wordlist` selects `common.txt` when it is `common` and `big.txt`
    /// otherwise, both under the configured wordlist directory.
    pub async fn ffuf_scan(&self, url: &str, wordlist: &str) -> ToolResponse {
        ToolResponse::from_result(self.ffuf(url, wordlist).await)
    }

    async fn ffuf(&self, url: &str, wordlist: &str) -> Result<ToolResponse, GatewayError> {
        let url = with_fuzz_marker(required_token(url, "Valid URL")?);
        let file = if wordlist.trim() == "common" {
            "common.txt"
        } else {
            "big.txt"
        };
        let wordlist_path = self
            .settings
            .wordlist_dir
            .join(file)
            .to_string_lossy()
            .into_owned();

        let spec = CommandSpec::new(
            "ffuf",
            ["-u", url.as_str(), "-w", wordlist_path.as_str(), "-mc", "200,301,302,403"],
        );

        let outcome = self.execute(spec, ExecutionTimeout::standard(), false).await;
        Ok(report(
            &outcome,
            SuccessPolicy::ExitCode,
            || format!("FFUF Results:\n\n{}", outcome.stdout()),
            || format!("FFUF scan failed:\n{}", outcome.stderr()),
        ))
    }

    /// SQL injection test with sqlmap (elevated)
    pub async fn sqlmap_test(&self, url: &str, data: &str) -> ToolResponse {
        ToolResponse::from_result(self.sqlmap(url, data).await)
    }

    async fn sqlmap(&self, url: &str, data: &str) -> Result<ToolResponse, GatewayError> {
        let url = required_token(url, "Valid URL")?;

        let mut spec = CommandSpec::new(
            "sqlmap",
            ["-u", url.as_str(), "--batch", "--risk=1", "--level=1"],
        );
        if let Some(data) = optional_token(data, None) {
            spec.push("--data");
            spec.push(data);
        }

        let outcome = self.execute(spec, ExecutionTimeout::standard(), true).await;
        Ok(report(
            &outcome,
            SuccessPolicy::ExitCodeOrOutput,
            || format!("SQLMap Results for {}:\n\n{}", url, outcome.stdout()),
            || format!("SQLMap failed:\n{}", outcome.stderr()),
        ))
    }

    /// Template-based vulnerability scan with nuclei (elevated)
    pub async fn nuclei_scan(&self, target: &str, templates: &str) -> ToolResponse {
        ToolResponse::from_result(self.nuclei(target, templates).await)
    }

    async fn nuclei(&self, target: &str, templates: &str) -> Result<ToolResponse, GatewayError> {
        let target = required_token(target, "Valid target")?;

        let mut spec = CommandSpec::new("nuclei", ["-u", target.as_str(), "-silent"]);
        if let Some(templates) = optional_token(templates, Some("default")) {
            spec.push("-t");
            spec.push(templates);
        }

        let outcome = self.execute(spec, ExecutionTimeout::standard(), true).await;
        Ok(report(
            &outcome,
            SuccessPolicy::ExitCodeOrOutput,
            || format!("Nuclei Scan Results:\n\n{}", outcome.stdout()),
            || format!("Nuclei scan failed:\n{}", outcome.stderr()),
        ))
    }

    /// Web technology fingerprinting with whatweb
    pub async fn whatweb_scan(&self, target: &str) -> ToolResponse {
        ToolResponse::from_result(self.whatweb(target).await)
    }

    async fn whatweb(&self, target: &str) -> Result<ToolResponse, GatewayError> {
        let target = with_http_scheme(required_token(target, "Valid target")?);
        let spec = CommandSpec::new("whatweb", [target]);

        let outcome = self.execute(spec, ExecutionTimeout::standard(), false).await;
        Ok(report(
            &outcome,
            SuccessPolicy::ExitCode,
            || format!("WhatWeb Results:\n\n{}", outcome.stdout()),
            || format!("WhatWeb failed:\n{}", outcome.stderr()),
        ))
    }
}
