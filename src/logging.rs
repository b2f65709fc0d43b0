// Structured logging setup
//
// All log output goes to stderr. stdout carries the JSON-RPC channel and a
// stray log line there would corrupt it.

use anyhow::{Context, Result};
use std::str::FromStr;
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("Invalid log format: {}", other),
        }
    }
}

/// Build a subscriber writing to `writer`
///
/// `RUST_LOG` directives take precedence over `level`.
pub fn subscriber<W>(level: Level, format: LogFormat, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);

    match format {
        LogFormat::Compact => Box::new(builder.compact().finish()),
        LogFormat::Pretty => Box::new(builder.pretty().finish()),
        LogFormat::Json => Box::new(builder.json().finish()),
    }
}

/// Install the global subscriber, logging to stderr
pub fn init(level: Level, format: LogFormat) -> Result<()> {
    tracing::subscriber::set_global_default(subscriber(level, format, std::io::stderr))
        .context("Failed to install tracing subscriber")
}
