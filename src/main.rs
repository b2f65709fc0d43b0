// CipherBot Gateway - Main Entry Point
//
// Serves the gateway operations as an MCP server over stdio, and offers a
// few one-shot subcommands for inspecting the catalog and configuration.

use anyhow::{Context, Result};
use cipherbot_gateway::config::Config;
use cipherbot_gateway::gateway::Gateway;
use cipherbot_gateway::logging::{self, LogFormat};
use cipherbot_gateway::mcp::{catalog, McpServer};
use cipherbot_gateway::{metrics, metrics_server};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, Level};

/// CipherBot: allow-listed command execution gateway for security tooling
#[derive(Parser, Debug)]
#[command(name = "cipherbot")]
#[command(author = "CipherBot Contributors")]
#[command(version)]
#[command(about = "Allow-listed command execution gateway served over MCP", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Command to run (defaults to serve)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve MCP requests on stdin/stdout
    Serve,
    /// Print the operation catalog as JSON
    Tools,
    /// Invoke a single operation and print its result
    Call {
        /// Operation name
        name: String,

        /// Arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
    },
    /// Print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let config = Config::load_from_path(&config_path)?;

    let level = if args.verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    let format: LogFormat = config.logging.format.parse()?;
    logging::init(level, format)?;

    // Logged here because the subscriber does not exist while loading.
    if config_path.exists() {
        info!("Loaded configuration from {}", config_path.display());
    } else {
        debug!(
            "Config file not found at {}, using defaults",
            config_path.display()
        );
    }

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tools => {
            let tools = serde_json::to_string_pretty(&catalog::tools())
                .context("Failed to serialize catalog")?;
            println!("{}", tools);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Call { name, args } => call(&config, &name, args.as_deref()).await,
        Commands::CheckConfig => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run the stdio server until input closes
async fn serve(config: Config) -> Result<()> {
    info!("CipherBot gateway v{} starting", env!("CARGO_PKG_VERSION"));

    metrics::init().context("Failed to register metrics")?;
    if config.metrics.enabled {
        let addr = config.metrics_addr()?;
        tokio::spawn(async move {
            if let Err(e) = metrics_server::start_metrics_server(addr).await {
                error!("Metrics server stopped: {:#}", e);
            }
        });
    }

    let gateway = Arc::new(Gateway::from_config(&config));
    info!(
        fs_root = %gateway.settings().fs_root.display(),
        tools = gateway.allow_list().permitted().len(),
        "Gateway ready"
    );

    Arc::new(McpServer::new(gateway)).serve_stdio().await
}

/// Invoke one operation outside the server loop
async fn call(config: &Config, name: &str, raw_args: Option<&str>) -> Result<ExitCode> {
    let arguments: Option<Value> = raw_args
        .map(serde_json::from_str)
        .transpose()
        .context("Arguments must be a JSON object")?;

    let gateway = Gateway::from_config(config);
    let response = catalog::call_tool(&gateway, name, arguments.as_ref()).await?;

    println!("{}", response.text);
    Ok(if response.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
