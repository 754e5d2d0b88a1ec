//! postmark-mcp - MCP tool server for Postmark email
//!
//! Subcommands:
//! - `postmark-mcp serve` - Serve MCP over stdio (default)
//! - `postmark-mcp check` - Verify configuration and Postmark credentials
//! - `postmark-mcp tools` - Print tool definitions as JSON

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use postmark_conf::ServerConfig;
use std::path::PathBuf;
use std::time::Duration;

use postmark_mcp::{commands, lifecycle, telemetry};

/// Bound on waiting for runtime tasks at exit (the stdin reader may never return).
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "postmark-mcp")]
#[command(about = "MCP server for sending email and reading delivery stats through Postmark")]
#[command(version)]
struct Cli {
    /// Config file, used instead of ./postmark-mcp.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// OTLP gRPC endpoint for OpenTelemetry (e.g., "localhost:4317")
    #[arg(long, global = true)]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Serve MCP over stdin/stdout (default)
    Serve,

    /// Verify configuration and Postmark connectivity, then exit
    Check,

    /// Print the tool definitions as JSON
    Tools,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    let outcome = runtime.block_on(run(cli));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    outcome
}

async fn run(cli: Cli) -> Result<()> {
    let mut config =
        ServerConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(endpoint) = cli.otlp_endpoint {
        config.telemetry.otlp_endpoint = Some(endpoint);
    }

    let telemetry = telemetry::init(&config.telemetry)?;
    lifecycle::install_panic_hook();

    let outcome = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve(&config).await,
        Commands::Check => commands::check(&config).await,
        Commands::Tools => commands::tools(),
    };

    if let Err(e) = &outcome {
        tracing::error!("Exiting with error: {:#}", e);
    }
    telemetry.shutdown();
    outcome
}
