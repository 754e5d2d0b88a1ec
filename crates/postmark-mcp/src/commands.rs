//! CLI command implementations

use anyhow::{Context, Result};
use postmark_conf::ServerConfig;
use std::sync::Arc;

use crate::lifecycle::{self, Lifecycle};
use crate::tools_registry::ToolRegistry;

/// Run the stdio MCP server until EOF or a shutdown signal.
pub async fn serve(config: &ServerConfig) -> Result<()> {
    let server = lifecycle::start(config)
        .await
        .context("Startup failed")?;
    lifecycle::serve_stdio(server, Arc::new(Lifecycle::new())).await
}

/// Verify configuration and Postmark connectivity, then exit.
pub async fn check(config: &ServerConfig) -> Result<()> {
    let server = lifecycle::start(config)
        .await
        .context("Startup failed")?;
    println!(
        "Connected to Postmark server \"{}\" (ID {})",
        server.account.name, server.account.id
    );
    println!("{} tools registered", server.dispatcher.registry().len());
    Ok(())
}

/// Print the tool definitions as pretty JSON.
pub fn tools() -> Result<()> {
    let registry = ToolRegistry::standard()?;
    let output = serde_json::to_string_pretty(&registry.tools())?;
    println!("{}", output);
    Ok(())
}
