//! Config file discovery, loading, and environment variable overlay.

use crate::settings::{PostmarkConfig, ServerToken, TelemetryConfig};
use crate::{ConfigError, ServerConfig};
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations, optionally with a CLI
/// override path.
///
/// Returns paths in load order (system, user, local). If `cli_path` is
/// provided it replaces the local override and is returned even when
/// missing, so that loading reports the bad path.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/postmark-mcp/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("postmark-mcp/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("postmark-mcp.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from TOML string. Unknown keys are ignored.
fn parse_toml(contents: &str, path: &Path) -> Result<ServerConfig, ConfigError> {
    toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge two configs field by field, with `overlay` taking precedence.
pub fn merge_configs(base: ServerConfig, overlay: ServerConfig) -> ServerConfig {
    ServerConfig {
        postmark: PostmarkConfig {
            server_token: overlay.postmark.server_token.or(base.postmark.server_token),
            default_sender: overlay.postmark.default_sender.or(base.postmark.default_sender),
            default_message_stream: overlay
                .postmark
                .default_message_stream
                .or(base.postmark.default_message_stream),
            api_url: overlay.postmark.api_url.or(base.postmark.api_url),
        },
        telemetry: TelemetryConfig {
            otlp_endpoint: overlay.telemetry.otlp_endpoint.or(base.telemetry.otlp_endpoint),
            log_level: overlay.telemetry.log_level.or(base.telemetry.log_level),
        },
    }
}

/// Apply overrides from an arbitrary variable lookup. Empty values are skipped.
pub fn apply_overrides_from<F>(config: &mut ServerConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut var = |key: &str| -> Option<String> {
        let value = lookup(key).filter(|v| !v.trim().is_empty())?;
        sources.env_overrides.push(key.to_string());
        Some(value)
    };

    // Credentials (names shared with other Postmark tooling)
    if let Some(v) = var("POSTMARK_SERVER_TOKEN") {
        config.postmark.server_token = Some(ServerToken::new(v));
    }
    if let Some(v) = var("DEFAULT_SENDER_EMAIL") {
        config.postmark.default_sender = Some(v);
    }
    if let Some(v) = var("DEFAULT_MESSAGE_STREAM") {
        config.postmark.default_message_stream = Some(v);
    }
    if let Some(v) = var("POSTMARK_API_URL") {
        config.postmark.api_url = Some(v);
    }

    // Telemetry
    if let Some(v) = var("POSTMARK_MCP_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(v);
    }
    // Also support standard OTEL env var
    if let Some(v) = var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(v);
    }
    if let Some(v) = var("POSTMARK_MCP_LOG_LEVEL") {
        config.telemetry.log_level = Some(v);
    }
    // Also support RUST_LOG
    if let Some(v) = var("RUST_LOG") {
        config.telemetry.log_level = Some(v);
    }
}
