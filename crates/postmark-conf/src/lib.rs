//! Configuration loading for the Postmark MCP server.
//!
//! The server needs exactly one Postmark account per process. Its three
//! required values (server token, default sender, default message stream)
//! are loaded once at startup and turned into an immutable
//! [`ProviderCredentials`]; anything missing is a fatal [`ConfigError`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use postmark_conf::ServerConfig;
//!
//! let config = ServerConfig::load().expect("Failed to load config");
//! let credentials = config.credentials().expect("Missing Postmark settings");
//! println!("Sending as {}", credentials.default_sender);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, field by field):
//! 1. `/etc/postmark-mcp/config.toml` (system)
//! 2. `~/.config/postmark-mcp/config.toml` (user)
//! 3. `./postmark-mcp.toml` (local override, or `--config <path>`)
//! 4. Environment variables (`POSTMARK_SERVER_TOKEN`, `DEFAULT_SENDER_EMAIL`,
//!    `DEFAULT_MESSAGE_STREAM`, `POSTMARK_API_URL`, `POSTMARK_MCP_*`)
//!
//! # Example Config
//!
//! ```toml
//! [postmark]
//! server_token = "00000000-0000-0000-0000-000000000000"
//! default_sender = "notifications@example.com"
//! default_message_stream = "outbound"
//!
//! [telemetry]
//! log_level = "info"
//! otlp_endpoint = "127.0.0.1:4317"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{ConfigSources, apply_overrides_from, discover_config_files_with_override};
pub use settings::{
    DEFAULT_API_URL, PostmarkConfig, ProviderCredentials, ServerToken, TelemetryConfig,
};

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing required setting `{key}` (set {env} or [postmark] {key} in a config file)")]
    MissingValue {
        key: &'static str,
        env: &'static str,
    },
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub postmark: PostmarkConfig,
    pub telemetry: TelemetryConfig,
}

impl ServerConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./postmark-mcp.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        Self::load_layered(&files, |key| std::env::var(key).ok())
    }

    /// Load the given files in order, then overlay variables from `lookup`.
    pub fn load_layered<F>(files: &[PathBuf], lookup: F) -> Result<(Self, ConfigSources), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut sources = ConfigSources::default();
        let mut config = ServerConfig::default();

        for path in files {
            let file_config = loader::load_from_file(path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path.clone());
        }

        loader::apply_overrides_from(&mut config, &mut sources, lookup);

        Ok((config, sources))
    }

    /// Required Postmark values; see [`PostmarkConfig::credentials`].
    pub fn credentials(&self) -> Result<ProviderCredentials, ConfigError> {
        self.postmark.credentials()
    }
}
