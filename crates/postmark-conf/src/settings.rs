//! Setting sections read from config files and the environment.

use serde::Deserialize;
use std::fmt;

use crate::ConfigError;

/// Production Postmark API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.postmarkapp.com";

/// Postmark server API token.
///
/// Never printed: `Debug` and `Display` both redact the value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ServerToken(String);

impl ServerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the authentication header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ServerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerToken(<redacted>)")
    }
}

impl fmt::Display for ServerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// `[postmark]` section. Every field is optional at load time so that
/// layers can be merged; [`PostmarkConfig::credentials`] enforces presence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostmarkConfig {
    pub server_token: Option<ServerToken>,
    pub default_sender: Option<String>,
    pub default_message_stream: Option<String>,
    /// Base URL of the Postmark API. Default: https://api.postmarkapp.com
    pub api_url: Option<String>,
}

impl PostmarkConfig {
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Resolve the three required values into credentials.
    ///
    /// Checked in order token, sender, stream; the first absent one is reported.
    pub fn credentials(&self) -> Result<ProviderCredentials, ConfigError> {
        let server_token = self
            .server_token
            .clone()
            .filter(|t| !t.is_blank())
            .ok_or(ConfigError::MissingValue {
                key: "server_token",
                env: "POSTMARK_SERVER_TOKEN",
            })?;
        let default_sender = required(
            &self.default_sender,
            "default_sender",
            "DEFAULT_SENDER_EMAIL",
        )?;
        let default_message_stream = required(
            &self.default_message_stream,
            "default_message_stream",
            "DEFAULT_MESSAGE_STREAM",
        )?;

        Ok(ProviderCredentials {
            server_token,
            default_sender,
            default_message_stream,
        })
    }
}

fn required(
    value: &Option<String>,
    key: &'static str,
    env: &'static str,
) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or(ConfigError::MissingValue { key, env })
}

/// `[telemetry]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint. When unset no exporter is started.
    pub otlp_endpoint: Option<String>,

    /// EnvFilter directive (trace, debug, info, ... or a full filter string).
    pub log_level: Option<String>,
}

/// The process-wide provider account: loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub server_token: ServerToken,
    pub default_sender: String,
    pub default_message_stream: String,
}
