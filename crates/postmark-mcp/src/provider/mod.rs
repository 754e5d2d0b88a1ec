//! Email provider facade.
//!
//! [`EmailProvider`] is the seam between tool handlers and the delivery
//! service. [`postmark::PostmarkClient`] is the production implementation;
//! tests substitute an in-memory fake.

pub mod postmark;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::attachments::EncodedAttachment;

pub use postmark::PostmarkClient;

/// Date format used by the statistics API and the tool arguments.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-2xx response carrying a Postmark `{ErrorCode, Message}` body.
    #[error("Postmark API error {code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },

    #[error("HTTP {status} {reason}")]
    Http { status: u16, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode Postmark response: {0}")]
    Decode(String),

    /// The server token cannot be carried in an HTTP header.
    #[error("Server token contains characters not allowed in an HTTP header")]
    InvalidToken,
}

/// A template addressed by exactly one of its numeric id or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Id(u64),
    Alias(String),
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateRef::Id(id) => write!(f, "{}", id),
            TemplateRef::Alias(alias) => f.write_str(alias),
        }
    }
}

/// A message ready for delivery. `from: None` means the default sender.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub from: Option<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    pub tag: Option<String>,
    pub attachments: Vec<EncodedAttachment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplatedEmail {
    pub to: String,
    pub from: Option<String>,
    pub template: TemplateRef,
    pub template_model: Map<String, Value>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendReceipt {
    #[serde(rename = "MessageID")]
    pub message_id: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateSummary {
    #[serde(rename = "TemplateId")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsFilter {
    pub tag: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

impl StatsFilter {
    /// Query parameters for `GET /stats/outbound`; absent values are omitted.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(tag) = &self.tag {
            query.push(("tag", tag.clone()));
        }
        if let Some(date) = self.from_date {
            query.push(("fromdate", date.format(DATE_FORMAT).to_string()));
        }
        if let Some(date) = self.to_date {
            query.push(("todate", date.format(DATE_FORMAT).to_string()));
        }
        query
    }
}

/// Aggregate outbound counters. Missing fields read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OutboundStats {
    pub sent: u64,
    pub tracked: u64,
    pub unique_opens: u64,
    pub total_tracked_links_sent: u64,
    pub unique_links_clicked: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSummary {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Name")]
    pub name: String,
}

/// Operations the tool handlers need from a delivery service.
///
/// One call per operation, no retries. Implementations fill in the default
/// sender and message stream from their own credentials.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, email: &OutboundEmail) -> Result<SendReceipt, ProviderError>;

    async fn send_email_with_template(
        &self,
        email: &TemplatedEmail,
    ) -> Result<SendReceipt, ProviderError>;

    /// Every template on the server, in the order the provider lists them.
    async fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError>;

    async fn outbound_stats(&self, filter: &StatsFilter) -> Result<OutboundStats, ProviderError>;

    /// Liveness probe used once at startup.
    async fn server_info(&self) -> Result<ServerSummary, ProviderError>;
}
