//! Wire-level argument types for each tool.
//!
//! These structs define both the JSON shape accepted from MCP clients and the
//! `inputSchema` advertised in `tools/list`. Field names are camelCase on the
//! wire. Semantic checks (email syntax, dates, template reference) happen in
//! [`crate::validate`].

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Nullable non-negative integer without the non-standard `uint64` format,
/// which some MCP clients reject.
fn optional_id_schema(_generator: &mut SchemaGenerator) -> Schema {
    schemars::json_schema!({
        "type": ["integer", "null"],
        "minimum": 0
    })
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentArg {
    #[schemars(description = "Absolute path to the file to attach")]
    pub file_path: String,

    #[schemars(description = "Attachment name shown to the recipient (defaults to the file's name)")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailArgs {
    #[schemars(description = "Recipient email address")]
    pub to: String,

    #[schemars(description = "Email subject")]
    pub subject: String,

    #[schemars(description = "Plain text body of the email")]
    pub text_body: String,

    #[schemars(description = "HTML body of the email (optional)")]
    pub html_body: Option<String>,

    #[schemars(description = "Sender email address (optional, uses the server default if not provided)")]
    pub from: Option<String>,

    #[schemars(description = "Tag for categorizing the email (optional)")]
    pub tag: Option<String>,

    #[schemars(description = "Files to attach, read from the server's filesystem (optional)")]
    pub attachments: Option<Vec<AttachmentArg>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendTemplateArgs {
    #[schemars(description = "Recipient email address")]
    pub to: String,

    #[schemars(
        description = "Numeric template ID (provide this or templateAlias)",
        schema_with = "optional_id_schema"
    )]
    #[serde(default)]
    pub template_id: Option<u64>,

    #[schemars(description = "Template alias (provide this or templateId)")]
    pub template_alias: Option<String>,

    #[schemars(description = "Variables passed to the template")]
    pub template_model: Map<String, Value>,

    #[schemars(description = "Sender email address (optional, uses the server default if not provided)")]
    pub from: Option<String>,

    #[schemars(description = "Tag for categorizing the email (optional)")]
    pub tag: Option<String>,
}

/// `list-templates` takes no input.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTemplatesArgs {}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatsArgs {
    #[schemars(description = "Only count emails with this tag (optional)")]
    pub tag: Option<String>,

    #[schemars(description = "Start date in YYYY-MM-DD format (optional)")]
    pub from_date: Option<String>,

    #[schemars(description = "End date in YYYY-MM-DD format (optional)")]
    pub to_date: Option<String>,
}
