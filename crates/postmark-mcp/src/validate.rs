//! Validation from untyped JSON arguments into a typed [`ToolCall`].
//!
//! Parsing is pure: no filesystem or network access. The first violated
//! constraint is reported.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

use crate::attachments::AttachmentRequest;
use crate::error::ValidationError;
use crate::provider::{DATE_FORMAT, StatsFilter, TemplateRef};
use crate::schema::{DeliveryStatsArgs, ListTemplatesArgs, SendEmailArgs, SendTemplateArgs};
use crate::tools_registry::ToolKind;

/// A syntactically valid email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(field: &'static str, value: &str) -> Result<Self, ValidationError> {
        if looks_like_email(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(ValidationError::InvalidEmail {
                field,
                value: value.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `local@domain.tld`: one `@`, no whitespace, dotted domain with no empty labels.
fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendMessage {
    pub to: EmailAddress,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    pub from: Option<EmailAddress>,
    pub tag: Option<String>,
    pub attachments: Vec<AttachmentRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendTemplatedMessage {
    pub to: EmailAddress,
    pub template: TemplateRef,
    pub template_model: Map<String, Value>,
    pub from: Option<EmailAddress>,
    pub tag: Option<String>,
}

/// One variant per tool, each carrying its checked arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    SendMessage(SendMessage),
    SendTemplatedMessage(SendTemplatedMessage),
    ListTemplates,
    GetDeliveryStats(StatsFilter),
}

impl ToolCall {
    /// Validate `arguments` for the tool `kind`.
    pub fn parse(kind: ToolKind, arguments: Map<String, Value>) -> Result<Self, ValidationError> {
        match kind {
            ToolKind::SendMessage => {
                let args: SendEmailArgs = decode(kind, arguments)?;
                send_message(args).map(ToolCall::SendMessage)
            }
            ToolKind::SendTemplatedMessage => {
                let args: SendTemplateArgs = decode(kind, arguments)?;
                send_templated_message(args).map(ToolCall::SendTemplatedMessage)
            }
            ToolKind::ListTemplates => {
                let _: ListTemplatesArgs = decode(kind, arguments)?;
                Ok(ToolCall::ListTemplates)
            }
            ToolKind::GetDeliveryStats => {
                let args: DeliveryStatsArgs = decode(kind, arguments)?;
                stats_filter(args).map(ToolCall::GetDeliveryStats)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(kind: ToolKind, arguments: Map<String, Value>) -> Result<T, ValidationError> {
    serde_json::from_value(Value::Object(arguments)).map_err(|e| schema_error(kind.name(), &e))
}

fn schema_error(tool: &'static str, error: &serde_json::Error) -> ValidationError {
    let message = error.to_string();
    // serde reports "missing field `name`"
    let missing = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next());
    match missing {
        Some(field) => ValidationError::MissingField {
            tool,
            field: field.to_string(),
        },
        None => ValidationError::InvalidType { tool, message },
    }
}

fn optional_email(field: &'static str, value: Option<String>) -> Result<Option<EmailAddress>, ValidationError> {
    value.map(|v| EmailAddress::parse(field, &v)).transpose()
}

fn send_message(args: SendEmailArgs) -> Result<SendMessage, ValidationError> {
    let to = EmailAddress::parse("to", &args.to)?;
    let from = optional_email("from", args.from)?;

    let attachments = args
        .attachments
        .unwrap_or_default()
        .into_iter()
        .map(|a| {
            let path = PathBuf::from(&a.file_path);
            if a.file_path.trim().is_empty() || !path.is_absolute() {
                return Err(ValidationError::InvalidPath { value: a.file_path });
            }
            Ok(AttachmentRequest {
                file_path: path,
                file_name: a.file_name,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SendMessage {
        to,
        subject: args.subject,
        text_body: args.text_body,
        html_body: args.html_body,
        from,
        tag: args.tag,
        attachments,
    })
}

fn send_templated_message(args: SendTemplateArgs) -> Result<SendTemplatedMessage, ValidationError> {
    let to = EmailAddress::parse("to", &args.to)?;
    let template = match (args.template_id, args.template_alias) {
        (Some(id), None) => TemplateRef::Id(id),
        (None, Some(alias)) => TemplateRef::Alias(alias),
        (Some(_), Some(_)) => {
            return Err(ValidationError::InvalidArgument(
                "provide either templateId or templateAlias, not both".to_string(),
            ));
        }
        (None, None) => {
            return Err(ValidationError::InvalidArgument(
                "either templateId or templateAlias must be provided".to_string(),
            ));
        }
    };
    let from = optional_email("from", args.from)?;

    Ok(SendTemplatedMessage {
        to,
        template,
        template_model: args.template_model,
        from,
        tag: args.tag,
    })
}

fn stats_filter(args: DeliveryStatsArgs) -> Result<StatsFilter, ValidationError> {
    Ok(StatsFilter {
        tag: args.tag.filter(|t| !t.trim().is_empty()),
        from_date: args.from_date.map(|d| parse_date("fromDate", &d)).transpose()?,
        to_date: args.to_date.map(|d| parse_date("toDate", &d)).transpose()?,
    })
}

/// Strict `YYYY-MM-DD` that is also a real calendar date.
fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    let bytes = value.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    let invalid = || ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    };
    if !shaped {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid())
}
