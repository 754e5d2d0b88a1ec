//! Tool result envelope and the text each tool reports.

use rmcp::model::{CallToolResult, Content};

use crate::provider::{DATE_FORMAT, OutboundStats, SendReceipt, StatsFilter, TemplateSummary};
use crate::validate::{SendMessage, SendTemplatedMessage};

/// Text-only tool result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub content: Vec<String>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![text.into()],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![text.into()],
            is_error: true,
        }
    }

    /// All text blocks joined by newlines.
    pub fn joined(&self) -> String {
        self.content.join("\n")
    }
}

impl From<ToolResult> for CallToolResult {
    fn from(result: ToolResult) -> Self {
        let content = result.content.into_iter().map(Content::text).collect();
        if result.is_error {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }
}

/// Percentage with one decimal place; `0.0` when nothing was tracked.
pub fn rate(numerator: u64, denominator: u64) -> String {
    if denominator == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", numerator as f64 / denominator as f64 * 100.0)
}

pub fn sent(message: &SendMessage, receipt: &SendReceipt, attachment_names: &[String]) -> String {
    let mut text = format!(
        "Email sent successfully!\nMessageID: {}\nTo: {}\nSubject: {}",
        receipt.message_id, message.to, message.subject
    );
    if !attachment_names.is_empty() {
        text.push_str("\nAttachments: ");
        text.push_str(&attachment_names.join(", "));
    }
    text
}

pub fn template_sent(message: &SendTemplatedMessage, receipt: &SendReceipt) -> String {
    format!(
        "Template email sent successfully!\nMessageID: {}\nTo: {}\nTemplate: {}",
        receipt.message_id, message.to, message.template
    )
}

pub fn template_list(templates: &[TemplateSummary]) -> String {
    let blocks: Vec<String> = templates
        .iter()
        .map(|t| {
            format!(
                "• {}\n  - ID: {}\n  - Alias: {}\n  - Subject: {}",
                t.name,
                t.id,
                t.alias.as_deref().unwrap_or("none"),
                t.subject.as_deref().unwrap_or("none"),
            )
        })
        .collect();
    format!("Found {} templates:\n\n{}", templates.len(), blocks.join("\n\n"))
}

pub fn delivery_stats(filter: &StatsFilter, stats: &OutboundStats) -> String {
    let mut text = format!(
        "Email Statistics Summary\n\n\
         Sent: {} emails\n\
         Open Rate: {}% ({}/{} tracked emails)\n\
         Click Rate: {}% ({}/{} tracked links)",
        stats.sent,
        rate(stats.unique_opens, stats.tracked),
        stats.unique_opens,
        stats.tracked,
        rate(stats.unique_links_clicked, stats.total_tracked_links_sent),
        stats.unique_links_clicked,
        stats.total_tracked_links_sent,
    );

    let has_period = filter.from_date.is_some() || filter.to_date.is_some();
    if has_period {
        let from = filter
            .from_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| "start".to_string());
        let to = filter
            .to_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| "now".to_string());
        text.push_str(&format!("\n\nPeriod: {} to {}", from, to));
    }
    if let Some(tag) = &filter.tag {
        if !has_period {
            text.push('\n');
        }
        text.push_str(&format!("\nTag: {}", tag));
    }
    text
}
