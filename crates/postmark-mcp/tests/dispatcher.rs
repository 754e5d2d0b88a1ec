//! End-to-end tool invocations through the dispatcher with a recording provider.

use async_trait::async_trait;
use postmark_mcp::provider::{
    EmailProvider, OutboundEmail, OutboundStats, ProviderError, SendReceipt, ServerSummary,
    StatsFilter, TemplateRef, TemplateSummary, TemplatedEmail,
};
use postmark_mcp::{Dispatcher, ToolRegistry, ValidationError};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingProvider {
    sent: Mutex<Vec<OutboundEmail>>,
    templated: Mutex<Vec<TemplatedEmail>>,
    stats_queries: Mutex<Vec<StatsFilter>>,
    stats: OutboundStats,
    templates: Vec<TemplateSummary>,
}

impl RecordingProvider {
    fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
            + self.templated.lock().unwrap().len()
            + self.stats_queries.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailProvider for RecordingProvider {
    async fn send_email(&self, email: &OutboundEmail) -> Result<SendReceipt, ProviderError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(SendReceipt {
            message_id: "b7bc2f4a-e38e-4336-af7d-e6c392c2f817".to_string(),
            to: email.to.clone(),
            submitted_at: None,
        })
    }

    async fn send_email_with_template(
        &self,
        email: &TemplatedEmail,
    ) -> Result<SendReceipt, ProviderError> {
        self.templated.lock().unwrap().push(email.clone());
        Ok(SendReceipt {
            message_id: "tmpl-0001".to_string(),
            to: email.to.clone(),
            submitted_at: None,
        })
    }

    async fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError> {
        Ok(self.templates.clone())
    }

    async fn outbound_stats(&self, filter: &StatsFilter) -> Result<OutboundStats, ProviderError> {
        self.stats_queries.lock().unwrap().push(filter.clone());
        Ok(self.stats.clone())
    }

    async fn server_info(&self) -> Result<ServerSummary, ProviderError> {
        Ok(ServerSummary {
            id: 1,
            name: "Test".to_string(),
        })
    }
}

fn dispatcher(provider: &Arc<RecordingProvider>) -> Dispatcher {
    Dispatcher::new(provider.clone(), ToolRegistry::standard().unwrap())
}

fn args(value: Value) -> Option<Map<String, Value>> {
    value.as_object().cloned()
}

#[tokio::test]
async fn test_send_without_attachments() {
    let provider = Arc::new(RecordingProvider::default());
    let result = dispatcher(&provider)
        .dispatch(
            "send-message",
            args(json!({"to": "a@example.com", "subject": "Hi", "textBody": "Hello"})),
        )
        .await
        .unwrap();

    assert!(!result.is_error);
    let text = result.joined();
    assert_eq!(
        text,
        "Email sent successfully!\n\
         MessageID: b7bc2f4a-e38e-4336-af7d-e6c392c2f817\n\
         To: a@example.com\n\
         Subject: Hi"
    );
    assert!(!text.contains("Attachments:"));

    let sent = provider.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, None);
    assert!(sent[0].attachments.is_empty());
}

#[tokio::test]
async fn test_send_with_csv_attachment() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("r.csv");
    std::fs::write(&csv, "a,b\n1,2\n").unwrap();

    let provider = Arc::new(RecordingProvider::default());
    let result = dispatcher(&provider)
        .dispatch(
            "send-message",
            args(json!({
                "to": "a@example.com",
                "subject": "Report",
                "textBody": "Attached",
                "from": "reports@example.com",
                "attachments": [{"filePath": csv.to_str().unwrap()}]
            })),
        )
        .await
        .unwrap();

    assert!(!result.is_error);
    assert!(result.joined().ends_with("\nAttachments: r.csv"));

    let sent = provider.sent.lock().unwrap();
    let attachment = &sent[0].attachments[0];
    assert_eq!(attachment.name, "r.csv");
    assert_eq!(attachment.content_type, "text/csv");
    assert_eq!(attachment.content, "YSxiCjEsMgo=");
    assert_eq!(sent[0].from.as_deref(), Some("reports@example.com"));
}

#[tokio::test]
async fn test_attachment_names_keep_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let chart = dir.path().join("chart.png");
    let notes = dir.path().join("notes.txt");
    std::fs::write(&chart, [0x89, b'P', b'N', b'G']).unwrap();
    std::fs::write(&notes, "notes").unwrap();

    let provider = Arc::new(RecordingProvider::default());
    let result = dispatcher(&provider)
        .dispatch(
            "send-message",
            args(json!({
                "to": "a@example.com",
                "subject": "Files",
                "textBody": "See attached",
                "attachments": [
                    {"filePath": notes.to_str().unwrap(), "fileName": "readme.txt"},
                    {"filePath": chart.to_str().unwrap()}
                ]
            })),
        )
        .await
        .unwrap();

    assert!(result.joined().ends_with("\nAttachments: readme.txt, chart.png"));
    let sent = provider.sent.lock().unwrap();
    assert_eq!(sent[0].attachments[1].content_type, "image/png");
}

#[tokio::test]
async fn test_delivery_stats_summary() {
    let provider = Arc::new(RecordingProvider {
        stats: OutboundStats {
            sent: 100,
            tracked: 99,
            unique_opens: 45,
            total_tracked_links_sent: 99,
            unique_links_clicked: 15,
        },
        ..Default::default()
    });
    let result = dispatcher(&provider)
        .dispatch(
            "get-delivery-stats",
            args(json!({"fromDate": "2025-05-01", "toDate": "2025-05-15", "tag": "marketing"})),
        )
        .await
        .unwrap();

    assert_eq!(
        result.joined(),
        "Email Statistics Summary\n\n\
         Sent: 100 emails\n\
         Open Rate: 45.5% (45/99 tracked emails)\n\
         Click Rate: 15.2% (15/99 tracked links)\n\n\
         Period: 2025-05-01 to 2025-05-15\n\
         Tag: marketing"
    );
    let queries = provider.stats_queries.lock().unwrap();
    assert_eq!(
        queries[0].query(),
        vec![
            ("tag", "marketing".to_string()),
            ("fromdate", "2025-05-01".to_string()),
            ("todate", "2025-05-15".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_stats_with_zero_tracking() {
    let provider = Arc::new(RecordingProvider {
        stats: OutboundStats {
            sent: 4,
            ..Default::default()
        },
        ..Default::default()
    });
    let text = dispatcher(&provider)
        .dispatch("get-delivery-stats", None)
        .await
        .unwrap()
        .joined();
    assert!(text.contains("Open Rate: 0.0% (0/0 tracked emails)"));
    assert!(text.contains("Click Rate: 0.0% (0/0 tracked links)"));
    assert!(!text.contains("Period:"));
}

#[tokio::test]
async fn test_template_reference_both_rejected_before_send() {
    let provider = Arc::new(RecordingProvider::default());
    let err = dispatcher(&provider)
        .dispatch(
            "send-templated-message",
            args(json!({
                "to": "a@example.com",
                "templateId": 12345,
                "templateAlias": "welcome",
                "templateModel": {"name": "Ada"}
            })),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ValidationError::InvalidArgument(_)));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_template_send_by_id() {
    let provider = Arc::new(RecordingProvider::default());
    let result = dispatcher(&provider)
        .dispatch(
            "send-templated-message",
            args(json!({
                "to": "a@example.com",
                "templateId": 12345,
                "templateModel": {"name": "Ada", "items": [1, 2]}
            })),
        )
        .await
        .unwrap();

    assert_eq!(
        result.joined(),
        "Template email sent successfully!\nMessageID: tmpl-0001\nTo: a@example.com\nTemplate: 12345"
    );
    let templated = provider.templated.lock().unwrap();
    assert_eq!(templated[0].template, TemplateRef::Id(12345));
    assert_eq!(templated[0].template_model["items"], json!([1, 2]));
}

#[tokio::test]
async fn test_invalid_recipient_makes_no_call() {
    let provider = Arc::new(RecordingProvider::default());
    let err = dispatcher(&provider)
        .dispatch(
            "send-message",
            args(json!({"to": "not-an-address", "subject": "Hi", "textBody": "Hello"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::InvalidEmail { field: "to", .. }));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_list_templates_is_stable() {
    let provider = Arc::new(RecordingProvider {
        templates: vec![
            TemplateSummary {
                id: 9,
                name: "Password Reset".to_string(),
                alias: Some("password-reset".to_string()),
                subject: None,
            },
            TemplateSummary {
                id: 3,
                name: "Welcome".to_string(),
                alias: None,
                subject: Some("Welcome aboard".to_string()),
            },
        ],
        ..Default::default()
    });
    let dispatcher = dispatcher(&provider);

    let first = dispatcher.dispatch("list-templates", None).await.unwrap();
    let second = dispatcher
        .dispatch("list-templates", args(json!({})))
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.joined(),
        "Found 2 templates:\n\n\
         • Password Reset\n  - ID: 9\n  - Alias: password-reset\n  - Subject: none\n\n\
         • Welcome\n  - ID: 3\n  - Alias: none\n  - Subject: Welcome aboard"
    );
}
