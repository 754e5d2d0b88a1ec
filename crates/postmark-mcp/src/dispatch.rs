//! Tool dispatch: name lookup, validation, execution, result shaping.
//!
//! Rejected invocations (unknown tool, invalid arguments) return
//! `Err(ValidationError)` and never reach the provider. Everything that
//! fails after validation becomes an error-shaped [`ToolResult`].

use opentelemetry::KeyValue;
use opentelemetry::metrics::Counter;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::attachments;
use crate::error::{ToolError, ValidationError};
use crate::provider::{EmailProvider, OutboundEmail, StatsFilter, TemplatedEmail};
use crate::responses::{self, ToolResult};
use crate::tools_registry::ToolRegistry;
use crate::validate::{SendMessage, SendTemplatedMessage, ToolCall};

const METER_NAME: &str = "postmark-mcp";

pub struct Dispatcher {
    registry: ToolRegistry,
    provider: Arc<dyn EmailProvider>,
    invocations: Counter<u64>,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn EmailProvider>, registry: ToolRegistry) -> Self {
        let invocations = opentelemetry::global::meter(METER_NAME)
            .u64_counter("postmark_mcp.tool.invocations")
            .with_description("Tool invocations by tool and outcome")
            .build();
        Self {
            registry,
            provider,
            invocations,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one invocation. `arguments` of `None` is treated as `{}`.
    #[tracing::instrument(name = "mcp.tool.call", skip(self, arguments), fields(tool = %name))]
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<ToolResult, ValidationError> {
        let Some(definition) = self.registry.get(name) else {
            warn!("Unknown tool");
            self.record(name, "unknown");
            return Err(ValidationError::UnknownTool(name.to_string()));
        };
        let kind = definition.kind;

        let call = match ToolCall::parse(kind, arguments.unwrap_or_default()) {
            Ok(call) => call,
            Err(e) => {
                warn!(error = %e, "Rejected invocation");
                self.record(name, "rejected");
                return Err(e);
            }
        };

        match self.execute(call).await {
            Ok(text) => {
                info!("Tool call succeeded");
                self.record(name, "success");
                Ok(ToolResult::text(text))
            }
            Err(e) => {
                warn!(error = %e, "Tool call failed");
                self.record(name, "failed");
                Ok(ToolResult::error(format!("{}: {}", kind.failure_context(), e)))
            }
        }
    }

    fn record(&self, tool: &str, outcome: &'static str) {
        self.invocations.add(
            1,
            &[
                KeyValue::new("tool", tool.to_string()),
                KeyValue::new("outcome", outcome),
            ],
        );
    }

    async fn execute(&self, call: ToolCall) -> Result<String, ToolError> {
        match call {
            ToolCall::SendMessage(message) => self.send_message(message).await,
            ToolCall::SendTemplatedMessage(message) => self.send_templated_message(message).await,
            ToolCall::ListTemplates => self.list_templates().await,
            ToolCall::GetDeliveryStats(filter) => self.delivery_stats(filter).await,
        }
    }

    async fn send_message(&self, message: SendMessage) -> Result<String, ToolError> {
        let encoded = attachments::resolve(&message.attachments).await?;
        let names: Vec<String> = encoded.iter().map(|a| a.name.clone()).collect();

        let email = OutboundEmail {
            to: message.to.to_string(),
            from: message.from.as_ref().map(|f| f.to_string()),
            subject: message.subject.clone(),
            text_body: message.text_body.clone(),
            html_body: message.html_body.clone(),
            tag: message.tag.clone(),
            attachments: encoded,
        };
        let receipt = self.provider.send_email(&email).await?;
        Ok(responses::sent(&message, &receipt, &names))
    }

    async fn send_templated_message(&self, message: SendTemplatedMessage) -> Result<String, ToolError> {
        let email = TemplatedEmail {
            to: message.to.to_string(),
            from: message.from.as_ref().map(|f| f.to_string()),
            template: message.template.clone(),
            template_model: message.template_model.clone(),
            tag: message.tag.clone(),
        };
        let receipt = self.provider.send_email_with_template(&email).await?;
        Ok(responses::template_sent(&message, &receipt))
    }

    async fn list_templates(&self) -> Result<String, ToolError> {
        let templates = self.provider.list_templates().await?;
        Ok(responses::template_list(&templates))
    }

    async fn delivery_stats(&self, filter: StatsFilter) -> Result<String, ToolError> {
        let stats = self.provider.outbound_stats(&filter).await?;
        Ok(responses::delivery_stats(&filter, &stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        OutboundStats, ProviderError, SendReceipt, ServerSummary, TemplateSummary,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn bump(&self) -> Result<(), ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProviderError::Http {
                    status: 503,
                    reason: "Service Unavailable".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl EmailProvider for CountingProvider {
        async fn send_email(&self, email: &OutboundEmail) -> Result<SendReceipt, ProviderError> {
            self.bump()?;
            Ok(SendReceipt {
                message_id: "msg-1".into(),
                to: email.to.clone(),
                submitted_at: None,
            })
        }
        async fn send_email_with_template(
            &self,
            email: &TemplatedEmail,
        ) -> Result<SendReceipt, ProviderError> {
            self.bump()?;
            Ok(SendReceipt {
                message_id: "msg-2".into(),
                to: email.to.clone(),
                submitted_at: None,
            })
        }
        async fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError> {
            self.bump()?;
            Ok(vec![])
        }
        async fn outbound_stats(&self, _: &StatsFilter) -> Result<OutboundStats, ProviderError> {
            self.bump()?;
            Ok(OutboundStats::default())
        }
        async fn server_info(&self) -> Result<ServerSummary, ProviderError> {
            self.bump()?;
            Ok(ServerSummary { id: 1, name: "test".into() })
        }
    }

    fn dispatcher(provider: Arc<CountingProvider>) -> Dispatcher {
        Dispatcher::new(provider, ToolRegistry::standard().unwrap())
    }

    #[tokio::test]
    async fn test_unknown_tool_rejected() {
        let provider = Arc::new(CountingProvider::default());
        let err = dispatcher(provider.clone())
            .dispatch("send_email", None)
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownTool("send_email".into()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_arguments_treated_as_empty() {
        let provider = Arc::new(CountingProvider::default());
        let d = dispatcher(provider.clone());

        let result = d.dispatch("list-templates", None).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.joined(), "Found 0 templates:\n\n");

        let err = d.dispatch("send-message", None).await.unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_error_result() {
        let provider = Arc::new(CountingProvider {
            fail: true,
            ..Default::default()
        });
        let args = json!({"to": "a@example.com", "templateId": 3, "templateModel": {}});
        let result = dispatcher(provider)
            .dispatch("send-templated-message", args.as_object().cloned())
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.joined(),
            "Failed to send template email: HTTP 503 Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_missing_attachment_aborts_send() {
        let provider = Arc::new(CountingProvider::default());
        let args = json!({
            "to": "a@example.com", "subject": "s", "textBody": "t",
            "attachments": [{"filePath": "/nonexistent/postmark-mcp/r.csv"}]
        });
        let result = dispatcher(provider.clone())
            .dispatch("send-message", args.as_object().cloned())
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.joined().starts_with("Failed to send email: Failed to read attachment /nonexistent/postmark-mcp/r.csv"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
