//! Postmark REST client.

use async_trait::async_trait;
use postmark_conf::ProviderCredentials;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    EmailProvider, OutboundEmail, OutboundStats, ProviderError, SendReceipt, ServerSummary,
    StatsFilter, TemplateRef, TemplateSummary, TemplatedEmail,
};
use crate::attachments::EncodedAttachment;

const SERVER_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-postmark-server-token");

/// Link tracking applied to every send.
const TRACK_LINKS: &str = "HtmlAndText";

/// Templates requested per page when listing.
const TEMPLATE_PAGE_SIZE: usize = 100;

/// Postmark error body, e.g. `{"ErrorCode": 300, "Message": "Invalid email request"}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiErrorBody {
    error_code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TemplatePage {
    total_count: u64,
    #[serde(default)]
    templates: Vec<TemplateSummary>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct EmailBody<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    message_stream: &'a str,
    track_opens: bool,
    track_links: &'static str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    attachments: &'a [EncodedAttachment],
}

impl<'a> EmailBody<'a> {
    pub(crate) fn new(email: &'a OutboundEmail, credentials: &'a ProviderCredentials) -> Self {
        Self {
            from: email.from.as_deref().unwrap_or(&credentials.default_sender),
            to: &email.to,
            subject: &email.subject,
            text_body: &email.text_body,
            html_body: email.html_body.as_deref(),
            tag: email.tag.as_deref(),
            message_stream: &credentials.default_message_stream,
            track_opens: true,
            track_links: TRACK_LINKS,
            attachments: &email.attachments,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TemplateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_alias: Option<&'a str>,
    template_model: &'a Map<String, Value>,
    from: &'a str,
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    message_stream: &'a str,
    track_opens: bool,
    track_links: &'static str,
}

impl<'a> TemplateBody<'a> {
    pub(crate) fn new(email: &'a TemplatedEmail, credentials: &'a ProviderCredentials) -> Self {
        let (template_id, template_alias) = match &email.template {
            TemplateRef::Id(id) => (Some(*id), None),
            TemplateRef::Alias(alias) => (None, Some(alias.as_str())),
        };
        Self {
            template_id,
            template_alias,
            template_model: &email.template_model,
            from: email.from.as_deref().unwrap_or(&credentials.default_sender),
            to: &email.to,
            tag: email.tag.as_deref(),
            message_stream: &credentials.default_message_stream,
            track_opens: true,
            track_links: TRACK_LINKS,
        }
    }
}

/// [`EmailProvider`] backed by the Postmark HTTP API.
#[derive(Debug, Clone)]
pub struct PostmarkClient {
    http: Client,
    base_url: String,
    credentials: Arc<ProviderCredentials>,
}

impl PostmarkClient {
    /// Build a client for `base_url` (e.g. `https://api.postmarkapp.com`).
    ///
    /// The token is installed as a sensitive default header; it is never
    /// logged or included in errors.
    pub fn new(base_url: &str, credentials: Arc<ProviderCredentials>) -> Result<Self, ProviderError> {
        let mut token = HeaderValue::from_str(credentials.server_token.expose())
            .map_err(|_| ProviderError::InvalidToken)?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(SERVER_TOKEN_HEADER, token);

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("postmark-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }
}

fn transport_error(error: reqwest::Error) -> ProviderError {
    // Drop the URL so query strings never leak into messages.
    ProviderError::Transport(error.without_url().to_string())
}

/// Decode a 2xx body, or map a non-2xx response to an API or HTTP error.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(api) => ProviderError::Api {
                status: status.as_u16(),
                code: api.error_code,
                message: api.message,
            },
            Err(_) => http_error(status),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
}

fn http_error(status: reqwest::StatusCode) -> ProviderError {
    ProviderError::Http {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    }
}

#[async_trait]
impl EmailProvider for PostmarkClient {
    #[instrument(name = "postmark.send_email", skip_all, fields(attachments = email.attachments.len()))]
    async fn send_email(&self, email: &OutboundEmail) -> Result<SendReceipt, ProviderError> {
        let body = EmailBody::new(email, &self.credentials);
        let receipt: SendReceipt = self.post_json("/email", &body).await?;
        debug!(message_id = %receipt.message_id, "Postmark accepted email");
        Ok(receipt)
    }

    #[instrument(name = "postmark.send_email_with_template", skip_all, fields(template = %email.template))]
    async fn send_email_with_template(
        &self,
        email: &TemplatedEmail,
    ) -> Result<SendReceipt, ProviderError> {
        let body = TemplateBody::new(email, &self.credentials);
        let receipt: SendReceipt = self.post_json("/email/withTemplate", &body).await?;
        debug!(message_id = %receipt.message_id, "Postmark accepted template email");
        Ok(receipt)
    }

    #[instrument(name = "postmark.list_templates", skip_all)]
    async fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError> {
        let mut templates = Vec::new();
        loop {
            let page: TemplatePage = self
                .get_json(
                    "/templates",
                    &[
                        ("count", TEMPLATE_PAGE_SIZE.to_string()),
                        ("offset", templates.len().to_string()),
                    ],
                )
                .await?;
            let received = page.templates.len();
            templates.extend(page.templates);
            debug!(received, total = page.total_count, "Fetched template page");
            if received == 0 || templates.len() as u64 >= page.total_count {
                break;
            }
        }
        Ok(templates)
    }

    #[instrument(name = "postmark.outbound_stats", skip_all, fields(tag = ?filter.tag))]
    async fn outbound_stats(&self, filter: &StatsFilter) -> Result<OutboundStats, ProviderError> {
        let response = self
            .http
            .get(self.url("/stats/outbound"))
            .query(&filter.query())
            .send()
            .await
            .map_err(transport_error)?;

        // Statistics failures report only status and reason.
        let status = response.status();
        if !status.is_success() {
            return Err(http_error(status));
        }
        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.without_url().to_string()))
    }

    #[instrument(name = "postmark.server_info", skip_all)]
    async fn server_info(&self) -> Result<ServerSummary, ProviderError> {
        self.get_json("/server", &[]).await
    }
}
