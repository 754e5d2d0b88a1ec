//! rmcp `ServerHandler` over the [`Dispatcher`].

use rmcp::model::{
    CallToolRequestParam, CallToolResult, ErrorData, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use std::sync::Arc;
use tracing::debug;

use crate::dispatch::Dispatcher;

const INSTRUCTIONS: &str = "Send transactional email through Postmark.\n\n\
    - send-message: plain text or HTML email, optionally with attachments read from local files\n\
    - send-templated-message: email rendered from a Postmark template (templateId or templateAlias)\n\
    - list-templates: every template on the server with its ID and alias\n\
    - get-delivery-stats: sent count, open rate and click rate, optionally by tag and date range";

/// MCP handler exposing the registered tools.
#[derive(Clone)]
pub struct PostmarkHandler {
    dispatcher: Arc<Dispatcher>,
}

impl PostmarkHandler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl ServerHandler for PostmarkHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "postmark-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = self.dispatcher.registry().tools();
        debug!(count = tools.len(), "Listing tools");
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.dispatcher
            .dispatch(&request.name, request.arguments)
            .await
            .map(CallToolResult::from)
            .map_err(|e| ErrorData::invalid_params(e.to_string(), None))
    }
}
