//! postmark-mcp - MCP tool server backed by the Postmark email API
//!
//! This library provides:
//! - `schema` / `validate`: tool argument types and their validation into `ToolCall`
//! - `attachments`: file references to base64 attachments
//! - `provider`: the `EmailProvider` trait and the Postmark HTTP client
//! - `dispatch` / `responses`: tool execution and result text
//! - `handler`: rmcp `ServerHandler` over the dispatcher
//! - `lifecycle`: startup checks, stdio serving, signal shutdown
//! - `telemetry`: stderr logging and optional OTLP export

pub mod attachments;
pub mod commands;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod provider;
pub mod responses;
pub mod schema;
pub mod telemetry;
pub mod tools_registry;
pub mod validate;

pub use dispatch::Dispatcher;
pub use error::{AttachmentReadError, ToolError, ValidationError};
pub use handler::PostmarkHandler;
pub use provider::{EmailProvider, PostmarkClient, ProviderError};
pub use responses::ToolResult;
pub use tools_registry::{ToolKind, ToolRegistry};
