//! Tool registry - the fixed set of tools this server exposes.
//!
//! Input schemas are generated from the argument types in [`crate::schema`],
//! inlined (no `$ref`) so that simple MCP clients can read them.

use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::schema::{DeliveryStatsArgs, ListTemplatesArgs, SendEmailArgs, SendTemplateArgs};

/// Which handler a tool name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    SendMessage,
    SendTemplatedMessage,
    ListTemplates,
    GetDeliveryStats,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::SendMessage,
        ToolKind::SendTemplatedMessage,
        ToolKind::ListTemplates,
        ToolKind::GetDeliveryStats,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::SendMessage => "send-message",
            ToolKind::SendTemplatedMessage => "send-templated-message",
            ToolKind::ListTemplates => "list-templates",
            ToolKind::GetDeliveryStats => "get-delivery-stats",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::SendMessage => {
                "Send an email through Postmark, optionally with file attachments"
            }
            ToolKind::SendTemplatedMessage => {
                "Send an email using a Postmark template, by template ID or alias"
            }
            ToolKind::ListTemplates => "List all templates available on the Postmark server",
            ToolKind::GetDeliveryStats => {
                "Get outbound delivery statistics: sent count, open rate and click rate"
            }
        }
    }

    /// Prefix for error results produced after validation.
    pub fn failure_context(self) -> &'static str {
        match self {
            ToolKind::SendMessage => "Failed to send email",
            ToolKind::SendTemplatedMessage => "Failed to send template email",
            ToolKind::ListTemplates => "Failed to list templates",
            ToolKind::GetDeliveryStats => "Failed to fetch delivery statistics",
        }
    }

    fn input_schema(self) -> JsonObject {
        match self {
            ToolKind::SendMessage => schema_for::<SendEmailArgs>(),
            ToolKind::SendTemplatedMessage => schema_for::<SendTemplateArgs>(),
            ToolKind::ListTemplates => schema_for::<ListTemplatesArgs>(),
            ToolKind::GetDeliveryStats => schema_for::<DeliveryStatsArgs>(),
        }
    }
}

/// Helper to generate an inlined JSON schema object for a type
fn schema_for<T: JsonSchema>() -> JsonObject {
    let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let generator = settings.into_generator();
    let schema = generator.into_root_schema_for::<T>();
    match serde_json::to_value(schema) {
        Ok(Value::Object(map)) => map,
        _ => JsonObject::new(),
    }
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub kind: ToolKind,
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Arc<JsonObject>,
}

impl ToolDefinition {
    pub fn new(kind: ToolKind) -> Self {
        Self {
            kind,
            name: kind.name(),
            description: kind.description(),
            input_schema: Arc::new(kind.input_schema()),
        }
    }

    pub fn to_tool(&self) -> Tool {
        Tool::new(self.name, self.description, Arc::clone(&self.input_schema))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool `{0}` is already registered")]
    Duplicate(&'static str),
}

/// Name-unique set of tool definitions, fixed once the server starts.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Every tool this server offers.
    pub fn standard() -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for kind in ToolKind::ALL {
            registry.register(ToolDefinition::new(kind))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), RegistryError> {
        if self.get(definition.name).is_some() {
            return Err(RegistryError::Duplicate(definition.name));
        }
        self.definitions.push(definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.definitions.iter()
    }

    /// Definitions in registration order, as MCP tools.
    pub fn tools(&self) -> Vec<Tool> {
        self.definitions.iter().map(ToolDefinition::to_tool).collect()
    }
}
