//! Tool registry
//!
//! Tools are registered once at startup and looked up by exact name. Listing
//! preserves registration order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{GdriveMcpError, McpError, Result};
use crate::mcp::types::{CallToolResult, Tool, ToolResultContent};

/// Raw file content produced by a tool, alongside its display text
#[derive(Debug, Clone, PartialEq)]
pub struct RawContent {
    /// MIME type of the content
    pub mime_type: String,

    /// Textual content
    pub text: Option<String>,

    /// Base64 binary content
    pub blob: Option<String>,
}

/// What a tool handler returns
#[derive(Debug, Clone)]
pub struct ToolResponse {
    /// Content blocks shown to the client
    pub content: Vec<ToolResultContent>,

    /// Whether the tool failed
    pub is_error: bool,

    /// Structured content for internal consumers such as resource reads
    pub raw: Option<RawContent>,
}

impl ToolResponse {
    /// A text response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text { text: text.into() }],
            is_error: false,
            raw: None,
        }
    }

    /// An error response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text {
                text: format!("Error: {}", message.into()),
            }],
            is_error: true,
            raw: None,
        }
    }

    /// Attach raw content
    pub fn with_raw(mut self, raw: RawContent) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Translate into the protocol envelope
    pub fn into_call_result(self) -> CallToolResult {
        CallToolResult {
            content: self.content,
            is_error: self.is_error,
        }
    }
}

/// A tool's behaviour
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> ToolResponse;
}

/// A registered tool
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler,
        }
    }

    /// Discovery view of this tool
    pub fn definition(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }

    /// Run the handler
    pub async fn invoke(&self, args: Value) -> ToolResponse {
        self.handler.call(args).await
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Name-keyed set of tools
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(GdriveMcpError::Mcp(McpError::DuplicateTool {
                name: descriptor.name,
            }));
        }

        self.index
            .insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    /// Tool definitions in registration order
    pub fn list(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolDescriptor::definition).collect()
    }

    /// Look up a tool by exact name
    pub fn get(&self, name: &str) -> Result<&ToolDescriptor> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| {
                GdriveMcpError::Mcp(McpError::UnknownTool {
                    name: name.to_string(),
                })
            })
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
