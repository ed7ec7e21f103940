//! MCP Server implementation
//!
//! JSON-RPC dispatch for one message at a time. Transports own delivery; this
//! type only turns a request into an optional response.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{GdriveMcpError, McpError};
use crate::gdrive::auth::Authenticator;
use crate::gdrive::client::DriveClient;
use crate::mcp::registry::ToolRegistry;
use crate::mcp::resources;
use crate::mcp::types::*;

/// MCP Server info
const SERVER_NAME: &str = "example-servers/gdrive";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

type Dispatch = std::result::Result<Value, JsonRpcError>;

/// MCP Server for Google Drive
pub struct McpServer {
    /// Drive client used for resource listing
    drive: Arc<DriveClient>,

    /// Credential provider
    authenticator: Arc<Authenticator>,

    /// Registered tools
    tools: ToolRegistry,

    /// Page size for resource listing
    page_size: u32,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(
        drive: Arc<DriveClient>,
        authenticator: Arc<Authenticator>,
        tools: ToolRegistry,
        page_size: u32,
    ) -> Self {
        Self {
            drive,
            authenticator,
            tools,
            page_size,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handle one incoming JSON-RPC message. Notifications yield `None`.
    pub async fn handle_message(&self, message: Value) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(req) => req,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::invalid_request(e.to_string()),
                ));
            }
        };

        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "Received notification");
            return None;
        };

        let result = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(),
            methods::PING => Ok(serde_json::json!({})),
            methods::LIST_TOOLS => self.handle_list_tools(),
            methods::CALL_TOOL => self.handle_call_tool(&request).await,
            methods::LIST_RESOURCES => self.handle_list_resources(&request).await,
            methods::READ_RESOURCE => self.handle_read_resource(&request).await,
            _ => Err(JsonRpcError::method_not_found(&request.method)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(Some(id), error),
        })
    }

    /// Handle initialize request
    fn handle_initialize(&self) -> Dispatch {
        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {}),
                resources: Some(ResourcesCapability::default()),
            },
        };

        to_value(result)
    }

    /// Handle list tools request
    fn handle_list_tools(&self) -> Dispatch {
        to_value(ListToolsResult {
            tools: self.tools.list(),
        })
    }

    /// Handle call tool request
    async fn handle_call_tool(&self, request: &JsonRpcRequest) -> Dispatch {
        let params: CallToolParams = required_params(request)?;
        let tool = self.tools.get(&params.name)?;

        if let Err(e) = self.authenticator.acquire_strict().await {
            warn!(tool = %params.name, error = %e, "Tool call rejected: no usable credentials");
            return Err(e.into());
        }

        debug!(tool = %params.name, "Invoking tool");
        let response = tool.invoke(params.arguments).await;
        to_value(response.into_call_result())
    }

    /// Handle list resources request
    async fn handle_list_resources(&self, request: &JsonRpcRequest) -> Dispatch {
        let params: ListResourcesParams = optional_params(request)?;
        self.authenticator.acquire_quiet().await;

        let result =
            resources::list_resources(&self.drive, self.page_size, params.cursor.as_deref()).await?;
        to_value(result)
    }

    /// Handle read resource request
    async fn handle_read_resource(&self, request: &JsonRpcRequest) -> Dispatch {
        let params: ReadResourceParams = required_params(request)?;
        self.authenticator.acquire_quiet().await;

        let result = resources::read_resource(&self.tools, &params.uri).await?;
        to_value(result)
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Dispatch {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

fn required_params<T: DeserializeOwned>(request: &JsonRpcRequest) -> std::result::Result<T, JsonRpcError> {
    let params = request.params.clone().ok_or_else(|| {
        GdriveMcpError::Mcp(McpError::InvalidArguments {
            message: "Missing params".to_string(),
        })
    })?;
    parse_params(params)
}

fn optional_params<T: DeserializeOwned + Default>(
    request: &JsonRpcRequest,
) -> std::result::Result<T, JsonRpcError> {
    match request.params.clone() {
        Some(Value::Null) | None => Ok(T::default()),
        Some(params) => parse_params(params),
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> std::result::Result<T, JsonRpcError> {
    serde_json::from_value(params).map_err(|e| {
        GdriveMcpError::Mcp(McpError::InvalidArguments {
            message: e.to_string(),
        })
        .into()
    })
}
