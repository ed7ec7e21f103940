//! Drive files as MCP resources
//!
//! Listing maps one page of Drive files to resources; reading delegates to the
//! `gdrive_read_file` tool and uses its structured raw content.

use serde_json::json;

use crate::error::{GdriveMcpError, McpError, Result};
use crate::gdrive::client::DriveClient;
use crate::gdrive::types::DriveFile;
use crate::mcp::registry::ToolRegistry;
use crate::mcp::tools::READ_FILE_TOOL;
use crate::mcp::types::{
    ListResourcesResult, ReadResourceResult, Resource, ResourceContent, ToolResultContent,
};

/// URI prefix of Drive resources
pub const URI_PREFIX: &str = "gdrive:///";

/// Resource address of a file
pub fn file_uri(file_id: &str) -> String {
    format!("{}{}", URI_PREFIX, file_id)
}

/// File id addressed by a resource URI
pub fn file_id_from_uri(uri: &str) -> Result<&str> {
    uri.strip_prefix(URI_PREFIX)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            GdriveMcpError::Mcp(McpError::InvalidResourceUri {
                uri: uri.to_string(),
            })
        })
}

pub fn to_resource(file: &DriveFile) -> Resource {
    Resource {
        uri: file_uri(&file.id),
        name: file.name.clone(),
        mime_type: Some(file.mime_type.clone()).filter(|m| !m.is_empty()),
    }
}

/// One page of resources
pub async fn list_resources(
    drive: &DriveClient,
    page_size: u32,
    cursor: Option<&str>,
) -> Result<ListResourcesResult> {
    let page = drive.list_files(page_size, cursor).await?;

    Ok(ListResourcesResult {
        resources: page.files.iter().map(to_resource).collect(),
        next_cursor: page.next_page_token.filter(|t| !t.is_empty()),
    })
}

/// Read a resource through the file-read tool
pub async fn read_resource(tools: &ToolRegistry, uri: &str) -> Result<ReadResourceResult> {
    let file_id = file_id_from_uri(uri)?;
    let response = tools
        .get(READ_FILE_TOOL)?
        .invoke(json!({ "fileId": file_id }))
        .await;

    if response.is_error {
        let message = response
            .content
            .iter()
            .map(|c| match c {
                ToolResultContent::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        return Err(GdriveMcpError::Mcp(McpError::ResourceUnavailable { message }));
    }

    let raw = response.raw.ok_or_else(|| {
        GdriveMcpError::Mcp(McpError::ResourceUnavailable {
            message: format!("{} returned no content for {}", READ_FILE_TOOL, uri),
        })
    })?;

    Ok(ReadResourceResult {
        contents: vec![ResourceContent {
            uri: uri.to_string(),
            mime_type: Some(raw.mime_type),
            text: raw.text,
            blob: raw.blob,
        }],
    })
}
