//! MCP Tool definitions and handlers
//!
//! Defines the Drive and Sheets tools and registers them by name.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::gdrive::client::DriveClient;
use crate::gdrive::types::FileBody;
use crate::gdrive::utils::{encode_binary, format_size};
use crate::mcp::registry::{RawContent, ToolDescriptor, ToolHandler, ToolRegistry, ToolResponse};

pub const SEARCH_TOOL: &str = "gdrive_search";
pub const READ_FILE_TOOL: &str = "gdrive_read_file";
pub const SHEETS_READ_TOOL: &str = "gsheets_read";
pub const SHEETS_UPDATE_TOOL: &str = "gsheets_update_cell";

const DEFAULT_SEARCH_PAGE_SIZE: u32 = 10;
const MAX_SEARCH_PAGE_SIZE: u32 = 100;

/// Build the registry of Drive tools
pub fn drive_tools(drive: Arc<DriveClient>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(ToolDescriptor::new(
        SEARCH_TOOL,
        "Search for files in Google Drive",
        search_schema(),
        Arc::new(SearchFiles {
            drive: drive.clone(),
        }),
    ))?;
    registry.register(ToolDescriptor::new(
        READ_FILE_TOOL,
        "Read contents of a file from Google Drive",
        read_file_schema(),
        Arc::new(ReadFile {
            drive: drive.clone(),
        }),
    ))?;
    registry.register(ToolDescriptor::new(
        SHEETS_READ_TOOL,
        "Read data from a Google Spreadsheet with flexible options for ranges and formatting",
        sheets_read_schema(),
        Arc::new(ReadSheet {
            drive: drive.clone(),
        }),
    ))?;
    registry.register(ToolDescriptor::new(
        SHEETS_UPDATE_TOOL,
        "Update a cell value in a Google Spreadsheet",
        sheets_update_schema(),
        Arc::new(UpdateCell { drive }),
    ))?;

    Ok(registry)
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> std::result::Result<T, ToolResponse> {
    serde_json::from_value(args)
        .map_err(|e| ToolResponse::error(format!("Invalid arguments: {}", e)))
}

// ==================== Tool Handlers ====================

struct SearchFiles {
    drive: Arc<DriveClient>,
}

#[async_trait]
impl ToolHandler for SearchFiles {
    async fn call(&self, args: Value) -> ToolResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            query: String,
            page_token: Option<String>,
            page_size: Option<u32>,
        }

        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(response) => return response,
        };

        let page_size = args
            .page_size
            .unwrap_or(DEFAULT_SEARCH_PAGE_SIZE)
            .clamp(1, MAX_SEARCH_PAGE_SIZE);

        match self
            .drive
            .search_files(&args.query, page_size, args.page_token.as_deref())
            .await
        {
            Ok(page) => {
                let mut text = format!("Found {} files:\n", page.files.len());
                for file in &page.files {
                    let size = file
                        .size
                        .as_deref()
                        .and_then(|s| s.parse::<i64>().ok())
                        .map(|s| format!(", {}", format_size(s)))
                        .unwrap_or_default();
                    text.push_str(&format!(
                        "{} ({}{}) - ID: {}\n",
                        file.name, file.mime_type, size, file.id
                    ));
                }
                if let Some(token) = page.next_page_token {
                    text.push_str(&format!("\nMore results available. Use pageToken: {}", token));
                }
                ToolResponse::text(text)
            }
            Err(e) => ToolResponse::error(e.to_string()),
        }
    }
}

struct ReadFile {
    drive: Arc<DriveClient>,
}

#[async_trait]
impl ToolHandler for ReadFile {
    async fn call(&self, args: Value) -> ToolResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            file_id: String,
        }

        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(response) => return response,
        };

        match self.drive.read_file(&args.file_id).await {
            Ok(file) => {
                let raw = match file.body {
                    FileBody::Text(text) => RawContent {
                        mime_type: file.mime_type,
                        text: Some(text),
                        blob: None,
                    },
                    FileBody::Binary(bytes) => RawContent {
                        mime_type: file.mime_type,
                        text: None,
                        blob: Some(encode_binary(&bytes)),
                    },
                };
                let shown = raw
                    .text
                    .clone()
                    .or_else(|| raw.blob.clone())
                    .unwrap_or_default();

                ToolResponse::text(format!("Contents of {}:\n\n{}", file.name, shown))
                    .with_raw(raw)
            }
            Err(e) => ToolResponse::error(e.to_string()),
        }
    }
}

struct ReadSheet {
    drive: Arc<DriveClient>,
}

#[async_trait]
impl ToolHandler for ReadSheet {
    async fn call(&self, args: Value) -> ToolResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            spreadsheet_id: String,
            ranges: Option<Vec<String>>,
        }

        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(response) => return response,
        };

        let ranges = match args.ranges.filter(|r| !r.is_empty()) {
            Some(ranges) => ranges,
            None => match self.drive.sheet_titles(&args.spreadsheet_id).await {
                Ok(titles) => titles,
                Err(e) => return ToolResponse::error(e.to_string()),
            },
        };

        match self.drive.read_ranges(&args.spreadsheet_id, &ranges).await {
            Ok(value_ranges) => match serde_json::to_string_pretty(&value_ranges) {
                Ok(text) => ToolResponse::text(text),
                Err(e) => ToolResponse::error(e.to_string()),
            },
            Err(e) => ToolResponse::error(e.to_string()),
        }
    }
}

struct UpdateCell {
    drive: Arc<DriveClient>,
}

#[async_trait]
impl ToolHandler for UpdateCell {
    async fn call(&self, args: Value) -> ToolResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            file_id: String,
            range: String,
            value: String,
        }

        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(response) => return response,
        };

        match self
            .drive
            .update_cell(&args.file_id, &args.range, &args.value)
            .await
        {
            Ok(_) => ToolResponse::text(format!(
                "Updated cell {} to value: {}",
                args.range, args.value
            )),
            Err(e) => ToolResponse::error(e.to_string()),
        }
    }
}

// ==================== Schemas ====================

fn search_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Search query"
            },
            "pageToken": {
                "type": "string",
                "description": "Token for the next page of results"
            },
            "pageSize": {
                "type": "number",
                "description": "Number of results per page (max 100)"
            }
        },
        "required": ["query"]
    })
}

fn read_file_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "fileId": {
                "type": "string",
                "description": "ID of the file to read"
            }
        },
        "required": ["fileId"]
    })
}

fn sheets_read_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "spreadsheetId": {
                "type": "string",
                "description": "The ID of the spreadsheet to read"
            },
            "ranges": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Optional array of A1 notation ranges like ['Sheet1!A1:B10']. If not provided, reads every sheet."
            }
        },
        "required": ["spreadsheetId"]
    })
}

fn sheets_update_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "fileId": {
                "type": "string",
                "description": "ID of the spreadsheet"
            },
            "range": {
                "type": "string",
                "description": "Cell range in A1 notation (e.g. 'Sheet1!A1')"
            },
            "value": {
                "type": "string",
                "description": "New cell value"
            }
        },
        "required": ["fileId", "range", "value"]
    })
}
