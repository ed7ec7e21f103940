//! Drive and Sheets API type definitions
//!
//! These types mirror the API responses and are used for serialization/deserialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A Drive file's metadata
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// MIME type
    #[serde(default)]
    pub mime_type: String,

    /// Last modification time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,

    /// Size in bytes; the API returns it as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// One page of a file listing
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    /// Files on this page
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for the next page, absent when exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Body of a file, as text or as raw bytes
#[derive(Debug, Clone, PartialEq)]
pub enum FileBody {
    Text(String),
    Binary(Vec<u8>),
}

/// A file's content together with the MIME type it was fetched as
#[derive(Debug, Clone)]
pub struct FileContent {
    /// Name of the file
    pub name: String,

    /// MIME type of `body` (the export type for Google Workspace files)
    pub mime_type: String,

    /// Content
    pub body: FileBody,
}

/// Values of one range in a spreadsheet
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    /// A1 range
    #[serde(default)]
    pub range: String,

    /// Row-major cell values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Vec<Value>>,
}

/// Response of `values:batchGet`
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetValuesResponse {
    #[serde(default)]
    pub value_ranges: Vec<ValueRange>,
}

/// Spreadsheet metadata restricted to sheet titles
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SpreadsheetSheets {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Sheet {
    #[serde(default)]
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SheetProperties {
    #[serde(default)]
    pub title: String,
}

/// Response of a single-range values update
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    #[serde(default)]
    pub updated_range: String,

    #[serde(default)]
    pub updated_cells: u64,
}
