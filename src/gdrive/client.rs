//! Drive API client
//!
//! High-level client for the Drive v3 and Sheets v4 operations the tools need.
//! Every call reads the authenticator's latest credential snapshot; acquiring
//! or refreshing credentials is the caller's job.

use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::Config;
use crate::error::{DriveApiError, GdriveMcpError, Result};
use crate::gdrive::auth::Authenticator;
use crate::gdrive::types::*;
use crate::gdrive::utils::{export_mime_type, full_text_query, into_body};

/// Fields requested for file listings
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, modifiedTime, size)";

/// Drive API client
pub struct DriveClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// OAuth authenticator
    authenticator: Arc<Authenticator>,

    /// Drive v3 base URL
    api_base: String,

    /// Sheets v4 base URL
    sheets_base: String,
}

impl DriveClient {
    /// Create a new Drive client
    pub fn new(authenticator: Arc<Authenticator>, config: &Config) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            authenticator,
            api_base: config.drive_api_base.trim_end_matches('/').to_string(),
            sheets_base: config.sheets_api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Attach the current access token, if any
    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.authenticator.snapshot().await {
            Some(creds) => request.bearer_auth(&creds.access_token),
            None => request,
        }
    }

    /// Map a non-success response to an API error
    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = format!("Failed to {} ({}): {}", what, status, text);
        Err(GdriveMcpError::Drive(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                DriveApiError::Unauthorized { message }
            }
            _ => DriveApiError::RequestFailed { message },
        }))
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self.authorized(request).await.send().await?;
        Ok(Self::check(response, what).await?.json().await?)
    }

    // ==================== File Operations ====================

    /// List one page of files
    pub async fn list_files(&self, page_size: u32, page_token: Option<&str>) -> Result<FileList> {
        self.query_files(None, page_size, page_token).await
    }

    /// Full-text search over file names and contents
    pub async fn search_files(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList> {
        self.query_files(Some(full_text_query(query)), page_size, page_token)
            .await
    }

    async fn query_files(
        &self,
        q: Option<String>,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList> {
        let mut params = vec![
            ("pageSize", page_size.to_string()),
            ("fields", LIST_FIELDS.to_string()),
        ];
        if let Some(q) = q {
            params.push(("q", q));
        }
        if let Some(token) = page_token.filter(|t| !t.is_empty()) {
            params.push(("pageToken", token.to_string()));
        }

        let request = self
            .http_client
            .get(format!("{}/files", self.api_base))
            .query(&params);
        self.get_json(request, "list files").await
    }

    /// Get a file's metadata
    pub async fn get_file(&self, file_id: &str) -> Result<DriveFile> {
        let request = self
            .http_client
            .get(format!("{}/files/{}", self.api_base, urlencoding::encode(file_id)))
            .query(&[("fields", "id, name, mimeType, modifiedTime, size")]);
        let response = self.authorized(request).await.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GdriveMcpError::Drive(DriveApiError::FileNotFound {
                file_id: file_id.to_string(),
            }));
        }
        Ok(Self::check(response, "get file").await?.json().await?)
    }

    /// Read a file's content, exporting Google Workspace files
    pub async fn read_file(&self, file_id: &str) -> Result<FileContent> {
        let file = self.get_file(file_id).await?;
        let encoded_id = urlencoding::encode(file_id);

        let (request, mime_type) = match export_mime_type(&file.mime_type) {
            Some(export) => (
                self.http_client
                    .get(format!("{}/files/{}/export", self.api_base, encoded_id))
                    .query(&[("mimeType", export)]),
                export.to_string(),
            ),
            None => (
                self.http_client
                    .get(format!("{}/files/{}", self.api_base, encoded_id))
                    .query(&[("alt", "media")]),
                file.mime_type.clone(),
            ),
        };

        let response = self.authorized(request).await.send().await?;
        let bytes = Self::check(response, "read file").await?.bytes().await?;

        Ok(FileContent {
            name: file.name,
            body: into_body(&mime_type, bytes.to_vec()),
            mime_type,
        })
    }

    // ==================== Sheets Operations ====================

    /// Titles of all sheets in a spreadsheet
    pub async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>> {
        let request = self
            .http_client
            .get(format!(
                "{}/spreadsheets/{}",
                self.sheets_base,
                urlencoding::encode(spreadsheet_id)
            ))
            .query(&[("fields", "sheets.properties.title")]);
        let sheets: SpreadsheetSheets = self.get_json(request, "get spreadsheet").await?;

        Ok(sheets
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    /// Values of the given ranges
    pub async fn read_ranges(&self, spreadsheet_id: &str, ranges: &[String]) -> Result<Vec<ValueRange>> {
        let params: Vec<(&str, &str)> = ranges.iter().map(|r| ("ranges", r.as_str())).collect();
        let request = self
            .http_client
            .get(format!(
                "{}/spreadsheets/{}/values:batchGet",
                self.sheets_base,
                urlencoding::encode(spreadsheet_id)
            ))
            .query(&params);
        let response: BatchGetValuesResponse = self.get_json(request, "read ranges").await?;

        Ok(response.value_ranges)
    }

    /// Write one value into a single cell range
    pub async fn update_cell(
        &self,
        spreadsheet_id: &str,
        range: &str,
        value: &str,
    ) -> Result<UpdateValuesResponse> {
        let request = self
            .http_client
            .put(format!(
                "{}/spreadsheets/{}/values/{}",
                self.sheets_base,
                urlencoding::encode(spreadsheet_id),
                urlencoding::encode(range)
            ))
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": [[value]] }));
        self.get_json(request, "update cell").await
    }
}
