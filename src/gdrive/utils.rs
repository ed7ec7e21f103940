//! Drive utility functions
//!
//! Export format selection, text detection, search query building and size formatting.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::config::gdrive::mime;
use crate::gdrive::types::FileBody;

/// Export MIME type for a Google Workspace file, `None` for regular files
pub fn export_mime_type(mime_type: &str) -> Option<&'static str> {
    if !mime_type.starts_with(mime::APPS_PREFIX) {
        return None;
    }

    Some(match mime_type {
        mime::DOCUMENT => "text/markdown",
        mime::SPREADSHEET => "text/csv",
        mime::PRESENTATION => "text/plain",
        mime::DRAWING => "image/png",
        _ => "text/plain",
    })
}

/// Whether content of this MIME type is returned as text
pub fn is_text_mime(mime_type: &str) -> bool {
    mime_type.starts_with("text/") || mime_type == "application/json"
}

/// Decode downloaded bytes according to their MIME type
pub fn into_body(mime_type: &str, bytes: Vec<u8>) -> FileBody {
    if is_text_mime(mime_type) {
        match String::from_utf8(bytes) {
            Ok(text) => FileBody::Text(text),
            Err(e) => FileBody::Binary(e.into_bytes()),
        }
    } else {
        FileBody::Binary(bytes)
    }
}

/// Base64 encoding for binary bodies
pub fn encode_binary(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Build a Drive full-text search query, escaping quotes and backslashes
pub fn full_text_query(user_query: &str) -> String {
    let escaped = user_query.replace('\\', "\\\\").replace('\'', "\\'");
    format!("fullText contains '{}'", escaped)
}

/// Format file size for display
pub fn format_size(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = KB * 1024;
    const GB: i64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
