//! Error types for the Google Drive MCP Server
//!
//! This module defines the error hierarchy for all operations in the server.

use thiserror::Error;

use crate::mcp::types::JsonRpcError;

/// Main error type for the Google Drive MCP Server
#[derive(Error, Debug)]
pub enum GdriveMcpError {
    /// OAuth authentication errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Drive / Sheets API errors
    #[error("Drive API error: {0}")]
    Drive(#[from] DriveApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// Session registry errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// OAuth authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OAuth keys file not found: {path}")]
    KeysFileNotFound { path: String },

    #[error("Invalid OAuth keys format: expected 'installed' or 'web' credentials")]
    InvalidKeysFormat,

    #[error("Credentials not found: {path}")]
    CredentialsNotFound { path: String },

    #[error("Failed to refresh access token: {message}")]
    TokenRefreshFailed { message: String },

    #[error("OAuth callback error: {message}")]
    CallbackError { message: String },

    #[error("No authorization code provided")]
    NoAuthCode,

    #[error("Token exchange failed: {message}")]
    TokenExchangeFailed { message: String },
}

/// Drive and Sheets API errors
#[derive(Error, Debug)]
pub enum DriveApiError {
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    #[error("API request failed: {message}")]
    RequestFailed { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found: {path}")]
    DirNotFound { path: String },

    #[error("Failed to create config directory: {path}")]
    DirCreationFailed { path: String },

    #[error("Invalid value for {var}: {value}")]
    InvalidEnvVar { var: String, value: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Tool already registered: {name}")]
    DuplicateTool { name: String },

    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Invalid resource URI: {uri}")]
    InvalidResourceUri { uri: String },

    #[error("Resource unavailable: {message}")]
    ResourceUnavailable { message: String },

    #[error("Request timed out after {secs} seconds")]
    Timeout { secs: u64 },
}

/// Session registry and routing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Missing sessionId")]
    MissingSessionId,

    #[error("Unknown sessionId")]
    SessionNotFound { session_id: String },

    #[error("Session already registered: {session_id}")]
    DuplicateSession { session_id: String },

    #[error("Session limit ({limit}) reached")]
    CapacityExceeded { limit: usize },

    #[error("Session is not keeping up; retry later")]
    Backlogged { session_id: String },
}

/// Result type alias for Google Drive MCP operations
pub type Result<T> = std::result::Result<T, GdriveMcpError>;

/// JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

impl GdriveMcpError {
    /// JSON-RPC error code for this error
    pub fn error_code(&self) -> i32 {
        match self {
            GdriveMcpError::Mcp(McpError::UnknownTool { .. }) => error_codes::METHOD_NOT_FOUND,
            GdriveMcpError::Mcp(McpError::InvalidArguments { .. })
            | GdriveMcpError::Mcp(McpError::InvalidResourceUri { .. }) => {
                error_codes::INVALID_PARAMS
            }
            GdriveMcpError::Json(_) => error_codes::INVALID_PARAMS,
            _ => error_codes::INTERNAL_ERROR,
        }
    }

    /// Convert to a JSON-RPC error object
    pub fn to_json_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.error_code(),
            message: self.to_string(),
            data: None,
        }
    }
}

impl From<GdriveMcpError> for JsonRpcError {
    fn from(error: GdriveMcpError) -> Self {
        error.to_json_rpc_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::KeysFileNotFound {
            path: "/path/to/keys.json".to_string(),
        };
        assert!(err.to_string().contains("/path/to/keys.json"));
    }

    #[test]
    fn test_error_conversion() {
        let auth_err = AuthError::NoAuthCode;
        let err: GdriveMcpError = auth_err.into();
        assert!(matches!(err, GdriveMcpError::Auth(_)));
    }

    #[test]
    fn test_unknown_tool_maps_to_method_not_found() {
        let err: GdriveMcpError = McpError::UnknownTool {
            name: "nope".to_string(),
        }
        .into();
        let rpc = err.to_json_rpc_error();
        assert_eq!(rpc.code, error_codes::METHOD_NOT_FOUND);
        assert!(rpc.message.contains("nope"));
    }

    #[test]
    fn test_auth_errors_are_internal() {
        let err: GdriveMcpError = AuthError::CredentialsNotFound {
            path: "creds.json".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), error_codes::INTERNAL_ERROR);
    }

    #[test]
    fn test_routing_reason_strings() {
        assert_eq!(SessionError::MissingSessionId.to_string(), "Missing sessionId");
        let err = SessionError::SessionNotFound {
            session_id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown sessionId");
    }
}
