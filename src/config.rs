//! Configuration management for the Google Drive MCP Server
//!
//! Handles paths, environment variables, and configuration loading.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, GdriveMcpError, Result};

/// Configuration for Drive access and OAuth
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for storing configuration files
    pub config_dir: PathBuf,

    /// Path to OAuth keys file (client credentials)
    pub oauth_path: PathBuf,

    /// Path to stored credentials (access/refresh tokens)
    pub credentials_path: PathBuf,

    /// OAuth callback URL
    pub oauth_callback_url: String,

    /// OAuth callback port
    pub oauth_callback_port: u16,

    /// Drive API scopes
    pub scopes: Vec<String>,

    /// Base URL of the Drive v3 API
    pub drive_api_base: String,

    /// Base URL of the Sheets v4 API
    pub sheets_api_base: String,
}

impl Config {
    /// Create a new configuration with default paths
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var("GDRIVE_CONFIG_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => Self::default_config_dir()?,
        };
        Self::ensure_dir(&config_dir)?;

        let mut config = Self::with_dir(config_dir);

        if let Ok(path) = std::env::var("GDRIVE_OAUTH_PATH") {
            config.oauth_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("GDRIVE_CREDENTIALS_PATH") {
            config.credentials_path = PathBuf::from(path);
        }
        if let Some(port) = env_parse::<u16, _>(&|var: &str| std::env::var(var).ok(), "GDRIVE_OAUTH_PORT")? {
            config.oauth_callback_port = port;
            config.oauth_callback_url = callback_url(port);
        }
        if let Ok(base) = std::env::var("GDRIVE_API_BASE_URL") {
            config.drive_api_base = base;
        }
        if let Ok(base) = std::env::var("GDRIVE_SHEETS_API_BASE_URL") {
            config.sheets_api_base = base;
        }

        Ok(config)
    }

    /// Configuration rooted at `config_dir` with every other value defaulted
    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let oauth_callback_port = 3001;

        Self {
            oauth_path: config_dir.join("gcp-oauth.keys.json"),
            credentials_path: config_dir.join("credentials.json"),
            config_dir,
            oauth_callback_url: callback_url(oauth_callback_port),
            oauth_callback_port,
            scopes: vec![
                "https://www.googleapis.com/auth/drive.readonly".to_string(),
                "https://www.googleapis.com/auth/spreadsheets".to_string(),
            ],
            drive_api_base: gdrive::API_BASE_URL.to_string(),
            sheets_api_base: gdrive::SHEETS_API_BASE_URL.to_string(),
        }
    }

    fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            GdriveMcpError::Config(ConfigError::DirNotFound {
                path: "~".to_string(),
            })
        })?;
        Ok(home.join(".gdrive-mcp"))
    }

    /// Create the configuration directory if it doesn't exist
    fn ensure_dir(config_dir: &Path) -> Result<()> {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir).map_err(|_| {
                GdriveMcpError::Config(ConfigError::DirCreationFailed {
                    path: config_dir.display().to_string(),
                })
            })?;
        }
        Ok(())
    }

    /// Check if OAuth keys file exists
    pub fn oauth_keys_exist(&self) -> bool {
        self.oauth_path.exists()
    }

    /// Check if credentials (tokens) exist
    pub fn credentials_exist(&self) -> bool {
        self.credentials_path.exists()
    }

    /// Try to find OAuth keys in current directory and copy to config dir
    pub fn find_and_copy_oauth_keys(&self) -> Result<bool> {
        let local_oauth = std::env::current_dir()?.join("gcp-oauth.keys.json");

        if local_oauth.exists() && !self.oauth_keys_exist() {
            std::fs::copy(&local_oauth, &self.oauth_path)?;
            return Ok(true);
        }

        Ok(false)
    }
}

fn callback_url(port: u16) -> String {
    format!("http://localhost:{}/oauth2callback", port)
}

/// Configuration for the HTTP/SSE front
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Shared secret required on every request, if set
    pub api_key: Option<String>,

    /// Allowed CORS origins (`None` = any)
    pub cors_origins: Option<Vec<String>>,

    /// Period of the background credential refresh
    pub refresh_interval: Duration,

    /// Maximum number of concurrently open sessions
    pub max_sessions: usize,

    /// Page size for resource listing
    pub page_size: u32,

    /// Upper bound on processing one message
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_key: None,
            cors_origins: None,
            refresh_interval: Duration::from_secs(45 * 60),
            max_sessions: 256,
            page_size: 10,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ServerConfig {
    /// Load from `MCP_*` / `CORS_ORIGIN` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Counts and durations are at least 1.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("MCP_HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse(&lookup, "MCP_PORT")? {
            config.port = port;
        }
        config.api_key = lookup("MCP_API_KEY").filter(|key| !key.is_empty());
        if let Some(origins) = lookup("CORS_ORIGIN") {
            config.cors_origins = parse_origins(&origins);
        }
        if let Some(secs) = env_parse::<u64, _>(&lookup, "MCP_TOKEN_REFRESH_SECS")? {
            config.refresh_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(max) = env_parse::<usize, _>(&lookup, "MCP_MAX_SESSIONS")? {
            config.max_sessions = max.max(1);
        }
        if let Some(size) = env_parse::<u32, _>(&lookup, "MCP_PAGE_SIZE")? {
            config.page_size = size.max(1);
        }
        if let Some(secs) = env_parse::<u64, _>(&lookup, "MCP_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }

        Ok(config)
    }

    /// `host:port` string for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a comma-separated origin list; `*` or empty means any origin
pub fn parse_origins(raw: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        None
    } else {
        Some(origins)
    }
}

fn env_parse<T, F>(lookup: &F, var: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            GdriveMcpError::Config(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                value,
            })
        }),
        None => Ok(None),
    }
}

/// Google API constants
pub mod gdrive {
    /// Base URL for the Drive v3 API
    pub const API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

    /// Base URL for the Sheets v4 API
    pub const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";

    /// Google Workspace MIME types with their export targets
    pub mod mime {
        pub const DOCUMENT: &str = "application/vnd.google-apps.document";
        pub const SPREADSHEET: &str = "application/vnd.google-apps.spreadsheet";
        pub const PRESENTATION: &str = "application/vnd.google-apps.presentation";
        pub const DRAWING: &str = "application/vnd.google-apps.drawing";
        pub const APPS_PREFIX: &str = "application/vnd.google-apps";
    }
}
