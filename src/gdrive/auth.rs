//! OAuth authentication for the Drive API
//!
//! Handles OAuth 2.0 authentication including:
//! - Loading client credentials
//! - Interactive browser-based authentication
//! - Quiet and strict token acquisition
//! - Token storage and periodic background refresh
//!
//! The current credential is a single process-wide snapshot. Readers clone the
//! `Arc`; every write goes through [`Authenticator::install`], and refreshes are
//! serialized by `refresh_lock` so concurrent callers share one token request.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AuthError, GdriveMcpError, Result};

/// Tokens expiring within this many seconds are refreshed before use
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// OAuth client credentials
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthKeys {
    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Auth URI
    pub auth_uri: String,

    /// Token URI
    pub token_uri: String,
}

/// OAuth keys file format (can be "installed" or "web")
#[derive(Debug, Deserialize)]
struct OAuthKeysFile {
    #[serde(alias = "web")]
    installed: Option<OAuthKeys>,
}

/// Stored credentials (tokens)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// Access token
    pub access_token: String,

    /// Refresh token
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Expiry timestamp (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,

    /// Scopes
    #[serde(default)]
    pub scope: String,
}

impl StoredCredentials {
    /// Whether the token expires within `secs` seconds of `now`.
    /// Tokens without an expiry never count as expiring.
    pub fn expires_within(&self, secs: i64, now: i64) -> bool {
        match self.expiry_date {
            Some(expiry) => expiry.saturating_sub(now) < secs,
            None => false,
        }
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Token response from OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<i64>,
    #[serde(default)]
    scope: String,
}

impl TokenResponse {
    fn into_credentials(self, previous_refresh: Option<String>) -> StoredCredentials {
        StoredCredentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            token_type: self.token_type,
            expiry_date: self.expires_in.map(|e| unix_now() + e),
            scope: self.scope,
        }
    }
}

/// OAuth authenticator and credential provider
pub struct Authenticator {
    /// Configuration
    config: Config,

    /// HTTP client
    http_client: reqwest::Client,

    /// OAuth client credentials; refresh is impossible without them
    keys: Option<OAuthKeys>,

    /// Current credentials snapshot
    credentials: RwLock<Option<Arc<StoredCredentials>>>,

    /// Serializes token refreshes
    refresh_lock: Mutex<()>,
}

impl Authenticator {
    /// Create a new authenticator, loading any stored credentials quietly.
    ///
    /// A missing keys file is tolerated (tokens can still be used until they
    /// expire); a malformed one is an error.
    pub async fn new(config: Config) -> Result<Self> {
        config.find_and_copy_oauth_keys()?;

        let keys = if config.oauth_keys_exist() {
            Some(Self::load_oauth_keys(&config.oauth_path)?)
        } else {
            warn!(
                path = %config.oauth_path.display(),
                "OAuth keys file not found; token refresh is disabled"
            );
            None
        };

        let auth = Self::from_parts(config, keys);
        auth.load_stored().await;
        Ok(auth)
    }

    /// Build an authenticator without touching the filesystem
    pub fn from_parts(config: Config, keys: Option<OAuthKeys>) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            keys,
            credentials: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Load OAuth keys from file
    fn load_oauth_keys(path: &Path) -> Result<OAuthKeys> {
        if !path.exists() {
            return Err(GdriveMcpError::Auth(AuthError::KeysFileNotFound {
                path: path.display().to_string(),
            }));
        }

        let content = std::fs::read_to_string(path)?;
        let keys_file: OAuthKeysFile = serde_json::from_str(&content)?;

        keys_file
            .installed
            .ok_or(GdriveMcpError::Auth(AuthError::InvalidKeysFormat))
    }

    /// Read stored credentials from disk and install them. Failures are logged.
    async fn load_stored(&self) -> Option<Arc<StoredCredentials>> {
        if !self.config.credentials_exist() {
            return None;
        }

        let loaded = async {
            let content = tokio::fs::read_to_string(&self.config.credentials_path).await?;
            let creds: StoredCredentials = serde_json::from_str(&content)?;
            Ok::<_, GdriveMcpError>(creds)
        }
        .await;

        match loaded {
            Ok(creds) => Some(self.install(creds).await),
            Err(e) => {
                debug!(error = %e, "Could not load stored credentials");
                None
            }
        }
    }

    /// Save credentials to file, replacing the previous record atomically
    async fn save_credentials(&self, credentials: &StoredCredentials) -> Result<()> {
        let content = serde_json::to_string_pretty(credentials)?;
        let tmp_path = self.config.credentials_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.config.credentials_path).await?;
        Ok(())
    }

    /// Replace the credential snapshot
    async fn install(&self, credentials: StoredCredentials) -> Arc<StoredCredentials> {
        let credentials = Arc::new(credentials);
        *self.credentials.write().await = Some(credentials.clone());
        credentials
    }

    /// Latest credential snapshot, without loading or refreshing
    pub async fn snapshot(&self) -> Option<Arc<StoredCredentials>> {
        self.credentials.read().await.clone()
    }

    /// Best-effort acquisition: never fails, may return nothing or a stale token
    pub async fn acquire_quiet(&self) -> Option<Arc<StoredCredentials>> {
        let current = match self.snapshot().await {
            Some(creds) => creds,
            None => self.load_stored().await?,
        };

        if current.expires_within(EXPIRY_MARGIN_SECS, unix_now()) && self.can_refresh(&current) {
            match self.refresh_if_expiring(EXPIRY_MARGIN_SECS).await {
                Ok(fresh) => return Some(fresh),
                Err(e) => warn!(error = %e, "Quiet credential refresh failed"),
            }
        }

        Some(current)
    }

    /// Strict acquisition: a usable token or an error
    pub async fn acquire_strict(&self) -> Result<Arc<StoredCredentials>> {
        let current = match self.snapshot().await {
            Some(creds) => creds,
            None => self.load_stored().await.ok_or_else(|| {
                GdriveMcpError::Auth(AuthError::CredentialsNotFound {
                    path: self.config.credentials_path.display().to_string(),
                })
            })?,
        };

        if current.expires_within(EXPIRY_MARGIN_SECS, unix_now()) {
            return self.refresh_if_expiring(EXPIRY_MARGIN_SECS).await;
        }

        Ok(current)
    }

    fn can_refresh(&self, creds: &StoredCredentials) -> bool {
        self.keys.is_some() && creds.refresh_token.is_some()
    }

    /// Refresh the access token if it expires within `within_secs`.
    ///
    /// The expiry is re-checked after taking the refresh lock, so a caller that
    /// waited on another refresh gets the new token without a second request.
    pub async fn refresh_if_expiring(&self, within_secs: i64) -> Result<Arc<StoredCredentials>> {
        let _guard = self.refresh_lock.lock().await;

        let current = match self.snapshot().await {
            Some(creds) => creds,
            None => self.load_stored().await.ok_or_else(|| {
                GdriveMcpError::Auth(AuthError::CredentialsNotFound {
                    path: self.config.credentials_path.display().to_string(),
                })
            })?,
        };

        if !current.expires_within(within_secs, unix_now()) {
            return Ok(current);
        }

        self.request_refresh(&current).await
    }

    /// Exchange the refresh token for a new access token
    async fn request_refresh(&self, current: &StoredCredentials) -> Result<Arc<StoredCredentials>> {
        let keys = self.keys.as_ref().ok_or_else(|| {
            GdriveMcpError::Auth(AuthError::TokenRefreshFailed {
                message: "OAuth client keys not configured".to_string(),
            })
        })?;
        let refresh_token = current.refresh_token.clone().ok_or_else(|| {
            GdriveMcpError::Auth(AuthError::TokenRefreshFailed {
                message: "No refresh token available".to_string(),
            })
        })?;

        let params = [
            ("client_id", keys.client_id.as_str()),
            ("client_secret", keys.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(&keys.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GdriveMcpError::Auth(AuthError::TokenRefreshFailed {
                message: text,
            }));
        }

        let token_response: TokenResponse = response.json().await?;
        let new_credentials = token_response.into_credentials(Some(refresh_token));

        self.save_credentials(&new_credentials).await?;
        let installed = self.install(new_credentials).await;
        info!("Access token refreshed");

        Ok(installed)
    }

    /// One background refresh pass
    async fn background_refresh(&self, period: Duration) {
        if self.snapshot().await.is_none() && !self.config.credentials_exist() {
            debug!("No credentials to refresh");
            return;
        }

        let within = period.as_secs() as i64 + EXPIRY_MARGIN_SECS;
        if let Err(e) = self.refresh_if_expiring(within).await {
            warn!(error = %e, "Background token refresh failed");
        }
    }

    /// Spawn the periodic refresh loop. It runs until the handle is aborted.
    pub fn spawn_refresh_task(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            tick.tick().await;

            loop {
                tick.tick().await;
                debug!("Running background token refresh");
                self.background_refresh(period).await;
            }
        })
    }

    fn require_keys(&self) -> Result<&OAuthKeys> {
        self.keys.as_ref().ok_or_else(|| {
            GdriveMcpError::Auth(AuthError::KeysFileNotFound {
                path: self.config.oauth_path.display().to_string(),
            })
        })
    }

    /// Generate the authorization URL
    pub fn generate_auth_url(&self) -> Result<String> {
        let keys = self.require_keys()?;
        let scopes = self.config.scopes.join(" ");
        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            keys.auth_uri,
            urlencoding::encode(&keys.client_id),
            urlencoding::encode(&self.config.oauth_callback_url),
            urlencoding::encode(&scopes)
        ))
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<Arc<StoredCredentials>> {
        let keys = self.require_keys()?;
        let params = [
            ("client_id", keys.client_id.as_str()),
            ("client_secret", keys.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.oauth_callback_url.as_str()),
        ];

        let response = self
            .http_client
            .post(&keys.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GdriveMcpError::Auth(AuthError::TokenExchangeFailed {
                message: text,
            }));
        }

        let token_response: TokenResponse = response.json().await?;
        let credentials = token_response.into_credentials(None);

        self.save_credentials(&credentials).await?;
        Ok(self.install(credentials).await)
    }

    /// Run interactive authentication flow with local HTTP server
    pub async fn authenticate_interactive(&self) -> Result<()> {
        use axum::{extract::Query, response::Html, routing::get, Router};
        use std::collections::HashMap;
        use tokio::sync::oneshot;

        let auth_url = self.generate_auth_url()?;
        eprintln!("\nPlease visit this URL to authenticate:");
        eprintln!("{}\n", auth_url);

        if let Err(e) = open::that(&auth_url) {
            eprintln!("Could not open browser automatically: {}", e);
            eprintln!("Please open the URL manually.");
        }

        let (tx, rx) = oneshot::channel::<String>();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));

        let tx_clone = tx.clone();
        let callback_handler = move |Query(params): Query<HashMap<String, String>>| async move {
            if let Some(code) = params.get("code") {
                let sender = tx_clone.lock().ok().and_then(|mut slot| slot.take());
                if let Some(tx) = sender {
                    let _ = tx.send(code.clone());
                }
                Html("<html><body><h1>Authentication successful!</h1><p>You can close this window.</p></body></html>")
            } else {
                Html("<html><body><h1>Authentication failed</h1><p>No authorization code received.</p></body></html>")
            }
        };

        let app = Router::new().route("/oauth2callback", get(callback_handler));

        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], self.config.oauth_callback_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        eprintln!(
            "Waiting for authentication callback on port {}...",
            self.config.oauth_callback_port
        );

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    return Err(GdriveMcpError::Auth(AuthError::CallbackError {
                        message: e.to_string(),
                    }));
                }
            }
            code = rx => {
                match code {
                    Ok(code) => {
                        eprintln!("Received authorization code, exchanging for tokens...");
                        self.exchange_code(&code).await?;
                    }
                    Err(_) => {
                        return Err(GdriveMcpError::Auth(AuthError::NoAuthCode));
                    }
                }
            }
        }

        Ok(())
    }
}
