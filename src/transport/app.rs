//! HTTP application assembly and serving

use std::future::Future;
use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use crate::config::{Config, ServerConfig};
use crate::error::Result;
use crate::gdrive::auth::Authenticator;
use crate::gdrive::client::DriveClient;
use crate::mcp::server::McpServer;
use crate::mcp::tools::drive_tools;
use crate::transport::gate::{require_api_key, AccessGate};
use crate::transport::registry::SessionRegistry;
use crate::transport::sse::{health_handler, message_handler, sse_handler, AppState};

/// Fully wired server: router, shared state and the credential provider
pub struct Application {
    pub router: Router,
    pub state: AppState,
    pub authenticator: Arc<Authenticator>,
}

impl Application {
    /// Wire credentials, Drive client, tools, engine and HTTP front together
    pub async fn build(config: Config, server_config: &ServerConfig) -> Result<Self> {
        let authenticator = Arc::new(Authenticator::new(config.clone()).await?);
        let drive = Arc::new(DriveClient::new(authenticator.clone(), &config));
        let tools = drive_tools(drive.clone())?;

        let server = Arc::new(McpServer::new(
            drive,
            authenticator.clone(),
            tools,
            server_config.page_size,
        ));
        let sessions = Arc::new(SessionRegistry::new(server_config.max_sessions));
        let state = AppState::new(server, sessions, server_config.request_timeout);

        let gate = AccessGate::new(server_config.api_key.clone());
        let router = build_router(
            state.clone(),
            gate,
            server_config.cors_origins.as_deref(),
        );

        Ok(Self {
            router,
            state,
            authenticator,
        })
    }
}

/// CORS layer for the configured origins (`None` = any)
pub fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

/// Build the router. The gate runs inside CORS so preflights are answered
/// without a key.
pub fn build_router(state: AppState, gate: AccessGate, cors_origins: Option<&[String]>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/sse", get(sse_handler).post(message_handler))
        .route("/message", post(message_handler))
        .with_state(state)
        .layer(middleware::from_fn_with_state(gate, require_api_key))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(cors_layer(cors_origins))
}

/// Serve until `shutdown` resolves.
///
/// Open SSE streams keep connections alive, so the registry is cleared once
/// shutdown begins; that ends every session stream and lets the server drain.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    app: Router,
    state: &AppState,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sessions = state.sessions.clone();
    let addr = listener.local_addr()?;
    info!(%addr, "MCP SSE server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!(open_sessions = sessions.len(), "Closing SSE sessions");
            sessions.clear();
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
