//! MCP SSE (Server-Sent Events) transport
//!
//! `GET /sse` opens a session and streams JSON-RPC responses back to the client.
//! Clients POST requests to `/message` (or the legacy `POST /sse`), addressed
//! to their session.
//!
//! Each session has one worker task that drains its inbound queue in order and
//! pushes responses onto the session's outbound stream.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::HeaderName, HeaderMap, StatusCode, Uri},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::error::{GdriveMcpError, McpError, SessionError};
use crate::mcp::server::McpServer;
use crate::mcp::types::{JsonRpcError, JsonRpcResponse, RequestId};
use crate::transport::registry::{SessionId, SharedSessionRegistry};
use crate::transport::router::RequestRouter;

/// Response header carrying the session id
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Path clients POST messages to
pub const MESSAGE_PATH: &str = "/message";

/// Keep-alive comment interval
const KEEP_ALIVE_SECS: u64 = 15;

/// Buffered responses per session
const OUTBOUND_CAPACITY: usize = 64;

/// Shared state of the HTTP front
#[derive(Clone)]
pub struct AppState {
    pub server: Arc<McpServer>,
    pub sessions: SharedSessionRegistry,
    pub router: RequestRouter,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        server: Arc<McpServer>,
        sessions: SharedSessionRegistry,
        request_timeout: Duration,
    ) -> Self {
        Self {
            server,
            router: RequestRouter::new(sessions.clone()),
            sessions,
            request_timeout,
        }
    }
}

/// Stream wrapper that removes the session when dropped
///
/// The SSE body is dropped when the client disconnects or the connection
/// fails, which closes the session queue and ends its worker.
struct CleanupStream<S> {
    inner: S,
    sessions: SharedSessionRegistry,
    session_id: SessionId,
}

impl<S> CleanupStream<S> {
    fn new(inner: S, sessions: SharedSessionRegistry, session_id: SessionId) -> Self {
        Self {
            inner,
            sessions,
            session_id,
        }
    }
}

impl<S: Stream + Unpin> Stream for CleanupStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for CleanupStream<S> {
    fn drop(&mut self) {
        info!(session_id = %self.session_id, "SSE session closed");
        self.sessions.remove(&self.session_id);
    }
}

/// GET /sse
///
/// Opens a session. The first event is `endpoint`, whose data is the path to
/// POST messages to; JSON-RPC responses follow as `message` events.
pub async fn sse_handler(State(state): State<AppState>) -> Result<Response, SessionError> {
    let (session_id, inbound) = state.sessions.open().map_err(|e| {
        warn!(error = %e, "Refused SSE session");
        e
    })?;

    info!(
        session_id = %session_id,
        open_sessions = state.sessions.len(),
        "SSE session opened"
    );

    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    tokio::spawn(run_session(
        state.server.clone(),
        state.sessions.clone(),
        session_id.clone(),
        inbound,
        outbound_tx,
        state.request_timeout,
    ));

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{}?sessionId={}", MESSAGE_PATH, session_id));

    let events = tokio_stream::once(endpoint)
        .chain(ReceiverStream::new(outbound_rx))
        .map(Ok::<_, Infallible>);

    let header_value = session_id.to_string();
    let stream = CleanupStream::new(events, state.sessions.clone(), session_id);
    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS)),
    );

    let header_name = HeaderName::from_static(SESSION_ID_HEADER);
    Ok(([(header_name, header_value)], sse).into_response())
}

/// Drain one session's inbound queue until it closes. The session is
/// unregistered when the worker stops.
async fn run_session(
    server: Arc<McpServer>,
    sessions: SharedSessionRegistry,
    session_id: SessionId,
    mut inbound: mpsc::Receiver<Value>,
    outbound: mpsc::Sender<Event>,
    request_timeout: Duration,
) {
    while let Some(message) = inbound.recv().await {
        let Some(response) = process(server.clone(), message, request_timeout).await else {
            continue;
        };

        let event = match Event::default().event("message").json_data(&response) {
            Ok(event) => event,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to encode response");
                continue;
            }
        };

        if outbound.send(event).await.is_err() {
            debug!(session_id = %session_id, "SSE stream gone, dropping response");
            break;
        }
    }

    sessions.remove(&session_id);
    debug!(session_id = %session_id, "Session worker finished");
}

/// Run one message through the engine under the processing timeout.
///
/// The engine runs in its own task; a panic fails only this request.
async fn process(
    server: Arc<McpServer>,
    message: Value,
    request_timeout: Duration,
) -> Option<JsonRpcResponse> {
    let request_id = message
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value::<RequestId>(id).ok());

    let task = tokio::spawn(async move { server.handle_message(message).await });
    let abort = task.abort_handle();

    match tokio::time::timeout(request_timeout, task).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!(error = %e, "Request handler failed");
            let failure = JsonRpcError::internal_error("Request handler failed");
            request_id.map(|id| JsonRpcResponse::error(Some(id), failure))
        }
        Err(_) => {
            abort.abort();
            let error = GdriveMcpError::Mcp(McpError::Timeout {
                secs: request_timeout.as_secs(),
            });
            warn!(error = %error, "Request processing timed out");
            request_id.map(|id| JsonRpcResponse::error(Some(id), error.into()))
        }
    }
}

/// POST /message and POST /sse
pub async fn message_handler(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "Rejected non-JSON message body");
            return (StatusCode::BAD_REQUEST, "Invalid JSON body").into_response();
        }
    };

    match state.router.route(&uri, &headers, message) {
        Ok(_) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(e) => {
            debug!(error = %e, "Failed to route message");
            e.into_response()
        }
    }
}

/// GET /health
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "mcp-gdrive" }))
}
