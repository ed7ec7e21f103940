//! Routing of POSTed messages to their session
//!
//! Clients carry the session id in different places. The carriers are tried in
//! table order and the first non-empty value wins.

use std::collections::HashMap;

use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::debug;

use crate::error::SessionError;
use crate::transport::registry::{SessionId, SharedSessionRegistry};

/// Where a session id may be carried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIdSource {
    Query(&'static str),
    Header(&'static str),
    Body(&'static str),
}

/// Session id carriers in precedence order
pub const SESSION_ID_SOURCES: &[SessionIdSource] = &[
    SessionIdSource::Query("sessionId"),
    SessionIdSource::Header("x-session-id"),
    SessionIdSource::Header("x-sse-session-id"),
    SessionIdSource::Header("x-mcp-session-id"),
    SessionIdSource::Header("x-client-session-id"),
    SessionIdSource::Body("sessionId"),
];

impl SessionIdSource {
    fn extract(&self, uri: &Uri, headers: &HeaderMap, body: &Value) -> Option<String> {
        let found = match *self {
            SessionIdSource::Query(name) => Query::<HashMap<String, String>>::try_from_uri(uri)
                .ok()
                .and_then(|Query(mut params)| params.remove(name)),
            SessionIdSource::Header(name) => headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            SessionIdSource::Body(field) => body
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string),
        };
        found.filter(|id| !id.is_empty())
    }
}

/// First non-empty session id across all carriers
pub fn extract_session_id(uri: &Uri, headers: &HeaderMap, body: &Value) -> Option<String> {
    SESSION_ID_SOURCES
        .iter()
        .find_map(|source| source.extract(uri, headers, body))
}

/// Hands inbound messages to the session that owns them
#[derive(Clone)]
pub struct RequestRouter {
    sessions: SharedSessionRegistry,
}

impl RequestRouter {
    pub fn new(sessions: SharedSessionRegistry) -> Self {
        Self { sessions }
    }

    /// Queue `body` on its session. The payload is never inspected beyond the
    /// session id carrier.
    pub fn route(
        &self,
        uri: &Uri,
        headers: &HeaderMap,
        body: Value,
    ) -> Result<SessionId, SessionError> {
        let session_id =
            extract_session_id(uri, headers, &body).ok_or(SessionError::MissingSessionId)?;

        let handle = self
            .sessions
            .lookup(&session_id)
            .ok_or(SessionError::SessionNotFound { session_id })?;

        handle.deliver(body)?;
        debug!(session_id = %handle.id, "Routed message to session");
        Ok(handle.id)
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match self {
            SessionError::MissingSessionId => StatusCode::BAD_REQUEST,
            SessionError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            SessionError::CapacityExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            SessionError::Backlogged { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::DuplicateSession { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use serde_json::json;

    use crate::transport::registry::SessionRegistry;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_query_wins_over_header_and_body() {
        let uri: Uri = "/message?sessionId=q".parse().unwrap();
        let h = headers(&[("x-session-id", "h")]);
        let body = json!({"sessionId": "b"});

        assert_eq!(extract_session_id(&uri, &h, &body).as_deref(), Some("q"));
    }

    #[test]
    fn test_header_order() {
        let uri: Uri = "/message".parse().unwrap();
        let h = headers(&[("x-client-session-id", "last"), ("x-sse-session-id", "second")]);

        assert_eq!(
            extract_session_id(&uri, &h, &Value::Null).as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_body_fallback_and_empty_values_skipped() {
        let uri: Uri = "/message?sessionId=".parse().unwrap();
        let h = headers(&[("x-session-id", "")]);
        let body = json!({"sessionId": "b"});

        assert_eq!(extract_session_id(&uri, &h, &body).as_deref(), Some("b"));
    }

    #[test]
    fn test_nothing_found() {
        let uri: Uri = "/message".parse().unwrap();
        let body = json!({"sessionId": 42});
        assert_eq!(extract_session_id(&uri, &HeaderMap::new(), &body), None);
    }

    #[test]
    fn test_route_missing_and_unknown() {
        let router = RequestRouter::new(Arc::new(SessionRegistry::new(4)));

        let uri: Uri = "/message".parse().unwrap();
        let err = router.route(&uri, &HeaderMap::new(), json!({})).unwrap_err();
        assert_eq!(err, SessionError::MissingSessionId);

        let uri: Uri = "/message?sessionId=ghost".parse().unwrap();
        let err = router.route(&uri, &HeaderMap::new(), json!({})).unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_route_delivers_payload() {
        let registry = Arc::new(SessionRegistry::new(4));
        let (id, mut rx) = registry.open().unwrap();
        let router = RequestRouter::new(registry);

        let uri: Uri = "/message".parse().unwrap();
        let h = headers(&[("x-mcp-session-id", id.as_str())]);
        let routed = router.route(&uri, &h, json!({"method": "ping"})).unwrap();

        assert_eq!(routed, id);
        assert_eq!(rx.recv().await, Some(json!({"method": "ping"})));
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            SessionError::MissingSessionId.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SessionError::SessionNotFound {
                session_id: "x".to_string()
            }
            .into_response()
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            SessionError::CapacityExceeded { limit: 1 }
                .into_response()
                .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            SessionError::Backlogged {
                session_id: "x".to_string()
            }
            .into_response()
            .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
