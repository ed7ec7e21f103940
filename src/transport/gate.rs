//! Shared-secret access gate
//!
//! When an API key is configured every request must present it in the
//! `x-api-key` header or the `api_key` query parameter.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying the API key
pub const API_KEY_QUERY: &str = "api_key";

#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    api_key: Option<Arc<str>>,
}

impl AccessGate {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }

    /// Whether requests pass without a key
    pub fn is_open(&self) -> bool {
        self.api_key.is_none()
    }

    /// Check the key carried by a request
    pub fn admits(&self, headers: &HeaderMap, uri: &Uri) -> bool {
        let Some(expected) = self.api_key.as_deref() else {
            return true;
        };

        let from_header = headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let provided = from_header.or_else(|| {
            Query::<HashMap<String, String>>::try_from_uri(uri)
                .ok()
                .and_then(|Query(mut params)| params.remove(API_KEY_QUERY))
        });

        provided.as_deref() == Some(expected)
    }
}

/// Middleware rejecting requests without the configured key
pub async fn require_api_key(
    State(gate): State<AccessGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if gate.admits(request.headers(), request.uri()) {
        return next.run(request).await;
    }

    warn!(
        http.method = %request.method(),
        http.path = %request.uri().path(),
        "Rejected request with invalid API key"
    );
    unauthorized()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unauthorized: Invalid API key" })),
    )
        .into_response()
}
