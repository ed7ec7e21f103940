//! Integration tests for the Google Drive MCP Server
//!
//! These tests drive the full HTTP + SSE front in-process with `tower::oneshot`.
//! The Drive API is served by a wiremock server - no real API calls are made.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request as MockRequest, Respond, ResponseTemplate};

use gdrive_mcp_server_rust::config::{Config, ServerConfig};
use gdrive_mcp_server_rust::transport::Application;

/// Helper to create a JSON-RPC request
fn make_request(id: i64, method: &str, params: Option<Value>) -> Value {
    let mut request = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if let Some(p) = params {
        request["params"] = p;
    }
    request
}

/// A running application over a temporary config dir
struct TestApp {
    app: Application,
    api_key: Option<String>,
    _dir: TempDir,
}

async fn spawn_app(drive_base: &str, api_key: Option<&str>, with_credentials: bool) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::with_dir(dir.path());
    config.drive_api_base = drive_base.to_string();
    config.sheets_api_base = drive_base.to_string();

    if with_credentials {
        std::fs::write(
            &config.credentials_path,
            json!({"access_token": "test-token", "refresh_token": null}).to_string(),
        )
        .unwrap();
    }

    let server_config = ServerConfig {
        api_key: api_key.map(str::to_string),
        ..ServerConfig::default()
    };

    TestApp {
        app: Application::build(config, &server_config).await.unwrap(),
        api_key: api_key.map(str::to_string),
        _dir: dir,
    }
}

impl TestApp {
    fn router(&self) -> Router {
        self.app.router.clone()
    }

    fn open_sessions(&self) -> usize {
        self.app.state.sessions.len()
    }

    /// Send a request with exactly the given headers
    async fn send_raw(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Body,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.router()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    /// The configured key as a header, if any
    fn key_header(&self) -> Vec<(&str, &str)> {
        self.api_key
            .as_deref()
            .map(|key| vec![("x-api-key", key)])
            .unwrap_or_default()
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        self.send_raw("GET", uri, &self.key_header(), Body::empty())
            .await
    }

    async fn post_raw(&self, uri: &str, headers: &[(&str, &str)], body: Value) -> StatusCode {
        let mut headers = headers.to_vec();
        headers.push(("content-type", "application/json"));
        self.send_raw("POST", uri, &headers, Body::from(body.to_string()))
            .await
            .status()
    }

    async fn post(&self, uri: &str, body: Value) -> StatusCode {
        self.post_raw(uri, &self.key_header(), body).await
    }

    /// Open an SSE session and consume its `endpoint` event
    async fn connect(&self) -> (SseReader, String) {
        let response = self.get("/sse").await;
        assert_eq!(response.status(), StatusCode::OK);

        let session_id = response
            .headers()
            .get("mcp-session-id")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let mut reader = SseReader::new(response.into_body());
        let (event, data) = reader.next_event().await;
        assert_eq!(event, "endpoint");
        assert_eq!(data, format!("/message?sessionId={}", session_id));

        (reader, data)
    }
}

/// Minimal SSE frame parser over a response body
struct SseReader {
    body: Body,
    buffer: String,
}

impl SseReader {
    fn new(body: Body) -> Self {
        Self {
            body,
            buffer: String::new(),
        }
    }

    /// Next `(event, data)` pair, skipping keep-alive comments
    async fn next_event(&mut self) -> (String, String) {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                let mut event = "message".to_string();
                let mut data = Vec::new();
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        event = value.trim().to_string();
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
                    }
                }
                if data.is_empty() {
                    continue;
                }
                return (event, data.join("\n"));
            }

            let frame = tokio::time::timeout(Duration::from_secs(5), self.body.frame())
                .await
                .expect("timed out waiting for SSE event")
                .expect("SSE stream ended")
                .expect("SSE frame error");
            if let Ok(bytes) = frame.into_data() {
                self.buffer.push_str(std::str::from_utf8(&bytes).unwrap());
            }
        }
    }

    /// Next `message` event parsed as a JSON-RPC response
    async fn next_message(&mut self) -> Value {
        let (event, data) = self.next_event().await;
        assert_eq!(event, "message");
        serde_json::from_str(&data).unwrap()
    }
}

/// Serves 15 files, sliced by `pageSize` and an offset `pageToken`
struct PagedFiles {
    total: usize,
}

impl Respond for PagedFiles {
    fn respond(&self, request: &MockRequest) -> ResponseTemplate {
        let mut page_size = 100;
        let mut offset = 0;
        for (key, value) in request.url.query_pairs() {
            match key.as_ref() {
                "pageSize" => page_size = value.parse().unwrap_or(100),
                "pageToken" => offset = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        let end = (offset + page_size).min(self.total);
        let files: Vec<Value> = (offset..end)
            .map(|i| {
                json!({
                    "id": format!("file-{}", i),
                    "name": format!("File {}", i),
                    "mimeType": "text/plain"
                })
            })
            .collect();

        let mut body = json!({ "files": files });
        if end < self.total {
            body["nextPageToken"] = json!(end.to_string());
        }
        ResponseTemplate::new(200).set_body_json(body)
    }
}

mod sse_round_trip_tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let response = app.get("/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"status": "ok", "service": "mcp-gdrive"}));
    }

    #[tokio::test]
    async fn test_list_tools_over_sse() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let (mut reader, endpoint) = app.connect().await;

        let status = app.post(&endpoint, make_request(1, "tools/list", None)).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let response = reader.next_message().await;
        assert_eq!(response["id"], 1);
        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "gdrive_search",
                "gdrive_read_file",
                "gsheets_read",
                "gsheets_update_cell"
            ]
        );
    }

    #[tokio::test]
    async fn test_legacy_post_sse_alias() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let (mut reader, endpoint) = app.connect().await;
        let session_id = endpoint.trim_start_matches("/message?sessionId=");

        let mut request = make_request(7, "ping", None);
        request["sessionId"] = json!(session_id);
        assert_eq!(app.post("/sse", request).await, StatusCode::ACCEPTED);

        let response = reader.next_message().await;
        assert_eq!(response["id"], 7);
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn test_responses_keep_arrival_order() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let (mut reader, endpoint) = app.connect().await;

        for id in 1..=5 {
            let status = app.post(&endpoint, make_request(id, "ping", None)).await;
            assert_eq!(status, StatusCode::ACCEPTED);
        }
        for id in 1..=5 {
            assert_eq!(reader.next_message().await["id"], id);
        }
    }

    #[tokio::test]
    async fn test_notification_produces_no_event() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let (mut reader, endpoint) = app.connect().await;

        let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert_eq!(app.post(&endpoint, notification).await, StatusCode::ACCEPTED);
        assert_eq!(
            app.post(&endpoint, make_request(2, "ping", None)).await,
            StatusCode::ACCEPTED
        );

        assert_eq!(reader.next_message().await["id"], 2);
    }

    #[tokio::test]
    async fn test_tool_call_without_credentials_is_rpc_error() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let (mut reader, endpoint) = app.connect().await;

        let request = make_request(
            3,
            "tools/call",
            Some(json!({"name": "gdrive_search", "arguments": {"query": "x"}})),
        );
        assert_eq!(app.post(&endpoint, request).await, StatusCode::ACCEPTED);

        let response = reader.next_message().await;
        assert_eq!(response["id"], 3);
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Credentials not found"));
    }
}

mod routing_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_session_id() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let status = app.post("/message", make_request(1, "ping", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_session_id() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let status = app
            .post("/message?sessionId=does-not-exist", make_request(1, "ping", None))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_json_body() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let (_reader, endpoint) = app.connect().await;

        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(&endpoint)
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_closed_session_returns_not_found() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let (_keep, _) = app.connect().await;
        let (reader, endpoint) = app.connect().await;
        assert_eq!(app.open_sessions(), 2);

        drop(reader);
        assert_eq!(app.open_sessions(), 1);

        let status = app.post(&endpoint, make_request(1, "ping", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_closed_session_by_header_returns_not_found() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let (reader, endpoint) = app.connect().await;
        let session_id = endpoint.trim_start_matches("/message?sessionId=").to_string();

        drop(reader);
        assert_eq!(app.open_sessions(), 0);

        let status = app
            .post_raw(
                "/message",
                &[("x-session-id", session_id.as_str())],
                make_request(1, "ping", None),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unread_session_sheds_load_instead_of_hanging() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;

        // The SSE body is held but never read, so responses back up
        let response = app.get("/sse").await;
        assert_eq!(response.status(), StatusCode::OK);
        let session_id = response
            .headers()
            .get("mcp-session-id")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let endpoint = format!("/message?sessionId={}", session_id);

        let mut backlogged = 0;
        for id in 0..200 {
            let status = tokio::time::timeout(
                Duration::from_secs(3),
                app.post(&endpoint, make_request(id, "ping", None)),
            )
            .await
            .unwrap_or_else(|_| panic!("POST #{} did not complete", id));

            match status {
                StatusCode::ACCEPTED => {}
                StatusCode::SERVICE_UNAVAILABLE => backlogged += 1,
                other => panic!("unexpected status {} for POST #{}", other, id),
            }
        }

        assert!(backlogged > 0);
        assert_eq!(app.open_sessions(), 1);
        drop(response);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let app = spawn_app("http://127.0.0.1:9", None, false).await;
        let (mut first, first_endpoint) = app.connect().await;
        let (mut second, second_endpoint) = app.connect().await;
        assert_ne!(first_endpoint, second_endpoint);

        app.post(&second_endpoint, make_request(20, "ping", None)).await;
        app.post(&first_endpoint, make_request(10, "ping", None)).await;

        assert_eq!(first.next_message().await["id"], 10);
        assert_eq!(second.next_message().await["id"], 20);
    }
}

mod resource_tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_pages_ten_then_five() {
        let drive = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(PagedFiles { total: 15 })
            .mount(&drive)
            .await;

        let app = spawn_app(&drive.uri(), None, false).await;
        let (mut reader, endpoint) = app.connect().await;

        app.post(&endpoint, make_request(1, "resources/list", None)).await;
        let first = reader.next_message().await;
        let resources = first["result"]["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 10);
        assert_eq!(resources[0]["uri"], "gdrive:///file-0");
        assert_eq!(resources[0]["mimeType"], "text/plain");
        let cursor = first["result"]["nextCursor"].as_str().unwrap().to_string();

        app.post(
            &endpoint,
            make_request(2, "resources/list", Some(json!({ "cursor": cursor }))),
        )
        .await;
        let second = reader.next_message().await;
        let resources = second["result"]["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 5);
        assert_eq!(resources[4]["uri"], "gdrive:///file-14");
        assert!(second["result"].get("nextCursor").is_none());
    }

    #[tokio::test]
    async fn test_read_resource_returns_raw_text() {
        let drive = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/abc"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Notes\n\nhello"))
            .mount(&drive)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/abc"))
            .and(query_param("fields", "id, name, mimeType, modifiedTime, size"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "abc",
                "name": "notes.md",
                "mimeType": "text/markdown"
            })))
            .mount(&drive)
            .await;

        let app = spawn_app(&drive.uri(), None, true).await;
        let (mut reader, endpoint) = app.connect().await;

        app.post(
            &endpoint,
            make_request(4, "resources/read", Some(json!({"uri": "gdrive:///abc"}))),
        )
        .await;

        let response = reader.next_message().await;
        let contents = response["result"]["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["uri"], "gdrive:///abc");
        assert_eq!(contents[0]["mimeType"], "text/markdown");
        assert_eq!(contents[0]["text"], "# Notes\n\nhello");
    }
}

mod gate_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_requires_key() {
        let app = spawn_app("http://127.0.0.1:9", Some("K"), false).await;
        let response = app.send_raw("GET", "/health", &[], Body::empty()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .send_raw("GET", "/health?api_key=K", &[], Body::empty())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sse_requires_key() {
        let app = spawn_app("http://127.0.0.1:9", Some("K"), false).await;
        let response = app.send_raw("GET", "/sse", &[], Body::empty()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.open_sessions(), 0);

        let response = app
            .send_raw("GET", "/sse", &[("x-api-key", "K")], Body::empty())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_message_rejected_before_routing() {
        let app = spawn_app("http://127.0.0.1:9", Some("K"), false).await;
        let status = app
            .post_raw("/message?sessionId=anything", &[], make_request(1, "ping", None))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_key_never_reaches_live_session() {
        let app = spawn_app("http://127.0.0.1:9", Some("K"), false).await;
        let (mut reader, endpoint) = app.connect().await;

        let status = app
            .post_raw(&endpoint, &[("x-api-key", "wrong")], make_request(1, "ping", None))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // The next event on the stream answers the authorized request
        let status = app.post(&endpoint, make_request(2, "ping", None)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(reader.next_message().await["id"], 2);
    }

    #[tokio::test]
    async fn test_resources_list_with_key() {
        let drive = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(PagedFiles { total: 3 })
            .mount(&drive)
            .await;

        let app = spawn_app(&drive.uri(), Some("K"), false).await;
        let (mut reader, endpoint) = app.connect().await;

        let status = app
            .post(&endpoint, make_request(5, "resources/list", None))
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let response = reader.next_message().await;
        assert_eq!(response["id"], 5);
        let resources = response["result"]["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 3);
        assert_eq!(resources[2]["uri"], "gdrive:///file-2");
    }
}
