//! Local stand-ins for the chat-completion provider and the relay.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;

use sark::config::RelayConfig;
use sark::relay::Relay;
use sark::server::{AppState, create_router};

/// Text the fake provider streams back, fragment by fragment.
pub const FRAGMENTS: [&str; 3] = ["\n<!DOCTYPE html>\n<html>", "<body>Bakery</body>", "</html>\n"];

/// The document a client should end up with.
pub const DOCUMENT: &str = "<!DOCTYPE html>\n<html><body>Bakery</body></html>";

/// One request seen by the fake provider.
#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

/// Fake chat-completion provider.
#[derive(Default)]
pub struct FakeProvider {
    pub seen: Mutex<Vec<SeenRequest>>,
    pub failure: Option<(StatusCode, &'static str)>,
}

impl FakeProvider {
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn user_message(&self, index: usize) -> String {
        self.seen()[index].body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

pub fn event_stream_body() -> String {
    let mut body = String::from(": OPENROUTER PROCESSING\n\n");
    body.push_str("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for fragment in FRAGMENTS {
        let frame = serde_json::json!({ "choices": [{ "delta": { "content": fragment } }] });
        body.push_str(&format!("data: {frame}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn complete(
    State(provider): State<Arc<FakeProvider>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let streaming = body["stream"].as_bool().unwrap_or(false);
    provider.seen.lock().unwrap().push(SeenRequest {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    if let Some((status, message)) = provider.failure {
        return (status, message).into_response();
    }

    if streaming {
        ([(header::CONTENT_TYPE, "text/event-stream")], event_stream_body()).into_response()
    } else {
        Json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": FRAGMENTS.concat() } }]
        }))
        .into_response()
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Start a fake provider and return it with its completion URL.
pub async fn spawn_provider(failure: Option<(StatusCode, &'static str)>) -> (Arc<FakeProvider>, String) {
    let provider = Arc::new(FakeProvider {
        seen: Mutex::new(Vec::new()),
        failure,
    });
    let router = Router::new()
        .route("/api/v1/chat/completions", post(complete))
        .with_state(Arc::clone(&provider));
    let addr = spawn(router).await;
    (provider, format!("http://{addr}/api/v1/chat/completions"))
}

/// Relay configuration pointing at `api_url`.
pub fn relay_config(api_url: &str) -> RelayConfig {
    RelayConfig::default()
        .with_api_key("sk-test-key")
        .with_api_url(api_url)
        .with_model("test/html-model")
}

/// Relay router backed by the real HTTPS upstream client.
pub fn relay_router(api_url: &str) -> Router {
    let relay = Relay::from_config(&relay_config(api_url)).unwrap();
    create_router(AppState::new(relay))
}
