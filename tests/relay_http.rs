//! Relay behaviour against a local provider over real HTTP.

mod common;

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use futures::{StreamExt, stream};
use tower::ServiceExt;

use sark::relay::{REVISION_MARKER, Relay, SYSTEM_PROMPT};
use sark::server::{AppState, create_router};

use common::{event_stream_body, relay_config, relay_router, spawn, spawn_provider};

fn generate(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn relays_stream_untouched_with_fixed_parameters() {
    let (provider, api_url) = spawn_provider(None).await;

    let response = relay_router(&api_url)
        .oneshot(generate(r#"{"prompt":"Create a landing page for a bakery"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), event_stream_body());

    let seen = provider.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer sk-test-key"));
    let body = &seen[0].body;
    assert_eq!(body["model"], "test/html-model");
    assert_eq!(body["stream"], true);
    assert_eq!(body["max_tokens"], 16_384);
    assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    assert_eq!(
        body["messages"],
        serde_json::json!([
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": "Create a landing page for a bakery" }
        ])
    );
}

#[tokio::test]
async fn appends_current_html_after_marker() {
    let (provider, api_url) = spawn_provider(None).await;
    let html = "<!DOCTYPE html>\n<html><body>\"v1\" & more</body></html>";
    let request = serde_json::json!({ "prompt": "Add a footer", "currentHtml": html });

    let response = relay_router(&api_url)
        .oneshot(generate(&request.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        provider.user_message(0),
        format!("Add a footer\n\n{REVISION_MARKER}\n{html}")
    );
}

#[tokio::test]
async fn blank_prompt_never_reaches_provider() {
    let (provider, api_url) = spawn_provider(None).await;

    for body in [r#"{"prompt":""}"#, r#"{"prompt":"   "}"#, r#"{}"#] {
        let response = relay_router(&api_url).oneshot(generate(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert!(provider.seen().is_empty());
}

#[tokio::test]
async fn forwards_provider_status_and_message() {
    let (provider, api_url) =
        spawn_provider(Some((StatusCode::TOO_MANY_REQUESTS, "rate limited, slow down"))).await;

    let response = relay_router(&api_url)
        .oneshot(generate(r#"{"prompt":"a gallery"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"], "API request failed: rate limited, slow down");
    assert_eq!(provider.seen().len(), 1, "no retry");
}

#[tokio::test]
async fn unreachable_provider_is_bad_gateway() {
    // Bind then drop a listener so the port is closed.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let response = relay_router(&format!("http://{addr}/v1/chat/completions"))
        .oneshot(generate(r#"{"prompt":"a gallery"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

/// Provider that keeps sending frames at a steady pace.
async fn trickle() -> Response {
    let frames = (0..4).map(|i| {
        let frame = serde_json::json!({ "choices": [{ "delta": { "content": format!("<p>{i}</p>") } }] });
        format!("data: {frame}\n\n")
    });
    let body = stream::iter(frames).then(|frame| async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        Ok::<_, Infallible>(frame)
    });
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from_stream(body))
        .unwrap()
}

#[tokio::test]
async fn long_stream_outlives_idle_timeout() {
    let addr = spawn(Router::new().route("/api/v1/chat/completions", post(trickle))).await;
    let config = relay_config(&format!("http://{addr}/api/v1/chat/completions"))
        .with_read_timeout(Duration::from_secs(1));
    let router = create_router(AppState::new(Relay::from_config(&config).unwrap()));

    let response = router.oneshot(generate(r#"{"prompt":"a slow page"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Four frames 400 ms apart: 1.6 s in total, each gap under the 1 s idle limit.
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(body.matches("data: ").count(), 4);
    assert!(body.contains("<p>3</p>"));
}
