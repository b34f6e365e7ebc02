use super::*;
use crate::routes::app;
use crate::state::test_helpers;
use axum::body::Body;
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Method, Request};
use futures::StreamExt;
use tokio::time::timeout;
use tower::ServiceExt;

async fn send(state: &AppState, request: Request<Body>) -> Response {
    app(state.clone()).oneshot(request).await.expect("router is infallible")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_form(body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/send")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect()
}

/// Read streamed chunks until `needle` shows up.
async fn read_until(stream: &mut axum::body::BodyDataStream, seen: &mut String, needle: &str) {
    timeout(std::time::Duration::from_secs(5), async {
        while !seen.contains(needle) {
            let chunk = stream.next().await.expect("stream ended early").expect("body error");
            seen.push_str(&String::from_utf8_lossy(&chunk));
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?} in {seen:?}"));
}

async fn wait_for_subscribers(state: &AppState, count: usize) {
    timeout(std::time::Duration::from_secs(5), async {
        while state.chat.subscriber_count() != count {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("expected {count} subscribers"));
}

#[tokio::test]
async fn healthz_is_ok() {
    let state = test_helpers::test_app_state();
    let response = send(&state, get("/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_page_prefills_username_cookie() {
    let state = test_helpers::test_app_state();
    let request = Request::builder()
        .uri("/")
        .header(COOKIE, "chat_username=carol")
        .body(Body::empty())
        .unwrap();
    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("value=\"carol\""));
    assert!(html.contains("src=\"/messages\""));
}

#[tokio::test]
async fn get_send_redirects_home() {
    let state = test_helpers::test_app_state();
    let response = send(&state, get("/send")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/");
}

#[tokio::test]
async fn empty_submission_redirects_without_storing() {
    let state = test_helpers::test_app_state();
    for body in ["username=alice&text=", "username=&text=hi", "text=hi", "username=+&text=+"] {
        let response = send(&state, post_form(body, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "body {body}");
        assert_eq!(response.headers()[LOCATION], "/");
        assert!(set_cookies(&response).is_empty());
    }
    assert_eq!(state.chat.message_count(), 0);
}

#[tokio::test]
async fn submission_stores_message_and_sets_cookies() {
    let state = test_helpers::test_app_state();
    let response = send(&state, post_form("username=alice&text=hello+there", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("chat_session=") && c.contains("HttpOnly")));
    assert!(cookies.iter().any(|c| c.starts_with("chat_username=alice")));

    let snapshot = state.chat.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].text, "hello there");
    assert!(snapshot[0].author.key.starts_with("alice:"));
}

#[tokio::test]
async fn existing_session_cookie_is_reused() {
    let state = test_helpers::test_app_state();
    let response = send(&state, post_form("username=bob&text=hi", Some("chat_session=abc123"))).await;

    assert!(!set_cookies(&response).iter().any(|c| c.starts_with("chat_session=")));
    assert_eq!(state.chat.snapshot()[0].author.key, "bob:abc123");
}

#[tokio::test]
async fn messages_fall_back_to_static_when_streaming_disabled() {
    let state = test_helpers::test_app_state_without_streaming();
    state.chat.submit("alice", "s", "archived").unwrap();

    let response = send(&state, get("/messages")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("archived"));
    assert!(html.trim_end().ends_with("</html>"));
    assert_eq!(state.chat.subscriber_count(), 0);
}

#[tokio::test]
async fn events_unavailable_when_streaming_disabled() {
    let state = test_helpers::test_app_state_without_streaming();
    let response = send(&state, get("/events")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn message_stream_delivers_snapshot_live_and_trailer() {
    let state = test_helpers::test_app_state();
    state.chat.submit("alice", "s", "before").unwrap();

    let response = send(&state, get("/messages")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");
    assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");

    let mut stream = response.into_body().into_data_stream();
    let mut seen = String::new();
    read_until(&mut stream, &mut seen, "before").await;
    assert!(seen.starts_with("<!DOCTYPE html>"));

    wait_for_subscribers(&state, 1).await;
    send(&state, post_form("username=bob&text=after", None)).await;
    read_until(&mut stream, &mut seen, "after").await;

    state.shutdown.cancel();
    read_until(&mut stream, &mut seen, "</html>").await;
    assert!(stream.next().await.is_none(), "body should end after the trailer");
    wait_for_subscribers(&state, 0).await;
}

#[tokio::test]
async fn dropping_the_response_unregisters_the_subscriber() {
    let state = test_helpers::test_app_state();
    let response = send(&state, get("/messages")).await;
    wait_for_subscribers(&state, 1).await;

    drop(response);
    wait_for_subscribers(&state, 0).await;
}

#[tokio::test]
async fn event_stream_uses_sse_framing() {
    let state = test_helpers::test_app_state();
    let response = send(&state, get("/events")).await;
    assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");

    let mut stream = response.into_body().into_data_stream();
    let mut seen = String::new();
    read_until(&mut stream, &mut seen, "retry:").await;

    wait_for_subscribers(&state, 1).await;
    state.chat.submit("dave", "s", "over sse").unwrap();
    read_until(&mut stream, &mut seen, "over sse").await;
    assert!(seen.contains("data: <div class=\"message\""));
}

#[tokio::test]
async fn api_messages_returns_snapshot_json() {
    let state = test_helpers::test_app_state();
    let msg = state.chat.submit("erin", "s", "<json>").unwrap();

    let response = send(&state, get("/api/messages")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    let first = &body[0];
    assert_eq!(first["id"], msg.id.get());
    assert_eq!(first["name"], "erin");
    assert_eq!(first["text"], "<json>");
    assert_eq!(first["color"], msg.author.color);
    assert_eq!(first["tag"], msg.author.tag.as_str());
}

#[tokio::test]
async fn stats_report_counts() {
    let state = test_helpers::test_app_state();
    state.chat.submit("a", "s1", "x").unwrap();
    state.chat.submit("b", "s2", "y").unwrap();
    let (_sub, _rx) = state.chat.subscribe();

    let response = send(&state, get("/api/stats")).await;
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["messages"], 2);
    assert_eq!(body["subscribers"], 1);
    assert_eq!(body["authors"], 2);
}

#[test]
fn stream_errors_map_to_statuses() {
    assert_eq!(stream_error_to_status(&StreamError::Disabled), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(stream_error_to_status(&StreamError::Unsupported), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(stream_error_to_status(&StreamError::Disconnected), StatusCode::BAD_GATEWAY);
}
