use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use superai_client::transition::{CANCELLED_TEXT, STREAM_FAILURE_TEXT};
use superai_client::{ChatClient, ClientConfig, SendOutcome, StreamTicket};
use superai_protocol::{AssistantApp, MessageRole, MessageStatus};

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/api/ai/fitness/chat-stream", get(fitness_stream))
        .route("/api/ai/love/chat-stream", get(|| async { StatusCode::UNAUTHORIZED }))
        .route("/api/ai/manus/chat", post(manus_chunked))
        .route("/api/ai/fitness/chat", post(unary_reply));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

/// Greets "hello", never answers "stall"; otherwise reports which chat id
/// the request carried.
async fn fitness_stream(
    Query(params): Query<HashMap<String, String>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let message = params.get("message").map(String::as_str);
    let frames = match message {
        Some("hello") => vec!["Hi".to_string(), " there!".to_string()],
        Some("stall") => vec![],
        _ => vec![format!(
            "chat={}",
            params.get("chatId").cloned().unwrap_or_default()
        )],
    };
    let tail: stream::BoxStream<'static, Result<Event, Infallible>> = if message == Some("stall") {
        stream::pending().boxed()
    } else {
        stream::empty().boxed()
    };
    Sse::new(
        stream::iter(frames.into_iter().map(|data| Ok(Event::default().data(data)))).chain(tail),
    )
}

async fn manus_chunked(Json(payload): Json<serde_json::Value>) -> Response {
    let message = payload["message"].as_str().unwrap_or_default().to_string();
    let chunks: Vec<Result<String, Infallible>> = vec![
        Ok("data: Plan".to_string()),
        Ok(format!(" for {}\n", message)),
        Ok("data: [DONE]\n".to_string()),
    ];
    Body::from_stream(stream::iter(chunks)).into_response()
}

async fn unary_reply(Json(payload): Json<serde_json::Value>) -> Json<serde_json::Value> {
    let message = payload["message"].as_str().unwrap_or_default();
    if message == "slow" {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    Json(serde_json::json!({ "message": format!("pong: {}", message) }))
}

async fn client() -> ChatClient {
    let config = ClientConfig {
        base_url: spawn_server().await,
        ..ClientConfig::default()
    };
    ChatClient::new(config).unwrap()
}

async fn finish(outcome: SendOutcome) {
    let ticket: StreamTicket = match outcome {
        SendOutcome::Started(ticket) => ticket,
        SendOutcome::Duplicate => panic!("expected a new stream"),
    };
    tokio::time::timeout(Duration::from_secs(5), ticket.wait())
        .await
        .expect("stream did not finish");
}

#[tokio::test]
async fn subscribe_stream_builds_reply_and_recent_entry() {
    let client = client().await;

    finish(client.send_stream("hello", vec![]).await.unwrap()).await;

    let state = client.state().await.unwrap();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[1].content, "Hi there!");
    assert_eq!(state.messages[1].status, MessageStatus::Received);
    assert!(state.chat_id.is_some());
    assert!(client.registry().is_empty());

    let recent = client.recent().await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].title, "hello");
    assert_eq!(recent[0].preview, "Hi there!");
    assert_eq!(recent[0].message_count, 2);
}

#[tokio::test]
async fn follow_up_carries_assigned_chat_id() {
    let client = client().await;

    finish(client.send_stream("hello", vec![]).await.unwrap()).await;
    let chat_id = client.state().await.unwrap().chat_id.unwrap();

    finish(client.send_stream("again", vec![]).await.unwrap()).await;
    let state = client.state().await.unwrap();
    assert_eq!(state.messages[3].content, format!("chat={}", chat_id));
    assert_eq!(client.recent().await.unwrap().len(), 1);
}

#[tokio::test]
async fn chunked_stream_for_manus() {
    let client = client().await;
    client.switch_app(AssistantApp::Manus).await.unwrap();

    finish(client.send_stream("monday", vec![]).await.unwrap()).await;

    let state = client.state().await.unwrap();
    assert_eq!(state.app, AssistantApp::Manus);
    assert_eq!(state.messages[1].content, "Plan for monday");
    assert_eq!(state.messages[1].status, MessageStatus::Received);
}

#[tokio::test]
async fn rejected_stream_shows_failure_text() {
    let client = client().await;
    client.switch_app(AssistantApp::Love).await.unwrap();

    finish(client.send_stream("hello", vec![]).await.unwrap()).await;

    let state = client.state().await.unwrap();
    assert_eq!(state.messages[1].content, STREAM_FAILURE_TEXT);
    assert_eq!(state.messages[1].status, MessageStatus::Error);
    assert!(!state.is_loading);
    assert!(client.recent().await.unwrap().is_empty());
}

#[tokio::test]
async fn unary_ask_returns_reply() {
    let client = client().await;

    let reply = client.ask("  ping ", vec![]).await.unwrap();
    assert_eq!(reply, "pong: ping");

    let state = client.state().await.unwrap();
    assert_eq!(state.messages[1].role, MessageRole::Assistant);
    assert_eq!(state.messages[1].content, "pong: ping");
}

#[tokio::test]
async fn unary_reply_after_reset_is_discarded() {
    let client = client().await;

    let (reply, reset) = tokio::join!(client.ask("slow", vec![]), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.reset().await
    });
    assert_eq!(reply.unwrap(), "pong: slow");
    reset.unwrap();

    let state = client.state().await.unwrap();
    assert!(state.messages.is_empty());
    assert!(state.chat_id.is_none());
    assert!(!state.is_loading);
    assert!(client.recent().await.unwrap().is_empty());
}

#[tokio::test]
async fn disconnected_stream_leaves_session_usable() {
    let client = client().await;

    let stalled = client.send_stream("stall", vec![]).await.unwrap();
    client.disconnect_all();
    finish(stalled).await;

    let state = client.state().await.unwrap();
    assert!(!state.is_loading);
    assert_eq!(state.messages[1].status, MessageStatus::Received);
    assert_eq!(state.messages[1].content, CANCELLED_TEXT);
    assert!(client.registry().is_empty());

    finish(client.send_stream("hello", vec![]).await.unwrap()).await;
    let state = client.state().await.unwrap();
    assert_eq!(state.messages.len(), 4);
    assert_eq!(state.messages[3].content, "Hi there!");
}
