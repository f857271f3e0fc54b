#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, unreachable_pub)]
mod common;

use common::TestApp;
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

#[tokio::test]
#[ignore = "requires Postgres and Redis"]
async fn test_message_reaches_receiver_and_other_sender_sockets() {
    let app = TestApp::spawn().await;
    let alice = app.register_user(&common::generate_name("alice")).await;
    let bob = app.register_user(&common::generate_name("bob")).await;

    let mut alice_phone = app.connect_ws(&alice.token).await;
    let mut alice_laptop = app.connect_ws(&alice.token).await;
    let mut bob_ws = app.connect_ws(&bob.token).await;

    let resp = app
        .client
        .post(format!("{}/messages", app.server_url))
        .bearer_auth(&alice.token)
        .header("X-Socket-ID", &alice_phone.socket_id)
        .json(&json!({"receiver_id": bob.user_id, "body": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    let event = bob_ws.receive_event_timeout(Duration::from_secs(5)).await.expect("receiver event");
    assert_eq!(event["event"], "message.created");
    assert_eq!(event["data"]["message"]["body"], "ping");

    let mirror = alice_laptop.receive_event_timeout(Duration::from_secs(5)).await.expect("mirrored event");
    assert_eq!(mirror["event"], "message.created");

    assert!(
        alice_phone.receive_event_timeout(Duration::from_millis(500)).await.is_none(),
        "originating socket must not receive its own write"
    );
}

#[tokio::test]
#[ignore = "requires Postgres and Redis"]
async fn test_fetch_emits_read_receipts_to_sender() {
    let app = TestApp::spawn().await;
    let alice = app.register_user(&common::generate_name("alice")).await;
    let bob = app.register_user(&common::generate_name("bob")).await;

    let mut alice_ws = app.connect_ws(&alice.token).await;
    let sent = app.send_message(&alice.token, bob.user_id, "did you see this").await;

    let mirror = alice_ws.receive_event_timeout(Duration::from_secs(5)).await.expect("mirrored send");
    assert_eq!(mirror["event"], "message.created");

    let (status, _) = app.get_json(&bob.token, &format!("/conversations/{}/messages", alice.user_id)).await;
    assert_eq!(status, reqwest::StatusCode::OK);

    let receipt = alice_ws.receive_event_timeout(Duration::from_secs(5)).await.expect("read receipt");
    assert_eq!(receipt["event"], "message.read");
    assert_eq!(receipt["data"]["message_id"], sent["id"]);
    assert_eq!(receipt["data"]["original_sender_id"], alice.user_id);
    assert_eq!(receipt["data"]["status"], "read");

    // A second fetch finds nothing left to transition
    app.get_json(&bob.token, &format!("/conversations/{}/messages", alice.user_id)).await;
    assert!(alice_ws.receive_event_timeout(Duration::from_millis(500)).await.is_none());
}

#[tokio::test]
#[ignore = "requires Postgres and Redis"]
async fn test_invalid_token_is_rejected() {
    let app = TestApp::spawn().await;
    let url = format!("{}?token=not-a-token", app.ws_url);

    assert!(tokio_tungstenite::connect_async(url).await.is_err());
}

#[tokio::test]
#[ignore = "requires Postgres and Redis"]
async fn test_graceful_websocket_shutdown() {
    let app = TestApp::spawn().await;
    let user = app.register_user(&common::generate_name("shutdown")).await;
    let mut ws = app.connect_ws(&user.token).await;

    let _ = app.shutdown_tx.send(true);

    let mut close_received = false;
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        if let Some(Ok(Message::Close(Some(frame)))) = ws.receive_raw_timeout(Duration::from_millis(100)).await {
            assert_eq!(frame.code, CloseCode::Away);
            assert_eq!(frame.reason, "Server shutting down");
            close_received = true;
            break;
        }
    }

    assert!(close_received, "Did not receive graceful close frame within timeout");
}
