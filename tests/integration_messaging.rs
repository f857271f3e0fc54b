#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, unreachable_pub, clippy::similar_names)]
mod common;

use common::TestApp;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "requires Postgres and Redis"]
async fn test_send_and_read_flow() {
    let app = TestApp::spawn().await;
    let alice = app.register_user(&common::generate_name("alice")).await;
    let bob = app.register_user(&common::generate_name("bob")).await;

    let sent = app.send_message(&alice.token, bob.user_id, "hello bob").await;
    assert_eq!(sent["status"], "sent");
    assert_eq!(sent["sender_id"], alice.user_id);

    let (_, bob_inbox) = app.get_json(&bob.token, "/conversations").await;
    assert_eq!(bob_inbox[0]["user"]["id"], alice.user_id);
    assert_eq!(bob_inbox[0]["unread_count"], 1);
    assert_eq!(bob_inbox[0]["last_message"], "hello bob");

    let (status, thread) = app.get_json(&bob.token, &format!("/conversations/{}/messages", alice.user_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread.as_array().unwrap().len(), 1);

    let (_, bob_inbox) = app.get_json(&bob.token, "/conversations").await;
    assert_eq!(bob_inbox[0]["unread_count"], 0);

    let (_, alice_inbox) = app.get_json(&alice.token, "/conversations").await;
    assert_eq!(alice_inbox[0]["is_read"], true);
}

#[tokio::test]
#[ignore = "requires Postgres and Redis"]
async fn test_mark_read_is_idempotent() {
    let app = TestApp::spawn().await;
    let alice = app.register_user(&common::generate_name("alice")).await;
    let bob = app.register_user(&common::generate_name("bob")).await;

    app.send_message(&alice.token, bob.user_id, "one").await;
    app.send_message(&alice.token, bob.user_id, "two").await;
    app.send_message(&bob.token, alice.user_id, "reply").await;

    let url = format!("{}/conversations/{}/read", app.server_url, alice.user_id);
    let first: serde_json::Value = app.client.post(&url).bearer_auth(&bob.token).send().await.unwrap().json().await.unwrap();
    assert_eq!(first, json!({"updated": 2}));

    let second: serde_json::Value =
        app.client.post(&url).bearer_auth(&bob.token).send().await.unwrap().json().await.unwrap();
    assert_eq!(second, json!({"updated": 0}));

    // Bob's own reply is untouched
    let (_, alice_inbox) = app.get_json(&alice.token, "/conversations").await;
    assert_eq!(alice_inbox[0]["unread_count"], 1);
}

#[tokio::test]
#[ignore = "requires Postgres and Redis"]
async fn test_delete_only_by_sender() {
    let app = TestApp::spawn().await;
    let alice = app.register_user(&common::generate_name("alice")).await;
    let bob = app.register_user(&common::generate_name("bob")).await;

    let sent = app.send_message(&alice.token, bob.user_id, "oops").await;
    let url = format!("{}/messages/{}", app.server_url, sent["id"]);

    let resp = app.client.delete(&url).bearer_auth(&bob.token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app.client.delete(&url).bearer_auth(&alice.token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.client.delete(&url).bearer_auth(&alice.token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let (_, thread) = app.get_json(&bob.token, &format!("/conversations/{}/messages", alice.user_id)).await;
    assert!(thread.as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Postgres and Redis"]
async fn test_error_cases() {
    let app = TestApp::spawn().await;
    let alice = app.register_user(&common::generate_name("alice")).await;

    let resp = app
        .client
        .post(format!("{}/messages", app.server_url))
        .bearer_auth(&alice.token)
        .json(&json!({"receiver_id": i64::MAX, "body": "anyone?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .client
        .post(format!("{}/messages", app.server_url))
        .bearer_auth(&alice.token)
        .json(&json!({"receiver_id": alice.user_id, "body": "me"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let (status, _) = app.get_json(&alice.token, &format!("/conversations/{}/messages", i64::MAX)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let resp = app.client.get(format!("{}/conversations", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

async fn mark_read(app: &TestApp, token: &str, partner_id: i64) -> u64 {
    let resp = app
        .client
        .post(format!("{}/conversations/{}/read", app.server_url, partner_id))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json::<serde_json::Value>().await.unwrap()["updated"].as_u64().unwrap()
}

#[tokio::test]
#[ignore = "requires Postgres and Redis"]
async fn test_concurrent_mark_read_transitions_each_message_once() {
    const UNREAD: usize = 25;

    let app = TestApp::spawn().await;
    let alice = app.register_user(&common::generate_name("alice")).await;
    let bob = app.register_user(&common::generate_name("bob")).await;

    let mut sent_ids = Vec::new();
    for i in 0..UNREAD {
        let sent = app.send_message(&alice.token, bob.user_id, &format!("message {i}")).await;
        sent_ids.push(sent["id"].as_i64().unwrap());
    }
    let mut alice_ws = app.connect_ws(&alice.token).await;

    let (first, second) =
        tokio::join!(mark_read(&app, &bob.token, alice.user_id), mark_read(&app, &bob.token, alice.user_id));
    assert_eq!(usize::try_from(first + second).unwrap(), UNREAD, "every message transitions exactly once");

    // Mirrors of the sends may still be in flight; only receipts count here
    let mut receipts = Vec::new();
    while let Some(event) = alice_ws.receive_event_timeout(std::time::Duration::from_secs(2)).await {
        if event["event"] == "message.read" {
            receipts.push(event["data"]["message_id"].as_i64().unwrap());
        }
    }
    receipts.sort_unstable();
    assert_eq!(receipts, sent_ids, "exactly one receipt per message");

    let (_, alice_inbox) = app.get_json(&alice.token, "/conversations").await;
    assert_eq!(alice_inbox[0]["is_read"], true);
}
