//! Change feed behavior against a mock websocket server

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use marchehub::auth::User;
use marchehub::realtime::{ChangeFeed, ChangeKind, ConnectionState};
use marchehub::MarcheHub;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Accepts one connection, replies ok to every message, and pushes a change
/// event for each joined topic
async fn start_feed_server() -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };

        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Text(text) => {
                    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
                    let event = parsed["event"].as_str().unwrap_or_default().to_string();
                    let topic = parsed["topic"].as_str().unwrap_or_default().to_string();

                    let reply = json!({
                        "topic": topic,
                        "event": "phx_reply",
                        "payload": {"status": "ok", "response": {}},
                        "ref": parsed["ref"].clone(),
                    });
                    if ws.send(Message::Text(reply.to_string())).await.is_err() {
                        break;
                    }

                    if event == "phx_join" {
                        let table = topic.rsplit(':').next().unwrap_or_default().to_string();
                        let change = json!({
                            "topic": topic,
                            "event": "postgres_changes",
                            "payload": {
                                "type": "INSERT",
                                "schema": "public",
                                "table": table,
                                "commit_timestamp": "2024-03-12T09:30:00Z"
                            },
                            "ref": null,
                        });
                        if ws.send(Message::Text(change.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn connect_subscribe_and_receive_a_change() {
    let (url, server) = start_feed_server().await;
    let feed = ChangeFeed::new(&url, "test-key", Duration::from_secs(30));

    feed.connect().await.unwrap();
    assert_eq!(feed.connection_state().await, ConnectionState::Connected);

    let mut events = feed.subscribe("devis").await.unwrap();
    let change = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for change event")
        .unwrap();

    assert_eq!(change.kind, ChangeKind::Insert);
    assert_eq!(change.table, "devis");

    feed.disconnect().await;
    assert_eq!(feed.connection_state().await, ConnectionState::Disconnected);
    let _ = tokio::time::timeout(Duration::from_secs(1), server).await;
}

#[tokio::test]
async fn subscribe_requires_a_connection() {
    let feed = ChangeFeed::new("http://127.0.0.1:9", "test-key", Duration::from_secs(30));
    assert!(feed.subscribe("devis").await.is_err());
}

#[tokio::test]
async fn watch_refetches_the_store_on_a_change_event() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/devis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "d1",
            "company": "Acme BTP",
            "status": "En attente",
            "created_by": "u1",
            "created_at": "2024-03-12T09:30:00Z"
        }])))
        .mount(&backend)
        .await;

    let (feed_url, feed_server) = start_feed_server().await;
    let feed = ChangeFeed::new(&feed_url, "test-key", Duration::from_secs(30));
    feed.connect().await.unwrap();

    let hub = MarcheHub::new(&backend.uri(), "test-anon-key");
    hub.auth()
        .set_user(User {
            id: "u1".to_string(),
            email: None,
        })
        .await;

    let store = hub.devis();
    assert!(store.devis().await.is_empty());
    let _watch = store.watch(&feed);

    let mut refetched = false;
    for _ in 0..40 {
        if !store.devis().await.is_empty() {
            refetched = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(refetched, "watch task never refetched the store");

    feed.disconnect().await;
    let _ = tokio::time::timeout(Duration::from_secs(1), feed_server).await;
}
