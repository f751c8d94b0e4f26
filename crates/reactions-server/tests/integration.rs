//! End-to-end tests against a real listener using a `WebSocket` client.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use reactions_server::config::{HubConfig, ServerConfig};
use reactions_server::server::ReactionsServer;
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn test_config(pong_wait: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        hub: HubConfig {
            broadcast_interval: Duration::from_millis(300),
            delivery_timeout: Duration::from_millis(100),
            pong_wait,
            write_wait: Duration::from_secs(1),
            stats_interval: None,
            shutdown_timeout: Duration::from_secs(2),
            ..HubConfig::default()
        },
        ..ServerConfig::default()
    }
}

/// Boot a test server and return the WS URL and the server.
async fn boot_server(pong_wait: Duration) -> (String, Arc<ReactionsServer>) {
    let server = Arc::new(ReactionsServer::new(test_config(pong_wait)));
    let addr = server.listen().await.unwrap();
    (format!("ws://{addr}/ws"), server)
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn wait_for_count(server: &ReactionsServer, expected: usize) {
    timeout(TIMEOUT, async {
        while server.hub().subscribed_count() != expected {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {expected} clients, have {}",
            server.hub().subscribed_count()
        )
    });
}

/// Next snapshot, or `None` once the server closes the connection.
async fn read_snapshot(ws: &mut WsStream) -> Option<Value> {
    loop {
        let msg = timeout(TIMEOUT, ws.next()).await.expect("timed out reading")?;
        match msg.ok()? {
            Message::Text(text) => return Some(serde_json::from_str(&text).unwrap()),
            Message::Close(_) => return None,
            _ => {}
        }
    }
}

fn count_of(snapshot: &Value, kind: &str) -> u64 {
    snapshot["emojis"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["type"] == kind)
        .and_then(|item| item["count"].as_u64())
        .unwrap_or(0)
}

#[tokio::test]
async fn reactions_are_aggregated_and_broadcast_to_all() {
    let (url, server) = boot_server(Duration::from_secs(5)).await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(connect(&url).await);
    }
    wait_for_count(&server, 3).await;

    for kind in ["heart", "heart", "star"] {
        let payload = json!({"type": kind, "count": 1}).to_string();
        clients[0].send(Message::Text(payload.into())).await.unwrap();
    }

    for ws in &mut clients {
        let (mut hearts, mut stars) = (0, 0);
        while hearts < 2 || stars < 1 {
            let snapshot = read_snapshot(ws).await.unwrap();
            if snapshot["emojis"] != json!([]) {
                assert_eq!(snapshot["visitors"], 3);
            }
            hearts += count_of(&snapshot, "heart");
            stars += count_of(&snapshot, "star");
        }
        assert_eq!((hearts, stars), (2, 1));
    }

    server.shutdown().await;
}

#[tokio::test]
async fn empty_windows_still_broadcast() {
    let (url, server) = boot_server(Duration::from_secs(5)).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    wait_for_count(&server, 2).await;

    for ws in [&mut a, &mut b] {
        let snapshot = read_snapshot(ws).await.unwrap();
        assert_eq!(snapshot["emojis"], json!([]));
        assert!(snapshot["visitors"].as_u64().unwrap() >= 1);
    }

    server.shutdown().await;
}

#[tokio::test]
async fn malformed_payload_closes_connection() {
    let (url, server) = boot_server(Duration::from_secs(5)).await;
    let mut ws = connect(&url).await;
    wait_for_count(&server, 1).await;

    ws.send(Message::Text("definitely not json".into()))
        .await
        .unwrap();
    while read_snapshot(&mut ws).await.is_some() {}
    wait_for_count(&server, 0).await;

    server.shutdown().await;
}

#[tokio::test]
async fn silent_client_is_reaped() {
    let (url, server) = boot_server(Duration::from_millis(500)).await;
    let _silent = connect(&url).await;
    let mut active = connect(&url).await;
    wait_for_count(&server, 2).await;

    // Reading keeps the active client answering pings.
    let reaped = timeout(TIMEOUT, async {
        loop {
            let snapshot = read_snapshot(&mut active).await.unwrap();
            if snapshot["visitors"] == 1 {
                break;
            }
        }
    })
    .await;
    assert!(reaped.is_ok(), "silent client was never reaped");
    assert_eq!(server.hub().subscribed_count(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn stats_endpoint_counts_clients() {
    let (url, server) = boot_server(Duration::from_secs(5)).await;
    let _a = connect(&url).await;
    let _b = connect(&url).await;
    wait_for_count(&server, 2).await;

    let req = Request::builder().uri("/stats").body(Body::empty()).unwrap();
    let resp = server.router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed, json!({"client_count": 2}));

    server.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_connected_clients() {
    let (url, server) = boot_server(Duration::from_secs(5)).await;
    let mut ws = connect(&url).await;
    wait_for_count(&server, 1).await;

    server.shutdown().await;
    assert_eq!(server.hub().subscribed_count(), 0);
    while read_snapshot(&mut ws).await.is_some() {}

    assert!(connect_async(&url).await.is_err());
}
