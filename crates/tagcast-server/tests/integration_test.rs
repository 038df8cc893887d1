//! Integration tests for the tagcast WebSocket server.
//!
//! These tests start an actual server and connect with WebSocket clients
//! to verify end-to-end behavior of both channels.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;

use tagcast_server::{LiveServer, ServerConfig, ServerHandle};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const ACK: &str = "Values updated successfully";

/// Start a test server on an ephemeral port.
async fn start_test_server() -> (SocketAddr, ServerHandle, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig {
        name: "test-server".to_string(),
        bind_addr: addr,
        send_timeout: Duration::from_millis(200),
        ..ServerConfig::default()
    };

    let server = LiveServer::new(config);
    let status = server.handle();

    let handle = tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    (addr, status, handle)
}

/// Connect a WebSocket client to the given channel path.
async fn connect_client(addr: SocketAddr, path: &str) -> Client {
    let url = format!("ws://{}{}", addr, path);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("Failed to connect");
    ws_stream
}

/// Wait for a text message with timeout.
async fn recv_text(ws: &mut Client) -> Result<String, &'static str> {
    match timeout(Duration::from_secs(5), ws.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => Ok(text),
        Ok(Some(Ok(_))) => Err("Unexpected message type"),
        Ok(Some(Err(_))) => Err("WebSocket error"),
        Ok(None) => Err("Connection closed"),
        Err(_) => Err("Timeout"),
    }
}

async fn recv_json(ws: &mut Client) -> Value {
    let text = recv_text(ws).await.expect("Should receive a frame");
    serde_json::from_str(&text).expect("Valid JSON")
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Wait until the values channel holds `count` sessions.
async fn wait_for_sessions(status: &ServerHandle, count: usize) {
    for _ in 0..100 {
        if status.values().broadcaster().len().await == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("values channel never reached {count} sessions");
}

#[tokio::test]
async fn test_values_fan_out_filtered_per_observer() {
    let (addr, _status, handle) = start_test_server().await;

    let mut sender = connect_client(addr, "/actual_data").await;
    let mut obs_a = connect_client(addr, "/actual_data").await;
    let mut obs_b = connect_client(addr, "/actual_data").await;

    send(&mut obs_a, json!({"get": ["a"]})).await;
    send(&mut obs_b, json!({"get": ["b", "c"]})).await;
    assert_eq!(recv_json(&mut obs_a).await, json!([]));
    assert_eq!(recv_json(&mut obs_b).await, json!([]));

    send(
        &mut sender,
        json!({"update": [
            {"tag": "a", "timestamp": 10, "value": 1.5},
            {"tag": "b", "timestamp": 11, "value": 2.5}
        ]}),
    )
    .await;

    assert_eq!(recv_text(&mut sender).await.unwrap(), ACK);
    assert_eq!(
        recv_json(&mut obs_a).await,
        json!([{"tag": "a", "timestamp": 10, "value": 1.5}])
    );
    assert_eq!(
        recv_json(&mut obs_b).await,
        json!([{"tag": "b", "timestamp": 11, "value": 2.5}])
    );

    // The sender has no subscription, so the next frame it sees is this reply
    send(&mut sender, json!({"get": ["b", "a", "zzz"]})).await;
    assert_eq!(
        recv_json(&mut sender).await,
        json!([
            {"tag": "b", "timestamp": 11, "value": 2.5},
            {"tag": "a", "timestamp": 10, "value": 1.5}
        ])
    );

    handle.abort();
}

#[tokio::test]
async fn test_values_get_all_and_last_write_wins() {
    let (addr, _status, handle) = start_test_server().await;
    let mut client = connect_client(addr, "/actual_data").await;

    send(
        &mut client,
        json!({"update": [{"tag": "t", "timestamp": 5, "value": 1.0}]}),
    )
    .await;
    assert_eq!(recv_text(&mut client).await.unwrap(), ACK);

    // Older timestamp still replaces the stored sample
    send(
        &mut client,
        json!({"update": [{"tag": "t", "timestamp": 3, "value": 7.0}]}),
    )
    .await;
    assert_eq!(recv_text(&mut client).await.unwrap(), ACK);

    send(&mut client, json!({"get_all": null})).await;
    assert_eq!(
        recv_json(&mut client).await,
        json!([{"tag": "t", "timestamp": 3, "value": 7.0}])
    );

    handle.abort();
}

#[tokio::test]
async fn test_events_partial_update_and_get_response() {
    let (addr, _status, handle) = start_test_server().await;

    let mut sender = connect_client(addr, "/events").await;
    let mut observer = connect_client(addr, "/events").await;

    send(&mut sender, json!({"update": {"door": {"1": 0.0, "2": 1.0}}})).await;
    assert_eq!(recv_text(&mut sender).await.unwrap(), ACK);

    send(&mut observer, json!({"get": ["door", "fire"]})).await;
    assert_eq!(
        recv_json(&mut observer).await,
        json!({"get_response": {"door": {"1": 0.0, "2": 1.0}, "fire": {}}})
    );

    send(
        &mut sender,
        json!({"update": {"door": {"2": 0.0}, "pump": {"7": 3.0}}}),
    )
    .await;
    assert_eq!(recv_text(&mut sender).await.unwrap(), ACK);
    assert_eq!(recv_json(&mut observer).await, json!({"door": {"2": 0.0}}));

    // Stored state is the merge of both updates
    send(&mut observer, json!({"get": ["door"]})).await;
    assert_eq!(
        recv_json(&mut observer).await,
        json!({"get_response": {"door": {"1": 0.0, "2": 0.0}}})
    );

    handle.abort();
}

#[tokio::test]
async fn test_channels_are_independent() {
    let (addr, status, handle) = start_test_server().await;

    let mut values = connect_client(addr, "/actual_data").await;
    let mut events = connect_client(addr, "/events").await;

    send(&mut events, json!({"get": ["a"]})).await;
    recv_json(&mut events).await;

    send(
        &mut values,
        json!({"update": [{"tag": "a", "timestamp": 1, "value": 1.0}]}),
    )
    .await;
    assert_eq!(recv_text(&mut values).await.unwrap(), ACK);

    send(&mut events, json!({"get": ["a"]})).await;
    assert_eq!(
        recv_json(&mut events).await,
        json!({"get_response": {"a": {}}})
    );

    send(&mut events, json!({"get_all": null})).await;
    assert_eq!(
        recv_json(&mut events).await,
        json!({"error": "Unknown message type"})
    );

    assert_eq!(status.values().broadcaster().len().await, 1);
    assert_eq!(status.events().broadcaster().len().await, 1);
    assert_eq!(status.status().await.events.updates_applied, 0);

    handle.abort();
}

#[tokio::test]
async fn test_malformed_frame_keeps_session_open() {
    let (addr, _status, handle) = start_test_server().await;
    let mut client = connect_client(addr, "/actual_data").await;

    client
        .send(Message::Text("{ not json".to_string()))
        .await
        .unwrap();
    let reply = recv_json(&mut client).await;
    assert!(reply["error"].is_string());

    send(&mut client, json!({"hello": "world"})).await;
    assert_eq!(
        recv_json(&mut client).await,
        json!({"error": "Unknown message type"})
    );

    send(&mut client, json!({"get_all": null})).await;
    assert_eq!(recv_json(&mut client).await, json!([]));

    handle.abort();
}

#[tokio::test]
async fn test_unknown_path_is_refused() {
    let (addr, _status, handle) = start_test_server().await;

    let url = format!("ws://{}/nowhere", addr);
    assert!(tokio_tungstenite::connect_async(&url).await.is_err());

    handle.abort();
}

#[tokio::test]
async fn test_disconnect_removes_session() {
    let (addr, status, handle) = start_test_server().await;

    let mut observer = connect_client(addr, "/actual_data").await;
    send(&mut observer, json!({"get": ["a"]})).await;
    recv_json(&mut observer).await;
    wait_for_sessions(&status, 1).await;

    observer.close(None).await.ok();
    drop(observer);
    wait_for_sessions(&status, 0).await;

    let mut sender = connect_client(addr, "/actual_data").await;
    send(
        &mut sender,
        json!({"update": [{"tag": "a", "timestamp": 1, "value": 1.0}]}),
    )
    .await;
    assert_eq!(recv_text(&mut sender).await.unwrap(), ACK);

    let stats = status.status().await.values;
    assert_eq!(stats.sessions, 1);
    assert_eq!(stats.pushes_delivered, 0);

    handle.abort();
}

#[tokio::test]
async fn test_vanished_observer_does_not_affect_others() {
    let (addr, status, handle) = start_test_server().await;

    let mut sender = connect_client(addr, "/actual_data").await;
    let mut gone = connect_client(addr, "/actual_data").await;
    let mut live = connect_client(addr, "/actual_data").await;

    send(&mut gone, json!({"get": ["a"]})).await;
    recv_json(&mut gone).await;
    send(&mut live, json!({"get": ["a"]})).await;
    recv_json(&mut live).await;

    // Drop without a close handshake
    drop(gone);

    for value in [1.0, 2.0, 3.0] {
        send(
            &mut sender,
            json!({"update": [{"tag": "a", "timestamp": 1, "value": value}]}),
        )
        .await;
        assert_eq!(recv_text(&mut sender).await.unwrap(), ACK);
        assert_eq!(
            recv_json(&mut live).await,
            json!([{"tag": "a", "timestamp": 1, "value": value}])
        );
    }

    wait_for_sessions(&status, 2).await;
    handle.abort();
}
