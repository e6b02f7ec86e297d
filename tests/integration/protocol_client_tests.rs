//! Integration tests for the protocol client over in-memory pipes and
//! loopback TCP.

use std::time::{Duration, Instant};

use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use vim_harness::protocol::{self, Connection};
use vim_harness::HarnessError;

use super::test_helpers::spawn_echo_server;

fn frame(body: &str) -> Vec<u8> {
    format!("Content-Length: {}\r\n\r\n{body}", body.len()).into_bytes()
}

/// Two frames written through a one-byte pipe arrive as two messages.
#[tokio::test]
async fn receives_frames_split_into_single_bytes() {
    let (client, mut server) = tokio::io::duplex(1);
    let mut conn = Connection::new(client, "duplex");

    let writer = tokio::spawn(async move {
        let mut bytes = frame(r#"{"id":1,"result":"first"}"#);
        bytes.extend(frame(r#"{"id":2,"result":"second"}"#));
        server.write_all(&bytes).await.expect("write");
        server
    });

    let first = conn.receive(Duration::from_secs(5)).await.expect("first");
    let second = conn.receive(Duration::from_secs(5)).await.expect("second");
    let _server = writer.await.expect("writer task");

    assert_eq!(first["result"], "first");
    assert_eq!(second["result"], "second");
}

/// Messages round-trip through a real socket.
#[tokio::test]
async fn tcp_round_trip() {
    let (address, server) = spawn_echo_server().await;
    let mut conn = protocol::connect(&address.to_string()).await.expect("connect");
    assert_eq!(conn.peer(), address.to_string());

    let request = json!({"jsonrpc": "2.0", "id": 7, "method": "textDocument/hover"});
    conn.send(&request).await.expect("send");
    let reply = conn.receive(Duration::from_secs(5)).await.expect("reply");

    assert_eq!(reply, request);
    server.abort();
}

/// A silent peer yields `None` once the timeout elapses.
#[tokio::test]
async fn receive_times_out_with_none() {
    let (client, _server) = tokio::io::duplex(64);
    let mut conn = Connection::new(client, "silent");

    let started = Instant::now();
    let reply = conn.receive(Duration::from_millis(200)).await;

    assert!(reply.is_none());
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// A closed peer yields `None` instead of an error.
#[tokio::test]
async fn closed_peer_yields_none() {
    let (client, server) = tokio::io::duplex(64);
    drop(server);
    let mut conn = Connection::new(client, "closed");

    assert!(conn.receive(Duration::from_secs(5)).await.is_none());
}

/// A peer that closes mid-body yields `None`.
#[tokio::test]
async fn truncated_body_yields_none() {
    let (client, mut server) = tokio::io::duplex(256);
    let mut conn = Connection::new(client, "truncated");

    server
        .write_all(b"Content-Length: 50\r\n\r\n{\"id\":")
        .await
        .expect("write");
    drop(server);

    assert!(conn.receive(Duration::from_secs(5)).await.is_none());
}

/// A malformed body costs only its own message: the valid frame written
/// right behind it still arrives.
#[tokio::test]
async fn malformed_body_does_not_lose_following_message() {
    let (client, mut server) = tokio::io::duplex(1024);
    let mut conn = Connection::new(client, "garbled");

    let mut bytes = frame("{not json");
    bytes.extend(frame(r#"{"id":2,"result":"ok"}"#));
    server.write_all(&bytes).await.expect("write");

    assert!(
        conn.receive(Duration::from_millis(500)).await.is_none(),
        "malformed body is not a message"
    );
    let next = conn
        .receive(Duration::from_millis(500))
        .await
        .expect("buffered message after the bad one");

    assert_eq!(next, json!({"id": 2, "result": "ok"}));
}

/// `wait_for_method` reads past a malformed body to the wanted method.
#[tokio::test]
async fn wait_for_method_skips_malformed_body() {
    let (client, mut server) = tokio::io::duplex(1024);
    let mut conn = Connection::new(client, "garbled");

    let mut bytes = frame("{bad");
    bytes.extend(frame(r#"{"method":"initialized","params":{}}"#));
    server.write_all(&bytes).await.expect("write");

    let message = conn
        .wait_for_method("initialized", Duration::from_secs(2))
        .await
        .expect("method after malformed body");

    assert_eq!(message["method"], "initialized");
}

/// `wait_for_method` skips unrelated messages.
#[tokio::test]
async fn wait_for_method_skips_unrelated() {
    let (client, mut server) = tokio::io::duplex(1024);
    let mut conn = Connection::new(client, "notifications");

    let mut bytes = frame(r#"{"method":"window/logMessage","params":{}}"#);
    bytes.extend(frame(r#"{"id":3,"result":null}"#));
    bytes.extend(frame(
        r#"{"method":"textDocument/publishDiagnostics","params":{"diagnostics":[]}}"#,
    ));
    server.write_all(&bytes).await.expect("write");

    let message = conn
        .wait_for_method("textDocument/publishDiagnostics", Duration::from_secs(5))
        .await
        .expect("diagnostics");

    assert_eq!(message["params"]["diagnostics"], json!([]));
}

/// `wait_for_method` gives up at its deadline.
#[tokio::test]
async fn wait_for_method_times_out() {
    let (client, mut server) = tokio::io::duplex(1024);
    let mut conn = Connection::new(client, "other");
    server
        .write_all(&frame(r#"{"method":"window/logMessage"}"#))
        .await
        .expect("write");

    let message = conn
        .wait_for_method("initialized", Duration::from_millis(300))
        .await;

    assert!(message.is_none());
}

/// Connecting to a port nobody listens on is an I/O error.
#[tokio::test]
async fn connect_refused_is_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr").to_string();
    drop(listener);

    let err = protocol::connect_timeout(&address, Duration::from_secs(2))
        .await
        .expect_err("refused");

    assert!(
        matches!(err, HarnessError::Io(_) | HarnessError::Timeout(_)),
        "got {err}"
    );
}
