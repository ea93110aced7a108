//! End-to-end integration tests for the authentication listener.
//!
//! These tests bind a real loopback listener, run the server's accept loop,
//! and speak the wire protocol from the outside with nothing but the
//! duofa-core codec — the same position a device (or an attacker) is in.
//!
//! The full flow under test:
//!
//! ```text
//! Server                               Test (acting as the device)
//! ──────                               ───────────────────────────
//! issue_identifier("alice")
//!   → identifier                       generate_pin(identifier, key, now)
//!                                      send {"user":"alice","pin":...}
//! verify over ±2 slices
//! grant authorization
//! send {"result":"Authorization granted."}
//! ```

use std::collections::HashMap;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use duofa_core::protocol::codec::{decode_frame, encode_frame};
use duofa_core::protocol::messages::{
    FramePayload, CONTENT_TYPE_BINARY_ECHO, CONTENT_TYPE_JSON, ENCODING_BINARY, ENCODING_UTF8,
    RESULT_DENIED, RESULT_GRANTED,
};
use duofa_core::{generate_pin, unix_now};
use duofa_server::domain::config::ServerConfig;
use duofa_server::domain::keys::SecretKeyTable;
use duofa_server::infrastructure::{serve_listener, ServerState};

/// Starts a server on an ephemeral loopback port, returning its state, the
/// address to dial, and the flag that stops the accept loop.
async fn start_server() -> (Arc<ServerState>, std::net::SocketAddr, Arc<AtomicBool>) {
    let keys = SecretKeyTable::from_map(HashMap::from([
        ("alice".to_string(), "k1".to_string()),
        ("bob".to_string(), "k2".to_string()),
    ]));
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        idle_timeout: Duration::from_secs(2),
        ..ServerConfig::default()
    };
    let state = ServerState::new(config, keys);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(serve_listener(
        listener,
        Arc::clone(&state),
        Arc::clone(&running),
    ));
    (state, addr, running)
}

/// Sends one encoded frame and reads frames back until the server closes
/// the connection, returning the decoded response payload.
async fn exchange(addr: std::net::SocketAddr, frame: &[u8]) -> FramePayload {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(frame).await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some((_, payload, consumed)) = decode_frame(&buf).unwrap() {
            buf.drain(..consumed);
            return payload;
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "server closed before sending a complete response");
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn json_request(user: &str, pin: &str) -> Vec<u8> {
    let body = format!(r#"{{"user":"{user}","pin":"{pin}"}}"#);
    encode_frame(body.as_bytes(), CONTENT_TYPE_JSON, ENCODING_UTF8).unwrap()
}

fn result_of(payload: FramePayload) -> String {
    match payload {
        FramePayload::Json(value) => value["result"].as_str().unwrap().to_string(),
        FramePayload::Binary(_) => panic!("expected a JSON response"),
    }
}

#[tokio::test]
async fn test_correct_pin_is_granted_and_recorded() {
    let (state, addr, running) = start_server().await;

    let identifier = state.issue_identifier("alice").unwrap();
    let pin = generate_pin(identifier, b"k1", unix_now());
    let response = exchange(addr, &json_request("alice", &pin)).await;

    assert_eq!(result_of(response), RESULT_GRANTED);
    assert!(state.is_authorized("alice"), "grant must be recorded");
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_wrong_pin_is_denied() {
    let (state, addr, running) = start_server().await;

    state.issue_identifier("alice").unwrap();
    let response = exchange(addr, &json_request("alice", "badc0ffee")).await;

    assert_eq!(result_of(response), RESULT_DENIED);
    assert!(!state.is_authorized("alice"));
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_pin_without_issued_identifier_is_denied() {
    let (state, addr, running) = start_server().await;

    // The device guessed an identifier that was never issued.
    let pin = generate_pin(123_456, b"k1", unix_now());
    let response = exchange(addr, &json_request("alice", &pin)).await;

    assert_eq!(result_of(response), RESULT_DENIED);
    assert!(!state.is_authorized("alice"));
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_unknown_user_gets_the_same_denial() {
    let (_state, addr, running) = start_server().await;

    let pin = generate_pin(123_456, b"whatever", unix_now());
    let response = exchange(addr, &json_request("mallory", &pin)).await;

    // Indistinguishable from a wrong pin on purpose.
    assert_eq!(result_of(response), RESULT_DENIED);
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_request_missing_pin_names_the_field() {
    let (_state, addr, running) = start_server().await;

    let frame = encode_frame(br#"{"user":"alice"}"#, CONTENT_TYPE_JSON, ENCODING_UTF8).unwrap();
    let response = exchange(addr, &frame).await;

    assert_eq!(result_of(response), "Error: missing field 'pin'.");
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_fragmented_request_still_verifies() {
    let (state, addr, running) = start_server().await;

    let identifier = state.issue_identifier("bob").unwrap();
    let pin = generate_pin(identifier, b"k2", unix_now());
    let frame = json_request("bob", &pin);

    // Dribble the frame out a few bytes at a time with pauses, forcing the
    // server through repeated partial reads.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    for piece in frame.chunks(5) {
        stream.write_all(piece).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let payload = loop {
        if let Some((_, payload, _)) = decode_frame(&buf).unwrap() {
            break payload;
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "server closed before responding");
        buf.extend_from_slice(&chunk[..n]);
    };

    assert_eq!(result_of(payload), RESULT_GRANTED);
    assert!(state.is_authorized("bob"));
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_binary_request_gets_diagnostic_echo() {
    let (_state, addr, running) = start_server().await;

    let frame = encode_frame(
        b"PING-0123456789",
        "application/octet-stream",
        ENCODING_BINARY,
    )
    .unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&frame).await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let (header, payload) = loop {
        if let Some((header, payload, _)) = decode_frame(&buf).unwrap() {
            break (header, payload);
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "server closed before responding");
        buf.extend_from_slice(&chunk[..n]);
    };

    assert_eq!(header.content_type, CONTENT_TYPE_BINARY_ECHO);
    assert_eq!(
        payload,
        FramePayload::Binary(b"First 10 bytes of request: PING-01234".to_vec())
    );
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_concurrent_devices_are_serviced_independently() {
    let (state, addr, running) = start_server().await;

    let alice_id = state.issue_identifier("alice").unwrap();
    let bob_id = state.issue_identifier("bob").unwrap();
    let now = unix_now();

    let alice_request = json_request("alice", &generate_pin(alice_id, b"k1", now));
    let bob_request = json_request("bob", &generate_pin(bob_id, b"k2", now));
    let alice = exchange(addr, &alice_request);
    let bob = exchange(addr, &bob_request);
    let (alice_response, bob_response) = tokio::join!(alice, bob);

    assert_eq!(result_of(alice_response), RESULT_GRANTED);
    assert_eq!(result_of(bob_response), RESULT_GRANTED);
    assert!(state.is_authorized("alice"));
    assert!(state.is_authorized("bob"));
    running.store(false, Ordering::Relaxed);
}
