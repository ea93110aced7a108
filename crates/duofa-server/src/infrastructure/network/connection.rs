//! Per-connection engine for the authentication listener.
//!
//! Each accepted socket is driven by one [`ServerConnection`]. TCP is a
//! stream protocol, so a single read may deliver part of a frame or several
//! frames' worth of bytes at once; the engine buffers incoming bytes and
//! steps the staged frame decoders as data arrives:
//!
//! ```text
//! await length ──► await header ──► await payload ──► process ──► write ──► close
//!      │                │                 │
//!      └── progress markers: header_len, header, then the decoded payload
//! ```
//!
//! The engine is generic over the stream so tests can drive it with
//! scripted in-memory I/O instead of real sockets. One request, one
//! response, then the connection closes — there is no pipelining in this
//! protocol.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use duofa_core::protocol::codec::{
    decode_header, decode_header_len, decode_payload, encode_frame, FrameError,
};
use duofa_core::protocol::messages::{
    AuthRequest, AuthResponse, FrameHeader, FramePayload, CONTENT_TYPE_BINARY_ECHO,
    CONTENT_TYPE_JSON, ENCODING_BINARY, ENCODING_UTF8,
};
use duofa_core::unix_now;

use crate::application::verify_pin::verify_pin;
use crate::application::registry::Registry;
use crate::domain::keys::SecretKeyTable;

/// How many bytes each read call asks the socket for.
const READ_CHUNK: usize = 4096;

/// How many request bytes the diagnostic echo of a non-JSON request repeats.
const BINARY_ECHO_LEN: usize = 10;

/// Errors that terminate a single connection.
///
/// These never propagate past the accept loop's dispatch boundary: the
/// offending connection is logged and dropped, the listener keeps running.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The peer closed the socket before delivering a complete frame.
    #[error("peer {0} closed the connection mid-frame")]
    PeerClosed(SocketAddr),

    /// No bytes arrived for longer than the configured idle timeout.
    #[error("connection from {peer} idle for more than {timeout:?}")]
    IdleTimeout { peer: SocketAddr, timeout: Duration },

    /// The peer sent bytes that violate the frame contract.
    #[error("protocol violation from {peer}: {source}")]
    Frame {
        peer: SocketAddr,
        #[source]
        source: FrameError,
    },

    /// The socket failed underneath us.
    #[error("I/O error on connection from {peer}: {source}")]
    Io {
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// State machine for one server-side connection.
pub struct ServerConnection<S> {
    stream: S,
    peer: SocketAddr,
    idle_timeout: Duration,
    recv_buf: Vec<u8>,
    /// Set once the 2-byte length prefix has been consumed.
    header_len: Option<u16>,
    /// Set once the JSON header has been consumed and validated.
    header: Option<FrameHeader>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ServerConnection<S> {
    pub fn new(stream: S, peer: SocketAddr, idle_timeout: Duration) -> Self {
        Self {
            stream,
            peer,
            idle_timeout,
            recv_buf: Vec::with_capacity(READ_CHUNK),
            header_len: None,
            header: None,
        }
    }

    /// Runs the whole exchange: read one request, verify, respond, close.
    ///
    /// # Errors
    ///
    /// Any [`ConnectionError`]; authentication failures are *not* errors —
    /// they produce an ordinary `"Authentication failed."` response.
    pub async fn serve(
        mut self,
        registry: &Registry,
        keys: &SecretKeyTable,
    ) -> Result<(), ConnectionError> {
        let (header, payload) = self.read_request().await?;
        debug!(peer = %self.peer, content_type = %header.content_type, "request reassembled");

        let response = build_response(&payload, registry, keys, unix_now())
            .map_err(|source| ConnectionError::Frame { peer: self.peer, source })?;

        self.stream
            .write_all(&response)
            .await
            .map_err(|source| ConnectionError::Io { peer: self.peer, source })?;
        // Flush and let the socket close on drop; the device hangs up after
        // it has read the response.
        self.stream
            .shutdown()
            .await
            .map_err(|source| ConnectionError::Io { peer: self.peer, source })?;
        debug!(peer = %self.peer, "response sent, closing");
        Ok(())
    }

    /// Reads until one complete frame has been reassembled.
    async fn read_request(&mut self) -> Result<(FrameHeader, FramePayload), ConnectionError> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(complete) = self.try_parse()? {
                return Ok(complete);
            }

            let read = tokio::time::timeout(self.idle_timeout, self.stream.read(&mut chunk))
                .await
                .map_err(|_| ConnectionError::IdleTimeout {
                    peer: self.peer,
                    timeout: self.idle_timeout,
                })?
                .map_err(|source| ConnectionError::Io { peer: self.peer, source })?;

            if read == 0 {
                // A clean close would only be acceptable after a full
                // exchange; mid-frame it means the peer gave up.
                return Err(ConnectionError::PeerClosed(self.peer));
            }
            self.recv_buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Advances the staged decoders as far as the buffered bytes allow.
    ///
    /// Consumed bytes are drained from the buffer only after each stage
    /// completes, so a frame split across any number of reads is consumed
    /// exactly once.
    fn try_parse(&mut self) -> Result<Option<(FrameHeader, FramePayload)>, ConnectionError> {
        if self.header_len.is_none() {
            if let Some((len, consumed)) = decode_header_len(&self.recv_buf) {
                self.header_len = Some(len);
                self.recv_buf.drain(..consumed);
            }
        }

        if self.header.is_none() {
            if let Some(len) = self.header_len {
                match decode_header(&self.recv_buf, len) {
                    Ok(Some((header, consumed))) => {
                        self.header = Some(header);
                        self.recv_buf.drain(..consumed);
                    }
                    Ok(None) => return Ok(None),
                    Err(source) => {
                        return Err(ConnectionError::Frame { peer: self.peer, source })
                    }
                }
            }
        }

        if let Some(header) = self.header.clone() {
            match decode_payload(&self.recv_buf, &header) {
                Ok(Some((payload, consumed))) => {
                    self.recv_buf.drain(..consumed);
                    return Ok(Some((header, payload)));
                }
                Ok(None) => return Ok(None),
                Err(source) => {
                    return Err(ConnectionError::Frame { peer: self.peer, source })
                }
            }
        }
        Ok(None)
    }
}

/// Builds the encoded response frame for a reassembled request.
///
/// JSON requests are verified against the registry and key table; a
/// successful pin records an authorization grant before the response is
/// framed. Non-JSON requests get the diagnostic binary echo. Requests
/// missing `user` or `pin` get an error string naming the field — the
/// connection is not torn down for that.
pub fn build_response(
    payload: &FramePayload,
    registry: &Registry,
    keys: &SecretKeyTable,
    now: u64,
) -> Result<Vec<u8>, FrameError> {
    match payload {
        FramePayload::Json(value) => {
            let response = match AuthRequest::from_value(value) {
                Ok(request) => {
                    if verify_pin(&request.user, &request.pin, registry, keys, now) {
                        registry.grant_authorization(&request.user, now);
                        debug!(user = %request.user, "pin verified, authorization granted");
                        AuthResponse::granted()
                    } else {
                        warn!(user = %request.user, "pin verification failed");
                        AuthResponse::denied()
                    }
                }
                Err(field) => AuthResponse::missing_field(field),
            };
            let body = serde_json::to_vec(&response)
                .map_err(|e| FrameError::MalformedPayload(e.to_string()))?;
            encode_frame(&body, CONTENT_TYPE_JSON, ENCODING_UTF8)
        }
        FramePayload::Binary(bytes) => {
            let mut body = b"First 10 bytes of request: ".to_vec();
            body.extend_from_slice(&bytes[..bytes.len().min(BINARY_ECHO_LEN)]);
            encode_frame(&body, CONTENT_TYPE_BINARY_ECHO, ENCODING_BINARY)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use duofa_core::protocol::codec::decode_frame;
    use duofa_core::protocol::messages::RESULT_DENIED;
    use serde_json::json;
    use std::collections::HashMap;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn empty_state() -> (Registry, SecretKeyTable) {
        (Registry::new(), SecretKeyTable::default())
    }

    fn encode_request(value: &serde_json::Value) -> Vec<u8> {
        let body = serde_json::to_vec(value).unwrap();
        encode_frame(&body, CONTENT_TYPE_JSON, ENCODING_UTF8).unwrap()
    }

    fn response_result(frame: &[u8]) -> String {
        let (_, payload, _) = decode_frame(frame).unwrap().unwrap();
        match payload {
            FramePayload::Json(value) => value["result"].as_str().unwrap().to_string(),
            FramePayload::Binary(_) => panic!("expected JSON response"),
        }
    }

    // ── build_response ────────────────────────────────────────────────────────

    #[test]
    fn test_unknown_user_is_denied_not_distinguished() {
        let (registry, keys) = empty_state();
        let payload = FramePayload::Json(json!({"user": "ghost", "pin": "00"}));
        let frame = build_response(&payload, &registry, &keys, 1_000).unwrap();
        assert_eq!(response_result(&frame), RESULT_DENIED);
    }

    #[test]
    fn test_correct_pin_grants_authorization() {
        let registry = Registry::new();
        let identifier = registry.issue_identifier("alice", 1_000);
        let keys = SecretKeyTable::from_map(HashMap::from([(
            "alice".to_string(),
            "k1".to_string(),
        )]));
        let pin = duofa_core::generate_pin(identifier, b"k1", 1_000);

        let payload = FramePayload::Json(json!({"user": "alice", "pin": pin}));
        let frame = build_response(&payload, &registry, &keys, 1_000).unwrap();

        assert_eq!(response_result(&frame), "Authorization granted.");
        assert!(registry.is_authorized("alice", 1_000));
    }

    #[test]
    fn test_wrong_pin_does_not_grant() {
        let registry = Registry::new();
        registry.issue_identifier("alice", 1_000);
        let keys = SecretKeyTable::from_map(HashMap::from([(
            "alice".to_string(),
            "k1".to_string(),
        )]));

        let payload = FramePayload::Json(json!({"user": "alice", "pin": "ff00"}));
        let frame = build_response(&payload, &registry, &keys, 1_000).unwrap();

        assert_eq!(response_result(&frame), RESULT_DENIED);
        assert!(!registry.is_authorized("alice", 1_000));
    }

    #[test]
    fn test_request_missing_pin_names_the_field() {
        let (registry, keys) = empty_state();
        let payload = FramePayload::Json(json!({"user": "alice"}));
        let frame = build_response(&payload, &registry, &keys, 1_000).unwrap();
        assert_eq!(response_result(&frame), "Error: missing field 'pin'.");
    }

    #[test]
    fn test_binary_request_echoes_first_ten_bytes() {
        let (registry, keys) = empty_state();
        let payload = FramePayload::Binary(b"0123456789ABCDEF".to_vec());
        let frame = build_response(&payload, &registry, &keys, 1_000).unwrap();

        let (header, echoed, _) = decode_frame(&frame).unwrap().unwrap();
        assert_eq!(header.content_type, CONTENT_TYPE_BINARY_ECHO);
        assert_eq!(
            echoed,
            FramePayload::Binary(b"First 10 bytes of request: 0123456789".to_vec())
        );
    }

    #[test]
    fn test_short_binary_request_echoes_what_there_is() {
        let (registry, keys) = empty_state();
        let payload = FramePayload::Binary(b"abc".to_vec());
        let frame = build_response(&payload, &registry, &keys, 1_000).unwrap();

        let (_, echoed, _) = decode_frame(&frame).unwrap().unwrap();
        assert_eq!(
            echoed,
            FramePayload::Binary(b"First 10 bytes of request: abc".to_vec())
        );
    }

    // ── ServerConnection over scripted I/O ────────────────────────────────────

    /// Drives a full exchange where the request arrives in three fragments:
    /// mid-prefix, mid-header, then the rest. The response must still be a
    /// single well-formed frame.
    #[tokio::test]
    async fn test_serve_reassembles_fragmented_request() {
        let (registry, keys) = empty_state();
        let request = encode_request(&json!({"user": "ghost", "pin": "00"}));
        let expected = build_response(
            &FramePayload::Json(json!({"user": "ghost", "pin": "00"})),
            &registry,
            &keys,
            unix_now(),
        )
        .unwrap();

        let stream = tokio_test::io::Builder::new()
            .read(&request[..1])
            .read(&request[1..10])
            .read(&request[10..])
            .write(&expected)
            .build();

        let connection = ServerConnection::new(stream, peer(), Duration::from_secs(5));
        connection.serve(&registry, &keys).await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_handles_single_read_request() {
        let (registry, keys) = empty_state();
        let request = encode_request(&json!({"user": "alice"}));
        let expected = build_response(
            &FramePayload::Json(json!({"user": "alice"})),
            &registry,
            &keys,
            unix_now(),
        )
        .unwrap();

        let stream = tokio_test::io::Builder::new()
            .read(&request)
            .write(&expected)
            .build();

        let connection = ServerConnection::new(stream, peer(), Duration::from_secs(5));
        connection.serve(&registry, &keys).await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_rejects_header_with_missing_key() {
        let (registry, keys) = empty_state();
        // Hand-build a frame whose header lacks 'content-length'.
        let header = br#"{"byteorder":"little","content-type":"text/json","content-encoding":"utf-8"}"#;
        let mut wire = (header.len() as u16).to_be_bytes().to_vec();
        wire.extend_from_slice(header);

        let stream = tokio_test::io::Builder::new().read(&wire).build();
        let connection = ServerConnection::new(stream, peer(), Duration::from_secs(5));
        let err = connection.serve(&registry, &keys).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::Frame {
                source: FrameError::MissingHeaderKey("content-length"),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_serve_peer_close_mid_frame_is_peer_closed() {
        let (registry, keys) = empty_state();
        let request = encode_request(&json!({"user": "alice", "pin": "00"}));

        // Deliver half the frame, then EOF.
        let stream = tokio_test::io::Builder::new()
            .read(&request[..request.len() / 2])
            .build();

        let connection = ServerConnection::new(stream, peer(), Duration::from_secs(5));
        let err = connection.serve(&registry, &keys).await.unwrap_err();
        assert!(matches!(err, ConnectionError::PeerClosed(_)));
    }

    #[tokio::test]
    async fn test_serve_times_out_when_payload_withheld() {
        let (registry, keys) = empty_state();
        let request = encode_request(&json!({"user": "alice", "pin": "00"}));

        // An in-memory duplex that never delivers the payload half and is
        // never closed: only the idle timeout can end this connection.
        let (mut client, server) = tokio::io::duplex(1024);
        client.write_all(&request[..request.len() - 4]).await.unwrap();

        let connection =
            ServerConnection::new(server, peer(), Duration::from_millis(50));
        let err = connection.serve(&registry, &keys).await.unwrap_err();
        assert!(matches!(err, ConnectionError::IdleTimeout { .. }));
        drop(client);
    }
}
