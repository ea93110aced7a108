//! Client connection to the identity server.
//!
//! One authentication attempt is one short-lived TCP connection: dial,
//! write the request frame, then buffer reads until the server's response
//! frame reassembles, and hang up. The read side mirrors the server's
//! engine — TCP may deliver the response in fragments, so the staged
//! decoders run over an accumulating buffer and the buffer advances only on
//! complete results.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use duofa_core::protocol::codec::{
    decode_header, decode_header_len, decode_payload, FrameError,
};
use duofa_core::protocol::messages::{AuthResponse, FrameHeader, FramePayload};
use duofa_core::unix_now;

use crate::application::authenticate::build_auth_frame;
use crate::domain::session::DeviceSession;

/// How many bytes each read call asks the socket for.
const READ_CHUNK: usize = 4096;

/// Errors for a device-side authentication attempt.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The socket failed mid-exchange.
    #[error("I/O error talking to the server: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be framed.
    #[error("failed to encode request: {0}")]
    Encode(FrameError),

    /// The server's response violates the frame contract.
    #[error("protocol violation in server response: {0}")]
    Frame(FrameError),

    /// The server hung up before a complete response arrived.
    #[error("server closed the connection before responding")]
    PeerClosed,

    /// The response frame decoded but is not a recognizable result.
    #[error("unrecognizable server response: {0}")]
    MalformedReply(String),
}

/// Dials the session's server, submits a pin over `identifier`, and returns
/// the server's result string.
///
/// # Errors
///
/// Any [`ClientError`]. Note that `"Authentication failed."` is a *successful*
/// exchange from the transport's point of view — it comes back as `Ok`.
pub async fn authenticate(
    session: &DeviceSession,
    identifier: u32,
) -> Result<String, ClientError> {
    let frame = build_auth_frame(session, identifier, unix_now()).map_err(ClientError::Encode)?;
    let addr = session.server_addr();
    debug!(server = %addr, user = %session.user, "connecting");
    let mut stream = TcpStream::connect(&addr)
        .await
        .map_err(|source| ClientError::Connect {
            addr: addr.clone(),
            source,
        })?;
    exchange(&mut stream, &frame).await
}

/// Writes one request frame and reads one response frame.
///
/// Generic over the stream so tests can run the exchange over in-memory
/// pipes with a scripted server on the far end.
pub async fn exchange<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    frame: &[u8],
) -> Result<String, ClientError> {
    stream.write_all(frame).await?;
    stream.flush().await?;

    let (header, payload) = read_response(stream).await?;
    debug!(content_type = %header.content_type, "response reassembled");

    match payload {
        FramePayload::Json(value) => {
            let response: AuthResponse = serde_json::from_value(value)
                .map_err(|e| ClientError::MalformedReply(e.to_string()))?;
            Ok(response.result)
        }
        // The server only answers with binary when it was sent binary; a
        // JSON request getting one back is strange but displayable.
        FramePayload::Binary(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Buffers reads until one complete response frame reassembles.
async fn read_response<S: AsyncRead + Unpin>(
    stream: &mut S,
) -> Result<(FrameHeader, FramePayload), ClientError> {
    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut header_len: Option<u16> = None;
    let mut header: Option<FrameHeader> = None;

    loop {
        if header_len.is_none() {
            if let Some((len, consumed)) = decode_header_len(&buf) {
                header_len = Some(len);
                buf.drain(..consumed);
            }
        }
        if header.is_none() {
            if let Some(len) = header_len {
                if let Some((parsed, consumed)) =
                    decode_header(&buf, len).map_err(ClientError::Frame)?
                {
                    header = Some(parsed);
                    buf.drain(..consumed);
                }
            }
        }
        if let Some(parsed) = header.clone() {
            if let Some((payload, consumed)) =
                decode_payload(&buf, &parsed).map_err(ClientError::Frame)?
            {
                buf.drain(..consumed);
                return Ok((parsed, payload));
            }
        }

        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(ClientError::PeerClosed);
        }
        buf.extend_from_slice(&chunk[..read]);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
