//! Protocol client for the analysis server.
//!
//! A [`Connection`] wraps any byte stream in a
//! [`Framed`](tokio_util::codec::Framed) transport driven by
//! [`ContentLengthCodec`]. Sending is fallible; receiving is not: a timeout,
//! a closed peer and an unparsable header all surface as `None`, which
//! callers treat as "no response received". A body that is framed correctly
//! but is not JSON is dropped on its own and does not end the stream.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::protocol::codec::ContentLengthCodec;
use crate::{HarnessError, Result};

/// Connect timeout used by [`connect`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// An open, framed connection to the analysis server.
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    framed: Framed<S, ContentLengthCodec>,
    peer: String,
}

/// Dial `address` over TCP with [`DEFAULT_CONNECT_TIMEOUT`].
///
/// # Errors
///
/// See [`connect_timeout`].
pub async fn connect(address: &str) -> Result<Connection<TcpStream>> {
    connect_timeout(address, DEFAULT_CONNECT_TIMEOUT).await
}

/// Dial `address` over TCP, giving up after `timeout`.
///
/// # Errors
///
/// - [`HarnessError::Timeout`] if the connection is not established in time.
/// - [`HarnessError::Io`] if the connection is refused or unreachable.
pub async fn connect_timeout(address: &str, timeout: Duration) -> Result<Connection<TcpStream>> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
        .await
        .map_err(|_| {
            HarnessError::Timeout(format!("connecting to {address} exceeded {timeout:?}"))
        })?
        .map_err(|err| HarnessError::Io(format!("failed to connect to {address}: {err}")))?;
    stream.set_nodelay(true)?;
    debug!(peer = address, "protocol connection established");
    Ok(Connection::new(stream, address))
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-open stream.
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            framed: Framed::new(stream, ContentLengthCodec::new()),
            peer: peer.into(),
        }
    }

    /// Address or label of the remote side.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Frame and write `message`, then flush.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the write fails (for example after the
    /// server has exited).
    pub async fn send(&mut self, message: &Value) -> Result<()> {
        self.framed.send(message).await.map_err(|err| {
            warn!(peer = %self.peer, %err, "protocol send failed");
            err
        })
    }

    /// Read the next message, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout, when the peer closes the connection before
    /// a complete message arrives, or when the header cannot be parsed. A
    /// framed body that is not valid JSON also yields `None`, but only for
    /// that message: the next call decodes whatever follows it.
    pub async fn receive(&mut self, timeout: Duration) -> Option<Value> {
        match self.next_frame(timeout).await {
            Frame::Message(message) => Some(message),
            Frame::Malformed | Frame::Ended => None,
        }
    }

    /// Receive until a message whose `method` equals `method` arrives, or the
    /// overall `timeout` passes. Other messages and malformed bodies are
    /// discarded.
    pub async fn wait_for_method(&mut self, method: &str, timeout: Duration) -> Option<Value> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let message = match self.next_frame(remaining).await {
                Frame::Message(message) => message,
                Frame::Malformed => continue,
                Frame::Ended => return None,
            };
            if message.get("method").and_then(Value::as_str) == Some(method) {
                return Some(message);
            }
            debug!(peer = %self.peer, wanted = method, "skipping unrelated message");
        }
    }

    async fn next_frame(&mut self, timeout: Duration) -> Frame {
        match tokio::time::timeout(timeout, self.framed.next()).await {
            Err(_elapsed) => {
                debug!(peer = %self.peer, ?timeout, "protocol receive timed out");
                Frame::Ended
            }
            Ok(None) => {
                debug!(peer = %self.peer, "protocol connection closed");
                Frame::Ended
            }
            Ok(Some(Err(err))) => {
                warn!(peer = %self.peer, %err, "protocol receive failed");
                Frame::Ended
            }
            Ok(Some(Ok(Err(err)))) => {
                warn!(peer = %self.peer, %err, "discarding malformed message body");
                Frame::Malformed
            }
            Ok(Some(Ok(Ok(message)))) => Frame::Message(message),
        }
    }
}

/// Outcome of reading one frame.
enum Frame {
    Message(Value),
    /// Framed correctly, body unusable; the stream is still in sync.
    Malformed,
    /// Timeout, closed peer or unrecoverable framing error.
    Ended,
}
