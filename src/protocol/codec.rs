//! `Content-Length` framing codec for analysis-server streams.
//!
//! Each message is a header block terminated by an empty line followed by a
//! UTF-8 JSON body whose exact byte length is given by the `Content-Length`
//! header:
//!
//! ```text
//! Content-Length: 27\r\n
//! \r\n
//! {"method":"ping","id":1}
//! ```
//!
//! Use [`ContentLengthCodec`] with [`tokio_util::codec::Framed`]. The decoder
//! splits off exactly one message at a time and leaves any following bytes in
//! the read buffer, so partial or coalesced deliveries never desynchronise
//! the stream.
//!
//! A correctly framed body that is not valid JSON is yielded as an inner
//! `Err` item rather than a codec error. The frame boundary is still known,
//! so the stream stays usable and the next message decodes normally.

use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};

use crate::{HarnessError, Result};

/// Sequence terminating the header block.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Maximum accepted header block size: 8 KiB.
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Maximum accepted body size: 64 MiB.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Header naming the body length.
const CONTENT_LENGTH: &str = "content-length";

/// Codec for `Content-Length`-framed JSON messages.
///
/// # Decoder
///
/// Returns `Ok(None)` until a full header block and body are buffered.
/// Returns [`HarnessError::Protocol`] for oversized headers or bodies and a
/// missing or unparsable `Content-Length`; after one of these the stream
/// cannot be resynchronised. A body that is not valid JSON is returned as
/// `Ok(Some(Err(_)))`. At end of input a partially buffered frame is
/// reported as [`HarnessError::ConnectionClosed`].
///
/// # Encoder
///
/// Serialises the value compactly and writes header and body into the
/// destination buffer together.
#[derive(Debug, Default)]
pub struct ContentLengthCodec {
    /// Body length of the message whose header was already consumed.
    pending_body: Option<usize>,
}

impl ContentLengthCodec {
    /// Create a codec with no buffered state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ContentLengthCodec {
    type Item = Result<Value>;
    type Error = HarnessError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Result<Value>>> {
        let body_len = match self.pending_body {
            Some(len) => len,
            None => {
                let Some(header_end) = find_terminator(src) else {
                    if src.len() > MAX_HEADER_BYTES {
                        return Err(HarnessError::Protocol(format!(
                            "header block exceeds {MAX_HEADER_BYTES} bytes"
                        )));
                    }
                    return Ok(None);
                };
                if header_end > MAX_HEADER_BYTES {
                    return Err(HarnessError::Protocol(format!(
                        "header block of {header_end} bytes exceeds {MAX_HEADER_BYTES} bytes"
                    )));
                }

                let len = parse_content_length(&src[..header_end])?;
                if len > MAX_BODY_BYTES {
                    return Err(HarnessError::Protocol(format!(
                        "body of {len} bytes exceeds {MAX_BODY_BYTES} bytes"
                    )));
                }

                src.advance(header_end + HEADER_TERMINATOR.len());
                self.pending_body = Some(len);
                len
            }
        };

        if src.len() < body_len {
            src.reserve(body_len - src.len());
            return Ok(None);
        }

        self.pending_body = None;
        let body = src.split_to(body_len);
        Ok(Some(serde_json::from_slice(&body).map_err(HarnessError::from)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Result<Value>>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() && self.pending_body.is_none() {
            return Ok(None);
        }
        let buffered = src.len();
        src.clear();
        self.pending_body = None;
        Err(HarnessError::ConnectionClosed(format!(
            "stream ended inside a frame with {buffered} bytes buffered"
        )))
    }
}

impl Encoder<Value> for ContentLengthCodec {
    type Error = HarnessError;

    fn encode(&mut self, item: Value, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&Value>>::encode(self, &item, dst)
    }
}

impl Encoder<&Value> for ContentLengthCodec {
    type Error = HarnessError;

    fn encode(&mut self, item: &Value, dst: &mut BytesMut) -> Result<()> {
        let body = serde_json::to_vec(item)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        dst.reserve(header.len() + body.len());
        dst.put_slice(header.as_bytes());
        dst.put_slice(&body);
        Ok(())
    }
}

/// Offset of the header terminator, if fully buffered.
fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

/// Extract the `Content-Length` value from a header block. Other headers
/// are ignored.
fn parse_content_length(header: &[u8]) -> Result<usize> {
    let text = std::str::from_utf8(header)
        .map_err(|err| HarnessError::Protocol(format!("header is not utf-8: {err}")))?;

    for line in text.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            return value.trim().parse::<usize>().map_err(|err| {
                HarnessError::Protocol(format!("invalid Content-Length {value:?}: {err}"))
            });
        }
    }

    Err(HarnessError::Protocol(
        "header block has no Content-Length".into(),
    ))
}
