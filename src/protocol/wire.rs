//! Wire protocol utilities
//!
//! Length-prefixed framing: a 4-byte big-endian length `L`, then `L` bytes
//! holding the message ID and payload. `L == 0` is a keep-alive.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use super::Message;
use crate::error::{TorrentError, TorrentResult};

/// Largest frame accepted from a peer: a 16 KiB block with headroom, plus the
/// piece header. Anything bigger is a broken or hostile peer.
pub const MAX_FRAME_LENGTH: usize = (1 << 20) + 13;

/// One unit read off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Zero-length frame; carries nothing and must not end any wait loop
    KeepAlive,
    Message(Message),
}

impl Frame {
    /// Serialize the frame to bytes (including length prefix)
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(self, &mut buf);
        buf.to_vec()
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        Frame::Message(message)
    }
}

/// Read exactly one frame from the stream
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> TorrentResult<Frame> {
    let mut length_buf = [0u8; 4];
    reader.read_exact(&mut length_buf).await?;
    let length = u32::from_be_bytes(length_buf) as usize;

    if length == 0 {
        trace!("Received KeepAlive frame");
        return Ok(Frame::KeepAlive);
    }
    check_length(length)?;

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    let id = body[0];
    body.remove(0);
    trace!("Received frame: id={}, payload_len={}", id, body.len());
    Ok(Frame::Message(Message::new(id, body)))
}

/// Write one frame to the stream and flush it
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> TorrentResult<()> {
    let serialized = frame.serialize();
    writer.write_all(&serialized).await?;
    writer.flush().await?;
    Ok(())
}

/// Append the wire form of `frame` to `buf`
pub fn encode_frame(frame: &Frame, buf: &mut BytesMut) {
    match frame {
        Frame::KeepAlive => buf.put_u32(0),
        Frame::Message(message) => {
            buf.reserve(4 + message.length() as usize);
            buf.put_u32(message.length());
            buf.put_u8(message.id);
            buf.put_slice(&message.payload);
        }
    }
}

/// Take one complete frame off the front of a partial-read buffer
///
/// Returns `Ok(None)` and leaves the buffer untouched until the whole frame
/// has arrived.
pub fn decode_frame(buf: &mut BytesMut) -> TorrentResult<Option<Frame>> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if length == 0 {
        buf.advance(4);
        return Ok(Some(Frame::KeepAlive));
    }
    check_length(length)?;

    if buf.len() < 4 + length {
        return Ok(None);
    }

    buf.advance(4);
    let body = buf.split_to(length);
    let id = body[0];
    Ok(Some(Frame::Message(Message::new(id, body[1..].to_vec()))))
}

fn check_length(length: usize) -> TorrentResult<()> {
    if length > MAX_FRAME_LENGTH {
        return Err(TorrentError::session_error(format!(
            "Frame length {} exceeds maximum of {}",
            length, MAX_FRAME_LENGTH
        )));
    }
    Ok(())
}
