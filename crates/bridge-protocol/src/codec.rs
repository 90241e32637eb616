//! Tokio codec for the local client wire protocol.
//!
//! Each channel's abstract-namespace Unix socket speaks the same
//! trivial framing: a 4-byte big-endian length prefix followed by
//! exactly that many payload bytes, capped at [`MTU`]. This is
//! independent of the serial link's escape framing — a client never
//! sees checksums, sequence numbers, or the channel byte, since the
//! socket it connected to already identifies the channel.
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use tokio::net::UnixStream;
//! use tokio_util::codec::Framed;
//! use bridge_protocol::LocalCodec;
//! use futures::{SinkExt, StreamExt};
//! use bytes::Bytes;
//!
//! # async fn example(stream: UnixStream) -> bridge_core::Result<()> {
//! let mut framed = Framed::new(stream, LocalCodec::new());
//! framed.send(Bytes::from_static(b"hello")).await?;
//! if let Some(Ok(payload)) = framed.next().await {
//!     println!("received {} bytes", payload.len());
//! }
//! # Ok(())
//! # }
//! ```

use bridge_core::constants::{LOCAL_LENGTH_PREFIX_SIZE, MTU};
use bridge_core::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// What the decoder is doing with the bytes currently in its buffer.
#[derive(Debug, Clone, Copy)]
enum DecodeState {
    /// Waiting for (or assembling) the next length prefix.
    AwaitingLength,
    /// Length known and within MTU; waiting for the full payload.
    AwaitingPayload(u32),
    /// A declared length exceeded MTU; draining and discarding the
    /// remaining bytes of that message so the stream resynchronizes on
    /// the next length prefix, per spec.md's local-client-overflow rule.
    Skipping(u32),
}

/// Length-prefixed framing for a single local client connection.
#[derive(Debug)]
pub struct LocalCodec {
    state: DecodeState,
}

impl Default for LocalCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCodec {
    #[must_use]
    pub fn new() -> Self {
        Self { state: DecodeState::AwaitingLength }
    }
}

impl Decoder for LocalCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.state {
                DecodeState::Skipping(remaining) => {
                    let take = remaining.min(src.len() as u32);
                    src.advance(take as usize);
                    let left = remaining - take;
                    if left == 0 {
                        self.state = DecodeState::AwaitingLength;
                        continue;
                    }
                    self.state = DecodeState::Skipping(left);
                    return Ok(None);
                }
                DecodeState::AwaitingLength => {
                    if src.len() < LOCAL_LENGTH_PREFIX_SIZE {
                        return Ok(None);
                    }
                    let len = u32::from_be_bytes(src[..LOCAL_LENGTH_PREFIX_SIZE].try_into().unwrap());
                    src.advance(LOCAL_LENGTH_PREFIX_SIZE);
                    if len as usize > MTU {
                        tracing::warn!(len, mtu = MTU, "oversize local client message, draining to resync");
                        self.state = DecodeState::Skipping(len);
                    } else {
                        self.state = DecodeState::AwaitingPayload(len);
                    }
                }
                DecodeState::AwaitingPayload(len) => {
                    if src.len() < len as usize {
                        src.reserve(len as usize - src.len());
                        return Ok(None);
                    }
                    let payload = src.split_to(len as usize).freeze();
                    self.state = DecodeState::AwaitingLength;
                    return Ok(Some(payload));
                }
            }
        }
    }
}

impl Encoder<Bytes> for LocalCodec {
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > MTU {
            return Err(Error::MessageTooLarge {
                len: item.len(),
                mtu: MTU,
            });
        }
        dst.reserve(LOCAL_LENGTH_PREFIX_SIZE + item.len());
        dst.put_u32(item.len() as u32);
        dst.put_slice(&item);
        Ok(())
    }
}
