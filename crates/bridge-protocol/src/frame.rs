//! Wire-level frame definition and encoding for the serial link.
//!
//! # Wire Format
//!
//! ```text
//! ESC FRAME_START  <escaped header and payload>  ESC FRAME_END  <escaped checksum lo, hi>
//! ```
//!
//! The header (`frame_type | seqno_lo | seqno_hi | channel`) is
//! escaped inline with the payload and contributes to the checksum;
//! the delimiters themselves do not.

use bridge_core::constants::{
    ESC, FRAME_END, FRAME_START, FRAME_TYPE_ACK, FRAME_TYPE_DATA, FRAME_TYPE_HB,
    FRAME_TYPE_HB_REPLY, FRAME_TYPE_NACK, LITERAL_ESC,
};
use bridge_core::types::{ChannelId, SeqNo};
use bytes::{BufMut, BytesMut};

use crate::fletcher::FletcherAccumulator;

/// Frame type discriminant.
///
/// HB and HB_REPLY are reserved: a decoder must accept them without
/// erroring, even though this implementation never emits them. Any
/// other on-wire value decodes to `Unknown` rather than failing, so a
/// future MCU-side frame type can't crash the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,
    Heartbeat,
    HeartbeatReply,
    Ack,
    Nack,
    Unknown(u8),
}

impl FrameType {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            FrameType::Data => FRAME_TYPE_DATA,
            FrameType::Heartbeat => FRAME_TYPE_HB,
            FrameType::HeartbeatReply => FRAME_TYPE_HB_REPLY,
            FrameType::Ack => FRAME_TYPE_ACK,
            FrameType::Nack => FRAME_TYPE_NACK,
            FrameType::Unknown(b) => b,
        }
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            FRAME_TYPE_DATA => FrameType::Data,
            FRAME_TYPE_HB => FrameType::Heartbeat,
            FRAME_TYPE_HB_REPLY => FrameType::HeartbeatReply,
            FRAME_TYPE_ACK => FrameType::Ack,
            FRAME_TYPE_NACK => FrameType::Nack,
            other => FrameType::Unknown(other),
        }
    }
}

/// A frame ready to be serialized onto the wire.
///
/// Borrows its payload so that encoding the retransmit slot's stored
/// frame never needs to copy it.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub frame_type: FrameType,
    pub seqno: SeqNo,
    pub channel: ChannelId,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    #[must_use]
    pub fn new(frame_type: FrameType, seqno: SeqNo, channel: ChannelId, payload: &'a [u8]) -> Self {
        Self {
            frame_type,
            seqno,
            channel,
            payload,
        }
    }

    #[must_use]
    pub fn ack(seqno: SeqNo) -> Self {
        Self::new(FrameType::Ack, seqno, ChannelId::LINK_CONTROL, &[])
    }

    #[must_use]
    pub fn nack() -> Self {
        Self::new(FrameType::Nack, SeqNo::ZERO, ChannelId::LINK_CONTROL, &[])
    }

    /// Appends the escaped byte sequence for this frame to `out`,
    /// including delimiters and the trailing checksum. Returns the
    /// Fletcher-16 checksum that was transmitted, mostly useful for
    /// tests.
    pub fn encode(&self, out: &mut BytesMut) -> u16 {
        out.reserve(self.wire_size_upper_bound());
        out.put_u8(ESC);
        out.put_u8(FRAME_START);

        let mut acc = FletcherAccumulator::new();
        let mut push_escaped = |out: &mut BytesMut, byte: u8| {
            acc.update_byte(byte);
            if byte == ESC {
                out.put_u8(ESC);
                out.put_u8(LITERAL_ESC);
            } else {
                out.put_u8(byte);
            }
        };

        push_escaped(out, self.frame_type.as_u8());
        let seq_bytes = self.seqno.to_le_bytes();
        push_escaped(out, seq_bytes[0]);
        push_escaped(out, seq_bytes[1]);
        push_escaped(out, self.channel.as_u8());
        for &b in self.payload {
            push_escaped(out, b);
        }

        out.put_u8(ESC);
        out.put_u8(FRAME_END);

        let checksum = acc.finalize();
        let cs_bytes = checksum.to_le_bytes();
        for &b in &cs_bytes {
            if b == ESC {
                out.put_u8(ESC);
                out.put_u8(LITERAL_ESC);
            } else {
                out.put_u8(b);
            }
        }

        checksum
    }

    /// Worst case every byte needs escaping, plus delimiters/checksum.
    fn wire_size_upper_bound(&self) -> usize {
        2 + 2 + 8 + self.payload.len() * 2 + 2 + 4
    }
}
