//! Receive state machine for the serial link.
//!
//! Consumes decoded bytes one at a time, assembles a frame, validates
//! its checksum, and emits an event per byte. No heap allocation
//! happens on the steady-state path beyond the one payload buffer,
//! which is cleared (not reallocated) between frames.
//!
//! # State Machine
//!
//! ```text
//! WaitFrameStart -> WaitFrameType -> WaitSeqnoLo -> WaitSeqnoHi -> WaitChannel -> InFrame
//!        ^                                                                        │
//!        │                                                                        │ FRAME_END
//!        │                                                                        v
//!        └──────────────────────── frame ready / dropped ──── WaitChecksumHi <- WaitChecksumLo
//! ```
//!
//! Every state returns to `WaitFrameStart` on frame completion,
//! corruption, or an out-of-place `FRAME_START`.

use bridge_core::constants::{ESC, FRAME_END, FRAME_START, LITERAL_ESC, MTU};
use bridge_core::types::{ChannelId, SeqNo};

use crate::fletcher::FletcherAccumulator;
use crate::frame::FrameType;

/// Current position within a single frame's header/payload/checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    WaitFrameStart,
    WaitFrameType,
    WaitSeqnoLo,
    WaitSeqnoHi,
    WaitChannel,
    InFrame,
    WaitChecksumLo,
    WaitChecksumHi,
}

/// What happened as a result of feeding one byte to the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// Nothing completed yet; keep feeding bytes.
    None,
    /// A complete, checksum-valid frame is ready.
    FrameReady {
        frame_type: FrameType,
        seqno: SeqNo,
        channel: ChannelId,
        payload: Vec<u8>,
    },
    /// The in-progress frame was corrupt (bad escape, MTU overflow, or
    /// checksum mismatch) and has been discarded. The caller must send
    /// a NACK.
    FrameDropped,
}

/// Stateful byte-at-a-time decoder for the escape-framed wire protocol.
pub struct StreamParser {
    state: ParserState,
    in_escape: bool,
    checksum: FletcherAccumulator,
    frame_type: u8,
    seqno_lo: u8,
    seqno_hi: u8,
    channel: u8,
    payload: Vec<u8>,
    checksum_lo: u8,
    checksum_rx: u16,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParserState::WaitFrameStart,
            in_escape: false,
            checksum: FletcherAccumulator::new(),
            frame_type: 0,
            seqno_lo: 0,
            seqno_hi: 0,
            channel: 0,
            payload: Vec::with_capacity(256),
            checksum_lo: 0,
            checksum_rx: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Feeds a single raw (pre-unescaping) byte read from the serial
    /// line to the parser.
    pub fn feed(&mut self, byte: u8) -> DecodeEvent {
        if !self.in_escape {
            if byte == ESC {
                self.in_escape = true;
                return DecodeEvent::None;
            }
            return self.advance(byte, false);
        }

        self.in_escape = false;
        match byte {
            LITERAL_ESC => self.advance(ESC, true),
            FRAME_START => {
                let was_mid_frame = self.state != ParserState::WaitFrameStart;
                self.begin_new_frame();
                // Open question in the design notes: an out-of-place
                // FRAME_START silently abandons the in-progress frame
                // and begins a new one; no FrameDropped is emitted for
                // the abandoned frame.
                let _ = was_mid_frame;
                DecodeEvent::None
            }
            FRAME_END => {
                if self.state == ParserState::InFrame {
                    self.state = ParserState::WaitChecksumLo;
                    DecodeEvent::None
                } else {
                    self.reset_to_idle();
                    DecodeEvent::FrameDropped
                }
            }
            _ => {
                // ESC followed by anything else is corrupt.
                self.reset_to_idle();
                DecodeEvent::FrameDropped
            }
        }
    }

    /// Feeds a slice of bytes, collecting every non-`None` event.
    pub fn feed_slice(&mut self, bytes: &[u8], events: &mut Vec<DecodeEvent>) {
        for &b in bytes {
            let event = self.feed(b);
            if event != DecodeEvent::None {
                events.push(event);
            }
        }
    }

    fn begin_new_frame(&mut self) {
        self.checksum.reset();
        self.payload.clear();
        self.state = ParserState::WaitFrameType;
    }

    fn reset_to_idle(&mut self) {
        self.state = ParserState::WaitFrameStart;
        self.payload.clear();
    }

    /// Advances the current state with one logical (already
    /// unescaped) byte. `was_escaped_literal` is true only for a byte
    /// that arrived as `ESC LITERAL_ESC`.
    fn advance(&mut self, byte: u8, was_escaped_literal: bool) -> DecodeEvent {
        let _ = was_escaped_literal;
        match self.state {
            ParserState::WaitFrameStart => {
                // Stray byte before any frame started; discarded.
                DecodeEvent::None
            }
            ParserState::WaitFrameType => {
                self.checksum.update_byte(byte);
                self.frame_type = byte;
                self.state = ParserState::WaitSeqnoLo;
                DecodeEvent::None
            }
            ParserState::WaitSeqnoLo => {
                self.checksum.update_byte(byte);
                self.seqno_lo = byte;
                self.state = ParserState::WaitSeqnoHi;
                DecodeEvent::None
            }
            ParserState::WaitSeqnoHi => {
                self.checksum.update_byte(byte);
                self.seqno_hi = byte;
                self.state = ParserState::WaitChannel;
                DecodeEvent::None
            }
            ParserState::WaitChannel => {
                self.checksum.update_byte(byte);
                self.channel = byte;
                self.state = ParserState::InFrame;
                DecodeEvent::None
            }
            ParserState::InFrame => {
                if self.payload.len() >= MTU {
                    self.reset_to_idle();
                    return DecodeEvent::FrameDropped;
                }
                self.checksum.update_byte(byte);
                self.payload.push(byte);
                DecodeEvent::None
            }
            ParserState::WaitChecksumLo => {
                self.checksum_lo = byte;
                self.state = ParserState::WaitChecksumHi;
                DecodeEvent::None
            }
            ParserState::WaitChecksumHi => {
                self.checksum_rx = u16::from_le_bytes([self.checksum_lo, byte]);
                self.finish_frame()
            }
        }
    }

    fn finish_frame(&mut self) -> DecodeEvent {
        let computed = self.checksum.finalize();
        let event = if computed == self.checksum_rx {
            DecodeEvent::FrameReady {
                frame_type: FrameType::from_u8(self.frame_type),
                seqno: SeqNo::from_le_bytes([self.seqno_lo, self.seqno_hi]),
                channel: ChannelId::new(self.channel),
                payload: std::mem::take(&mut self.payload),
            }
        } else {
            DecodeEvent::FrameDropped
        };
        self.state = ParserState::WaitFrameStart;
        self.payload.clear();
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use bytes::BytesMut;

    fn decode_one(wire: &[u8]) -> DecodeEvent {
        let mut parser = StreamParser::new();
        let mut last = DecodeEvent::None;
        for &b in wire {
            let event = parser.feed(b);
            if event != DecodeEvent::None {
                last = event;
            }
        }
        last
    }

    #[test]
    fn round_trip_simple_payload() {
        let seqno = SeqNo(42);
        let payload = [1u8, 2, 3, 4];
        let frame = Frame::new(FrameType::Data, seqno, ChannelId::new(4), &payload);
        let mut wire = BytesMut::new();
        frame.encode(&mut wire);

        match decode_one(&wire) {
            DecodeEvent::FrameReady {
                frame_type,
                seqno: got_seqno,
                channel,
                payload: got_payload,
            } => {
                assert_eq!(frame_type, FrameType::Data);
                assert_eq!(got_seqno, seqno);
                assert_eq!(channel, ChannelId::new(4));
                assert_eq!(got_payload, payload);
            }
            other => panic!("expected FrameReady, got {other:?}"),
        }
    }

    #[test]
    fn round_trip_payload_with_escape_bytes() {
        let seqno = SeqNo(7);
        let payload = [0xBEu8, 0x00, 0xBE, 0xBE];
        let frame = Frame::new(FrameType::Data, seqno, ChannelId::new(9), &payload);
        let mut wire = BytesMut::new();
        frame.encode(&mut wire);

        match decode_one(&wire) {
            DecodeEvent::FrameReady { payload: got, .. } => assert_eq!(got, payload),
            other => panic!("expected FrameReady, got {other:?}"),
        }
    }

    #[test]
    fn empty_payload_round_trips() {
        let frame = Frame::new(FrameType::Data, SeqNo(1), ChannelId::new(1), &[]);
        let mut wire = BytesMut::new();
        frame.encode(&mut wire);
        match decode_one(&wire) {
            DecodeEvent::FrameReady { payload, .. } => assert!(payload.is_empty()),
            other => panic!("expected FrameReady, got {other:?}"),
        }
    }

    #[test]
    fn checksum_bit_flip_is_dropped() {
        let frame = Frame::new(FrameType::Data, SeqNo(1), ChannelId::new(4), b"test");
        let mut wire = BytesMut::new();
        frame.encode(&mut wire);

        // Flip a bit in the transmitted checksum (last byte).
        let last = wire.len() - 1;
        wire[last] ^= 0x01;

        assert_eq!(decode_one(&wire), DecodeEvent::FrameDropped);
    }

    #[test]
    fn header_bit_flip_is_dropped() {
        let frame = Frame::new(FrameType::Data, SeqNo(1), ChannelId::new(4), b"test");
        let mut wire = BytesMut::new();
        frame.encode(&mut wire);

        // Byte 2 is the frame_type field.
        wire[2] ^= 0x01;
        assert_eq!(decode_one(&wire), DecodeEvent::FrameDropped);
    }

    #[test]
    fn resynchronizes_after_garbage_prefix() {
        let frame = Frame::new(FrameType::Data, SeqNo(99), ChannelId::new(2), b"hi");
        let mut wire = BytesMut::new();
        frame.encode(&mut wire);

        let mut garbage = vec![0x00u8, 0xFF, 0x10, ESC, 0x01 /* invalid escape byte */];
        garbage.extend_from_slice(&wire);

        let mut parser = StreamParser::new();
        let mut ready_count = 0;
        let mut last_payload = Vec::new();
        for &b in &garbage {
            if let DecodeEvent::FrameReady { payload, .. } = parser.feed(b) {
                ready_count += 1;
                last_payload = payload;
            }
        }
        assert_eq!(ready_count, 1);
        assert_eq!(last_payload, b"hi");
    }

    #[test]
    fn mid_frame_start_abandons_silently_and_begins_anew() {
        let first = Frame::new(FrameType::Data, SeqNo(1), ChannelId::new(1), b"abandoned");
        let second = Frame::new(FrameType::Data, SeqNo(2), ChannelId::new(2), b"kept");

        let mut first_wire = BytesMut::new();
        first.encode(&mut first_wire);
        let mut second_wire = BytesMut::new();
        second.encode(&mut second_wire);

        // Feed everything up to (not including) the first frame's own
        // closing delimiters, then immediately start the second frame.
        let cut = first_wire.len() - 4; // drop ESC FRAME_END + 2 checksum bytes
        let mut stream = Vec::new();
        stream.extend_from_slice(&first_wire[..cut]);
        stream.extend_from_slice(&second_wire);

        let mut parser = StreamParser::new();
        let mut events = Vec::new();
        parser.feed_slice(&stream, &mut events);

        // No FrameDropped for the abandoned frame; exactly one FrameReady for "kept".
        assert_eq!(events.len(), 1);
        match &events[0] {
            DecodeEvent::FrameReady { payload, .. } => assert_eq!(payload, b"kept"),
            other => panic!("expected FrameReady, got {other:?}"),
        }
    }

    #[test]
    fn mtu_overflow_drops_frame() {
        let mut parser = StreamParser::new();
        parser.feed(ESC);
        parser.feed(FRAME_START);
        parser.feed(FrameType::Data.as_u8());
        parser.feed(0);
        parser.feed(0);
        parser.feed(4); // channel

        let mut dropped = false;
        for _ in 0..=MTU {
            if parser.feed(0x41) == DecodeEvent::FrameDropped {
                dropped = true;
                break;
            }
        }
        assert!(dropped);
        assert_eq!(parser.state(), ParserState::WaitFrameStart);
    }
}
