//! Property-based tests for the wire codec.
//!
//! These use proptest to generate random frames and verify that the
//! invariants from the wire format hold across the whole input space,
//! not just the handful of fixed examples in the unit tests.

use bridge_core::constants::{ESC, FRAME_END};
use bridge_core::types::{ChannelId, SeqNo};
use bridge_protocol::frame::{Frame, FrameType};
use bridge_protocol::stream_parser::{DecodeEvent, StreamParser};
use bytes::BytesMut;
use proptest::prelude::*;

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

/// Payloads up to a few KB, including plenty of ESC (0xBE) bytes so the
/// escape discipline gets exercised on every run.
fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop_oneof![3 => any::<u8>(), 1 => Just(0xBEu8)], 0..2048)
}

proptest! {
    /// spec.md §8 property 1: encode then decode yields the same
    /// frame_type, seqno, channel, and payload bytes for any payload
    /// and any channel.
    #[test]
    fn codec_round_trip(
        seqno in any::<u16>(),
        channel in any::<u8>(),
        payload in arb_payload(),
    ) {
        let frame = Frame::new(FrameType::Data, SeqNo(seqno), ChannelId::new(channel), &payload);
        let mut wire = BytesMut::new();
        frame.encode(&mut wire);

        match decode_one(&wire) {
            DecodeEvent::FrameReady { frame_type, seqno: got_seqno, channel: got_channel, payload: got_payload } => {
                prop_assert_eq!(frame_type, FrameType::Data);
                prop_assert_eq!(got_seqno, SeqNo(seqno));
                prop_assert_eq!(got_channel, ChannelId::new(channel));
                prop_assert_eq!(got_payload, payload);
            }
            other => prop_assert!(false, "expected FrameReady, got {:?}", other),
        }
    }

    /// spec.md §8 property 2: flipping any single bit of the
    /// inter-delimiter bytes (header or payload, post-escaping) causes
    /// the decoder to drop the frame rather than silently accept
    /// corrupted data. Restricted to strictly before the closing
    /// `ESC FRAME_END` so the real delimiter and checksum trailer are
    /// always left intact for the parser to run to completion against.
    #[test]
    fn single_bit_flip_is_always_rejected(
        seqno in any::<u16>(),
        channel in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 1..256),
        flip_index in any::<usize>(),
        bit_index in 0u32..8,
    ) {
        let frame = Frame::new(FrameType::Data, SeqNo(seqno), ChannelId::new(channel), &payload);
        let mut wire = BytesMut::new();
        frame.encode(&mut wire);

        let frame_end_at = wire
            .windows(2)
            .rposition(|w| w == [ESC, FRAME_END][..])
            .expect("encoded frame always carries a closing delimiter");

        // Candidate range is strictly between the opening delimiter and
        // the closing one; it is never empty, since the four-byte
        // header alone always encodes to at least four wire bytes.
        let flip_at = 2 + flip_index % (frame_end_at - 2);
        wire[flip_at] ^= 1u8 << bit_index;

        prop_assert_eq!(decode_one(&wire), DecodeEvent::FrameDropped);
    }

    /// spec.md §8 property 3: an arbitrary garbage prefix never
    /// prevents the decoder from resynchronizing on the next valid
    /// frame. The garbage excludes a literal ESC byte so it can never
    /// leave the parser mid-escape right at the boundary with the real
    /// frame that follows — a case spec.md's corruption rules already
    /// cover separately (a trailing ESC is itself the start of a new,
    /// still-in-flight frame, not "arbitrary garbage").
    #[test]
    fn resynchronizes_after_arbitrary_garbage(
        garbage in prop::collection::vec(any::<u8>().prop_filter("no literal ESC", |b| *b != ESC), 0..64),
        seqno in any::<u16>(),
        channel in any::<u8>(),
        payload in arb_payload(),
    ) {
        let frame = Frame::new(FrameType::Data, SeqNo(seqno), ChannelId::new(channel), &payload);
        let mut wire = BytesMut::new();
        frame.encode(&mut wire);

        let mut parser = StreamParser::new();
        for &b in &garbage {
            parser.feed(b);
        }

        let mut ready_payload = None;
        for &b in &wire {
            if let DecodeEvent::FrameReady { payload: got, .. } = parser.feed(b) {
                ready_payload = Some(got);
            }
        }
        prop_assert_eq!(ready_payload, Some(payload));
    }
}
