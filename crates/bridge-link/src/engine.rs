//! Stop-and-wait ARQ over the escape-framed wire protocol.
//!
//! `LinkEngine` owns exactly the state needed to run the single-outstanding
//! -frame retransmit protocol: the outbound sequence counter, the one
//! retransmit slot, the last-received sequence number for duplicate
//! suppression, and the global statistics counters. It never reads or
//! writes a descriptor; callers hand it [`bridge_protocol::DecodeEvent`]s
//! and execute the [`LinkAction`]s it returns.

use std::time::{Duration, Instant};

use bridge_core::constants::REXMIT_TIMEOUT_MS;
use bridge_core::types::{ChannelId, SeqNo};
use bridge_protocol::frame::{Frame, FrameType};
use bridge_protocol::stats::GlobalStats;
use bridge_protocol::stream_parser::DecodeEvent;
use bytes::{Bytes, BytesMut};

/// What the caller must do in response to feeding the engine an event
/// or a timer deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Write an ACK for this sequence number onto the serial line.
    SendAck(SeqNo),
    /// Write a NACK onto the serial line.
    SendNack,
    /// Write these already-encoded bytes onto the serial line (a
    /// retransmission or a NACK-triggered resend).
    SendFrame(Bytes),
    /// A payload is ready for a channel consumer.
    Deliver { channel: ChannelId, payload: Vec<u8> },
}

struct RetransmitSlot {
    seqno: SeqNo,
    encoded: Bytes,
    deadline: Instant,
}

/// The stop-and-wait ARQ state machine for one serial link.
pub struct LinkEngine {
    next_send_seqno: SeqNo,
    slot: Option<RetransmitSlot>,
    last_rcvd_seqno: Option<SeqNo>,
    rexmit_timeout: Duration,
    /// The seven counters that make up the wire statistics snapshot.
    pub stats: GlobalStats,
    /// Diagnostic-only counters, not part of the wire snapshot layout.
    pub acks_received: u64,
    pub nacks_received: u64,
    pub retransmits: u64,
}

impl Default for LinkEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_send_seqno: SeqNo::ZERO,
            slot: None,
            last_rcvd_seqno: None,
            rexmit_timeout: Duration::from_millis(REXMIT_TIMEOUT_MS),
            stats: GlobalStats::default(),
            acks_received: 0,
            nacks_received: 0,
            retransmits: 0,
        }
    }

    /// True while a DATA frame is outstanding, unacked.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.slot.is_some()
    }

    /// The instant at which the outstanding frame, if any, should be
    /// retransmitted. Lets the caller arm a single timer rather than
    /// poll [`Self::on_rexmit_deadline`] on a fixed interval.
    #[must_use]
    pub fn rexmit_deadline(&self) -> Option<Instant> {
        self.slot.as_ref().map(|s| s.deadline)
    }

    /// Encodes and arms a new outbound DATA frame, if none is already
    /// outstanding. Returns `None` when the single-outstanding-frame
    /// rule forbids sending right now; the caller must wait for an ACK
    /// or a rexmit deadline before trying again.
    pub fn send_data(&mut self, channel: ChannelId, payload: &[u8], now: Instant) -> Option<Bytes> {
        if self.slot.is_some() {
            return None;
        }

        self.next_send_seqno = self.next_send_seqno.wrapping_add(1);
        let seqno = self.next_send_seqno;

        let frame = Frame::new(FrameType::Data, seqno, channel, payload);
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        let encoded = buf.freeze();

        self.slot = Some(RetransmitSlot {
            seqno,
            encoded: encoded.clone(),
            deadline: now + self.rexmit_timeout,
        });
        self.stats.serial_forwarded += 1;

        Some(encoded)
    }

    /// Checks the retransmit deadline. Returns the frame to resend, if
    /// it has expired; rearms the deadline for the next check.
    pub fn on_rexmit_deadline(&mut self, now: Instant) -> Option<Bytes> {
        let slot = self.slot.as_mut()?;
        if now < slot.deadline {
            return None;
        }
        slot.deadline = now + self.rexmit_timeout;
        self.retransmits += 1;
        Some(slot.encoded.clone())
    }

    /// Handles one decode event from the receive state machine.
    pub fn on_rx_event(&mut self, event: DecodeEvent, _now: Instant) -> Vec<LinkAction> {
        match event {
            DecodeEvent::None => Vec::new(),
            DecodeEvent::FrameDropped => {
                // spec.md S5: a corrupt frame counts as both bad and lost.
                self.stats.bad_frames += 1;
                self.stats.lost_frames += 1;
                vec![LinkAction::SendNack]
            }
            DecodeEvent::FrameReady {
                frame_type,
                seqno,
                channel,
                payload,
            } => self.on_frame_ready(frame_type, seqno, channel, payload),
        }
    }

    fn on_frame_ready(
        &mut self,
        frame_type: FrameType,
        seqno: SeqNo,
        channel: ChannelId,
        payload: Vec<u8>,
    ) -> Vec<LinkAction> {
        match frame_type {
            FrameType::Ack => {
                self.acks_received += 1;
                if self.slot.as_ref().is_some_and(|s| s.seqno == seqno) {
                    self.slot = None;
                }
                // An ACK for an unknown or already-cleared seqno is ignored.
                Vec::new()
            }
            FrameType::Nack => {
                self.nacks_received += 1;
                // Never respond to a NACK with another NACK: a NACK
                // either triggers a resend of the outstanding frame or,
                // if nothing is outstanding, a reminder ACK of the last
                // frame we successfully received.
                if let Some(slot) = &self.slot {
                    vec![LinkAction::SendFrame(slot.encoded.clone())]
                } else if let Some(last) = self.last_rcvd_seqno {
                    vec![LinkAction::SendAck(last)]
                } else {
                    Vec::new()
                }
            }
            FrameType::Data if channel == ChannelId::LINK_CONTROL => {
                // spec.md §4.4: channel 0 carries no user payload; any
                // type other than ACK/NACK arriving there is logged and
                // discarded rather than acked or delivered.
                tracing::debug!(?frame_type, "discarding non-control frame on channel 0");
                Vec::new()
            }
            FrameType::Data => {
                if self.last_rcvd_seqno == Some(seqno) {
                    // Duplicate: our previous ACK was lost. Re-ACK, don't re-deliver.
                    return vec![LinkAction::SendAck(seqno)];
                }

                if let Some(last) = self.last_rcvd_seqno {
                    self.stats.lost_frames += u64::from(last.gap_to(seqno));
                }
                self.last_rcvd_seqno = Some(seqno);
                self.stats.serial_received += 1;

                vec![LinkAction::SendAck(seqno), LinkAction::Deliver { channel, payload }]
            }
            FrameType::Heartbeat | FrameType::HeartbeatReply | FrameType::Unknown(_) => {
                tracing::debug!(?frame_type, "ignoring reserved or unknown frame type");
                Vec::new()
            }
        }
    }
}
