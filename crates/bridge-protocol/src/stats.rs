//! Packed statistics snapshot layout.
//!
//! The snapshot is a fixed-size, little-endian binary blob: seven
//! global counters followed by five counters for each of the 256
//! channels. Its size is load-bearing — [`STATS_SNAPSHOT_SIZE`] must
//! stay in lockstep with this struct's field count.

use bridge_core::constants::{CHANNEL_COUNT, STATS_SNAPSHOT_SIZE};

/// Global, link-wide counters. Field order is the wire order: this is
/// the first 7 * 8 bytes of a [`StatsSnapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalStats {
    pub serial_received: u64,
    pub domain_forwarded: u64,
    pub domain_received: u64,
    pub serial_forwarded: u64,
    pub lost_frames: u64,
    pub bad_frames: u64,
    pub drop_notconnected: u64,
}

/// Per-channel counters, one instance per channel 0..256. Field order
/// is the wire order within each channel's 5 * 8-byte block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub serial_received: u64,
    pub domain_forwarded: u64,
    pub drop_notconnected: u64,
    pub domain_received: u64,
    pub serial_forwarded: u64,
}

/// A complete statistics snapshot, ready to be serialized onto a
/// client channel or printed on the periodic STATS tick.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub global: GlobalStats,
    pub channels: Vec<ChannelStats>,
}

impl StatsSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self {
            global: GlobalStats::default(),
            channels: vec![ChannelStats::default(); CHANNEL_COUNT],
        }
    }

    /// Serializes the snapshot to its packed little-endian wire form.
    ///
    /// Global fields first (in [`GlobalStats`] declaration order), then
    /// channel 0's fields, channel 1's, and so on (in [`ChannelStats`]
    /// declaration order).
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(STATS_SNAPSHOT_SIZE);
        let g = &self.global;
        for field in [
            g.serial_received,
            g.domain_forwarded,
            g.domain_received,
            g.serial_forwarded,
            g.lost_frames,
            g.bad_frames,
            g.drop_notconnected,
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        for c in &self.channels {
            for field in [
                c.serial_received,
                c.domain_forwarded,
                c.drop_notconnected,
                c.domain_received,
                c.serial_forwarded,
            ] {
                out.extend_from_slice(&field.to_le_bytes());
            }
        }
        debug_assert_eq!(out.len(), STATS_SNAPSHOT_SIZE);
        out
    }
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_to_exact_size() {
        let snapshot = StatsSnapshot::new();
        assert_eq!(snapshot.to_bytes().len(), STATS_SNAPSHOT_SIZE);
    }

    #[test]
    fn global_fields_appear_first_in_declaration_order() {
        let mut snapshot = StatsSnapshot::new();
        snapshot.global.serial_received = 1;
        snapshot.global.bad_frames = 7;
        let bytes = snapshot.to_bytes();
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 1);
        assert_eq!(u64::from_le_bytes(bytes[40..48].try_into().unwrap()), 7);
    }

    #[test]
    fn channel_fields_are_packed_after_globals() {
        let mut snapshot = StatsSnapshot::new();
        snapshot.channels[1].serial_received = 42;
        let bytes = snapshot.to_bytes();
        let offset = 7 * 8 + 5 * 8; // globals + channel 0's block
        assert_eq!(
            u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap()),
            42
        );
    }
}
