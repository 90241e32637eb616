//! The 256-entry channel table.
//!
//! Generic over the connection handle type `H` so this crate stays free
//! of any I/O dependency; `bridge-dispatcher` instantiates it with its
//! own local-endpoint connection type.

use bridge_core::constants::CHANNEL_COUNT;
use bridge_core::types::ChannelId;
use bridge_protocol::stats::ChannelStats;

/// A channel is either waiting for a local client to connect, or
/// actively forwarding to one.
#[derive(Debug)]
pub enum ChannelSlot<H> {
    Listening,
    Connected(H),
}

impl<H> ChannelSlot<H> {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelSlot::Connected(_))
    }
}

/// Per-channel connection state plus the statistics counters that ride
/// alongside it.
pub struct ChannelTable<H> {
    slots: Vec<ChannelSlot<H>>,
    stats: Vec<ChannelStats>,
}

impl<H> Default for ChannelTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ChannelTable<H> {
    #[must_use]
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(CHANNEL_COUNT);
        slots.resize_with(CHANNEL_COUNT, || ChannelSlot::Listening);
        Self {
            slots,
            stats: vec![ChannelStats::default(); CHANNEL_COUNT],
        }
    }

    #[must_use]
    pub fn slot(&self, channel: ChannelId) -> &ChannelSlot<H> {
        &self.slots[channel.as_usize()]
    }

    pub fn connect(&mut self, channel: ChannelId, handle: H) {
        self.slots[channel.as_usize()] = ChannelSlot::Connected(handle);
    }

    /// Returns the handle to a channel that was connected, putting the
    /// slot back to `Listening`.
    pub fn disconnect(&mut self, channel: ChannelId) -> Option<H> {
        match std::mem::replace(&mut self.slots[channel.as_usize()], ChannelSlot::Listening) {
            ChannelSlot::Connected(handle) => Some(handle),
            ChannelSlot::Listening => None,
        }
    }

    #[must_use]
    pub fn connected_handle(&self, channel: ChannelId) -> Option<&H> {
        match &self.slots[channel.as_usize()] {
            ChannelSlot::Connected(handle) => Some(handle),
            ChannelSlot::Listening => None,
        }
    }

    #[must_use]
    pub fn stats(&self, channel: ChannelId) -> &ChannelStats {
        &self.stats[channel.as_usize()]
    }

    #[must_use]
    pub fn all_stats(&self) -> &[ChannelStats] {
        &self.stats
    }

    /// A DATA frame for `channel` arrived over the serial link.
    pub fn record_serial_received(&mut self, channel: ChannelId) {
        self.stats[channel.as_usize()].serial_received += 1;
    }

    /// A payload for `channel` was handed to its downstream consumer
    /// (a connected local client, or a built-in consumer).
    pub fn record_domain_forwarded(&mut self, channel: ChannelId) {
        self.stats[channel.as_usize()].domain_forwarded += 1;
    }

    /// A message for `channel` was read off its connected local client.
    pub fn record_domain_received(&mut self, channel: ChannelId) {
        self.stats[channel.as_usize()].domain_received += 1;
    }

    /// A DATA frame for `channel` was written onto the serial link.
    pub fn record_serial_forwarded(&mut self, channel: ChannelId) {
        self.stats[channel.as_usize()].serial_forwarded += 1;
    }

    /// Records a delivery that had nowhere to go. The per-channel
    /// counter always increments; the return value tells the caller
    /// whether the *global* drop counter should too. Channels 1 and 3
    /// run a built-in consumer that already handled the payload, so a
    /// missing client there isn't a genuine drop the way it is on a
    /// general-purpose channel.
    pub fn record_drop_not_connected(&mut self, channel: ChannelId) -> bool {
        self.stats[channel.as_usize()].drop_notconnected += 1;
        channel != ChannelId::STDIN && channel != ChannelId::TUNNEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_is_all_listening() {
        let table: ChannelTable<u32> = ChannelTable::new();
        assert!(!table.slot(ChannelId::new(4)).is_connected());
    }

    #[test]
    fn connect_then_disconnect_round_trips() {
        let mut table: ChannelTable<u32> = ChannelTable::new();
        table.connect(ChannelId::new(4), 42);
        assert!(table.slot(ChannelId::new(4)).is_connected());
        assert_eq!(table.connected_handle(ChannelId::new(4)), Some(&42));

        let handle = table.disconnect(ChannelId::new(4));
        assert_eq!(handle, Some(42));
        assert!(!table.slot(ChannelId::new(4)).is_connected());
    }

    #[test]
    fn drop_not_connected_exempts_stdin_and_tunnel_from_global_count() {
        let mut table: ChannelTable<u32> = ChannelTable::new();
        assert!(!table.record_drop_not_connected(ChannelId::STDIN));
        assert!(!table.record_drop_not_connected(ChannelId::TUNNEL));
        assert!(table.record_drop_not_connected(ChannelId::new(4)));

        assert_eq!(table.stats(ChannelId::STDIN).drop_notconnected, 1);
        assert_eq!(table.stats(ChannelId::TUNNEL).drop_notconnected, 1);
        assert_eq!(table.stats(ChannelId::new(4)).drop_notconnected, 1);
    }

    #[test]
    fn record_serial_and_domain_directions_update_independent_counters() {
        let mut table: ChannelTable<u32> = ChannelTable::new();
        table.record_serial_forwarded(ChannelId::new(4));
        table.record_serial_received(ChannelId::new(4));
        table.record_domain_received(ChannelId::new(4));
        table.record_domain_forwarded(ChannelId::new(4));
        let stats = table.stats(ChannelId::new(4));
        assert_eq!(stats.serial_forwarded, 1);
        assert_eq!(stats.serial_received, 1);
        assert_eq!(stats.domain_received, 1);
        assert_eq!(stats.domain_forwarded, 1);
    }

    use rstest::rstest;

    #[rstest]
    #[case(ChannelId::LINK_CONTROL, true)]
    #[case(ChannelId::STDIN, false)]
    #[case(ChannelId::COMMAND, true)]
    #[case(ChannelId::TUNNEL, false)]
    #[case(ChannelId::new(4), true)]
    #[case(ChannelId::new(255), true)]
    fn drop_not_connected_counts_toward_global_table(#[case] channel: ChannelId, #[case] counts_global: bool) {
        let mut table: ChannelTable<u32> = ChannelTable::new();
        assert_eq!(table.record_drop_not_connected(channel), counts_global);
    }
}
