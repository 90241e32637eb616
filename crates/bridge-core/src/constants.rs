//! Core constants for the serial bridge wire protocol.
//!
//! These values are load-bearing: both the escape discipline and the
//! channel-table layout depend on exact agreement between host and MCU.

// ============================================================================
// Frame delimiters and escaping
// ============================================================================

/// Escape byte. Introduces either an escaped literal or a delimiter.
pub const ESC: u8 = 0xBE;

/// Start-of-frame delimiter, always preceded by [`ESC`].
pub const FRAME_START: u8 = 0xEF;

/// End-of-frame delimiter, always preceded by [`ESC`].
pub const FRAME_END: u8 = 0xE5;

/// Marks an escaped literal [`ESC`] byte inside the escaped region.
pub const LITERAL_ESC: u8 = 0x55;

// ============================================================================
// Frame types
// ============================================================================

/// Data frame carrying a channel payload.
pub const FRAME_TYPE_DATA: u8 = 0x1;

/// Reserved heartbeat frame. Must not crash a decoder that encounters it.
pub const FRAME_TYPE_HB: u8 = 0x2;

/// Reserved heartbeat reply.
pub const FRAME_TYPE_HB_REPLY: u8 = 0x3;

/// Positive acknowledgment, always on channel 0.
pub const FRAME_TYPE_ACK: u8 = 0x4;

/// Negative acknowledgment, always on channel 0 with seqno 0.
pub const FRAME_TYPE_NACK: u8 = 0x5;

// ============================================================================
// Sizing
// ============================================================================

/// Maximum payload size of a single frame, in bytes.
pub const MTU: usize = 16384;

/// Frame header size: frame_type + seqno_lo + seqno_hi + channel.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Fletcher-16 initial accumulator value for both halves.
pub const FLETCHER_INIT: u16 = 0xFF;

/// Reduce the Fletcher accumulators after this many input bytes to
/// prevent u16 overflow during a running sum.
pub const FLETCHER_BLOCK_SIZE: usize = 20;

// ============================================================================
// Channel assignment
// ============================================================================

/// Total number of logical channels multiplexed over the link.
pub const CHANNEL_COUNT: usize = 256;

/// Reserved for ACK/NACK link-control frames; carries no user payload.
pub const CHANNEL_LINK_CONTROL: u8 = 0;

/// Built-in consumer: echoes payloads to the host's standard output.
pub const CHANNEL_STDIN: u8 = 1;

/// Built-in consumer: in-band command subprotocol (MCU address query).
pub const CHANNEL_COMMAND: u8 = 2;

/// Built-in consumer: tunnel interface carrying raw IPv6 datagrams.
pub const CHANNEL_TUNNEL: u8 = 3;

/// First channel number available for general-purpose client traffic.
pub const CHANNEL_GENERAL_FIRST: u8 = 4;

// ============================================================================
// Local client endpoint protocol
// ============================================================================

/// Abstract-namespace prefix for local per-channel endpoints: the
/// endpoint for channel `c` is named `rethos/c`.
pub const ENDPOINT_NAMESPACE: &str = "rethos";

/// Byte width of the length prefix on the local client protocol.
pub const LOCAL_LENGTH_PREFIX_SIZE: usize = 4;

// ============================================================================
// Command subprotocol (channel 2)
// ============================================================================

/// Request opcode: "what is the MCU's address?"
pub const CMD_OPCODE_GET_ADDRESS: u8 = 0x01;

/// Reply opcode: carries a 16-byte IPv6 address following the opcode.
pub const CMD_OPCODE_ADDRESS_REPLY: u8 = 0x11;

/// Length of an IPv6 address in bytes.
pub const IPV6_ADDR_LEN: usize = 16;

// ============================================================================
// Timers
// ============================================================================

/// STATS timer period, in milliseconds.
pub const STATS_PERIOD_MS: u64 = 15_000;

/// REXMIT one-shot deadline, rearmed on every outbound DATA send.
pub const REXMIT_TIMEOUT_MS: u64 = 100;

/// IPADDR timer period, in milliseconds.
pub const IPADDR_PERIOD_MS: u64 = 20_000;

/// Intercharacter read timeout configured on the serial port.
pub const SERIAL_READ_TIMEOUT_MS: u64 = 500;

// ============================================================================
// Statistics snapshot layout
// ============================================================================

/// Number of u64 fields in the global statistics block.
pub const STATS_GLOBAL_FIELDS: usize = 7;

/// Number of u64 fields in each per-channel statistics block.
pub const STATS_PER_CHANNEL_FIELDS: usize = 5;

/// Total size in bytes of the packed statistics snapshot:
/// `7 * 8 + 256 * 5 * 8 = 10296`.
pub const STATS_SNAPSHOT_SIZE: usize =
    STATS_GLOBAL_FIELDS * 8 + CHANNEL_COUNT * STATS_PER_CHANNEL_FIELDS * 8;
