use serde::{Deserialize, Serialize};
use std::fmt;

/// A link sequence number.
///
/// Sequence numbers are drawn from an unbounded counter reduced modulo
/// 2^16. Wraparound is expected and intentional, so this type only
/// supports wrapping arithmetic and equality comparison — there is no
/// `Ord` impl, because "greater than" has no meaning once the counter
/// wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeqNo(pub u16);

impl SeqNo {
    pub const ZERO: SeqNo = SeqNo(0);

    #[must_use]
    pub fn wrapping_add(self, rhs: u16) -> SeqNo {
        SeqNo(self.0.wrapping_add(rhs))
    }

    /// Number of frames lost between `self` (exclusive) and `next`
    /// (exclusive), per spec: `(next - self - 1) mod 2^16`.
    #[must_use]
    pub fn gap_to(self, next: SeqNo) -> u16 {
        next.0.wrapping_sub(self.0).wrapping_sub(1)
    }

    #[must_use]
    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    #[must_use]
    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        SeqNo(u16::from_le_bytes(bytes))
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the 256 logical channels multiplexed over the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u8);

impl ChannelId {
    /// Reserved for ACK/NACK link-control frames.
    pub const LINK_CONTROL: ChannelId = ChannelId(crate::constants::CHANNEL_LINK_CONTROL);
    /// Built-in stdin echo channel.
    pub const STDIN: ChannelId = ChannelId(crate::constants::CHANNEL_STDIN);
    /// Built-in in-band command channel.
    pub const COMMAND: ChannelId = ChannelId(crate::constants::CHANNEL_COMMAND);
    /// Built-in tunnel channel.
    pub const TUNNEL: ChannelId = ChannelId(crate::constants::CHANNEL_TUNNEL);

    #[must_use]
    pub fn new(raw: u8) -> Self {
        ChannelId(raw)
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// True for the three built-in consumer channels (1, 2, 3).
    #[must_use]
    pub fn is_builtin(self) -> bool {
        matches!(self, ChannelId::STDIN | ChannelId::COMMAND | ChannelId::TUNNEL)
    }

    /// Returns the abstract-namespace endpoint name for this channel
    /// under `namespace`, e.g. `rethos/4`. `namespace` defaults to
    /// [`crate::constants::ENDPOINT_NAMESPACE`] but is operator-
    /// overridable via the daemon's `--socket-dir` flag.
    #[must_use]
    pub fn endpoint_name(self, namespace: &str) -> String {
        format!("{namespace}/{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
