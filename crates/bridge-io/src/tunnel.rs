//! Tunnel transport: a point-to-point IPv6 L3 interface.
//!
//! Wraps [`tokio_tun`]. No framing beyond whatever the kernel hands
//! back from the TUN device — packets in and out are raw IPv6
//! datagrams, exactly as the wire carries them on channel 3. Address
//! assignment is deliberately not this crate's job: it brings the
//! interface up and hands raw packets back and forth, and leaves IPv6
//! address configuration to whatever policy the operator runs
//! alongside the daemon (the command subprotocol on channel 2 only
//! reports the MCU's address; it doesn't configure anything locally).

use bridge_core::Result;
use bridge_core::constants::MTU;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_tun::Tun;

/// An open point-to-point TUN device carrying raw IPv6 packets.
pub struct Tunnel {
    inner: Tun,
}

impl Tunnel {
    /// Creates and brings up a TUN interface, letting the kernel pick
    /// its name. Takes no address: initial address assignment is an
    /// external collaborator's job, not this crate's.
    pub fn create() -> Result<Self> {
        let inner = Tun::builder()
            .tap(false)
            .packet_info(false)
            .mtu(MTU as i32)
            .up()
            .try_build()
            .map_err(std::io::Error::other)?;
        Ok(Self { inner })
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf).await
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(buf).await
    }
}

/// Largest single read the tunnel transport will ever hand the
/// dispatcher, matching the link's payload MTU.
pub const TUNNEL_READ_BUF_SIZE: usize = MTU;
