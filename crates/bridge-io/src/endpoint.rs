//! Local client endpoints: one abstract-namespace Unix socket per
//! general-purpose channel, named `rethos/<channel>`.
//!
//! Abstract-namespace sockets (a Linux-only extension) leave no entry
//! on the filesystem, so there's nothing to clean up on a crash and no
//! permission bits to get wrong.

use std::os::linux::net::SocketAddrExt;
use std::os::unix::net::{SocketAddr, UnixListener as StdUnixListener};

use bridge_core::Error;
use bridge_core::types::ChannelId;
use tokio::net::{UnixListener, UnixStream};

/// Binds the abstract-namespace listener for `channel` under `namespace`.
pub fn bind(channel: ChannelId, namespace: &str) -> Result<UnixListener, Error> {
    let name = channel.endpoint_name(namespace);
    let addr = SocketAddr::from_abstract_name(name.as_bytes()).map_err(|source| Error::EndpointBind {
        channel: channel.as_u8(),
        source,
    })?;

    let std_listener = StdUnixListener::bind_addr(&addr).map_err(|source| Error::EndpointBind {
        channel: channel.as_u8(),
        source,
    })?;
    std_listener.set_nonblocking(true).map_err(|source| Error::EndpointBind {
        channel: channel.as_u8(),
        source,
    })?;

    UnixListener::from_std(std_listener).map_err(|source| Error::EndpointBind {
        channel: channel.as_u8(),
        source,
    })
}

/// Binds listeners for every one of the 256 channel slots, including
/// the reserved and built-in channels (0..=3): a local client may
/// attach to any of them, e.g. to receive the periodic statistics
/// snapshot pushed on channel 0.
pub fn bind_all_channels(namespace: &str) -> Result<Vec<(ChannelId, UnixListener)>, Error> {
    (0..=255u8)
        .map(|raw| {
            let channel = ChannelId::new(raw);
            bind(channel, namespace).map(|listener| (channel, listener))
        })
        .collect()
}
