//! Stop-and-wait ARQ engine and channel table for the serial bridge.
//!
//! Neither type in this crate touches an I/O descriptor: [`engine::LinkEngine`]
//! consumes decode events and produces actions for the caller to execute,
//! and [`channels::ChannelTable`] is generic over whatever connection
//! handle the caller's transport layer uses.

pub mod channels;
pub mod engine;

pub use channels::{ChannelSlot, ChannelTable};
pub use engine::{LinkAction, LinkEngine};
