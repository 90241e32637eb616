//! I/O transports for the serial bridge daemon: the serial line itself,
//! the IPv6 tunnel device, local per-channel client endpoints, and the
//! background timer tasks.

pub mod endpoint;
pub mod serial;
pub mod timers;
pub mod tunnel;

pub use serial::SerialPort;
pub use timers::{TimerFlag, TimerService};
pub use tunnel::Tunnel;
