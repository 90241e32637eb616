//! Serial transport: raw mode, 8N1, no flow control.
//!
//! Wraps [`tokio_serial`], the async counterpart of the `serialport`
//! crate, configured the way the link's escape-framed protocol expects:
//! no line discipline, no flow control, and a short intercharacter read
//! timeout so the dispatcher's `select!` loop never blocks on a silent
//! line.

use std::time::Duration;

use bridge_core::constants::SERIAL_READ_TIMEOUT_MS;
use bridge_core::{Error, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;

/// An open serial port configured for the bridge protocol.
pub struct SerialPort {
    inner: tokio_serial::SerialStream,
}

impl SerialPort {
    /// Opens `path` at `baud_rate`, 8 data bits, no parity, one stop
    /// bit, no flow control.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let inner = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::from_millis(SERIAL_READ_TIMEOUT_MS))
            .open_native_async()
            .map_err(|source| Error::SerialOpen {
                path: path.to_string(),
                source: std::io::Error::other(source),
            })?;

        Ok(Self { inner })
    }

    /// Reads whatever bytes are currently available into `buf`,
    /// returning the number of bytes read. A return of `0` means EOF:
    /// the link is gone and the caller should treat this as fatal.
    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf).await
    }

    /// Writes the full buffer, retrying on short writes.
    pub async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(buf).await
    }
}
