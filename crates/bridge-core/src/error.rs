use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Startup / transport errors
    #[error("failed to open serial device {path}: {source}")]
    SerialOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid baud rate: {0}")]
    InvalidBaudRate(String),

    #[error("invalid IPv6 prefix: {0}")]
    InvalidPrefix(String),

    #[error("failed to bind local endpoint for channel {channel}: {source}")]
    EndpointBind {
        channel: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to arm timer: {0}")]
    TimerSetup(String),

    // Local client protocol errors
    #[error("local client message exceeds MTU ({len} > {mtu})")]
    MessageTooLarge { len: usize, mtu: usize },

    // Generic IO passthrough
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
