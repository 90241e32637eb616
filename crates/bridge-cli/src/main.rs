//! Process entrypoint: argument parsing, logging setup, and running
//! the dispatcher to completion.

use clap::Parser;

use bridge_dispatcher::{Dispatcher, DispatcherConfig};

/// Serial/MCU bridge daemon: maintains a reliable, multi-channel link
/// to an MCU over one serial line and exposes it as 256 local channels
/// plus an optional IPv6 tunnel.
#[derive(Parser, Debug)]
#[command(name = "bridged", version)]
struct Args {
    /// Serial device path, e.g. /dev/ttyUSB0.
    device: String,

    /// Baud rate.
    baud_rate: u32,

    /// IPv6 prefix to assign the tunnel interface, e.g. fd00::/64. If
    /// omitted, the tunnel is disabled and channel 3 is unused.
    ipv6_prefix: Option<String>,

    /// Abstract-namespace prefix for local per-channel endpoints, e.g.
    /// the default gives `rethos/4`.
    #[arg(long, default_value_t = bridge_core::constants::ENDPOINT_NAMESPACE.to_string())]
    socket_dir: String,

    /// Raise the default log level. Repeat for more verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> bridge_core::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let runtime = tokio::runtime::Runtime::new().map_err(bridge_core::Error::Io)?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> bridge_core::Result<()> {
    let dispatcher = Dispatcher::new(DispatcherConfig {
        device_path: args.device,
        baud_rate: args.baud_rate,
        ipv6_prefix: args.ipv6_prefix,
        socket_dir: args.socket_dir,
    })?;

    if let Err(e) = dispatcher.run().await {
        tracing::error!(error = %e, "dispatcher exited");
        return Err(e);
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}
