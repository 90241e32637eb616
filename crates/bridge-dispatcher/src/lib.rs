//! The event loop wiring the serial link, the tunnel, stdin, and every
//! local client channel together.
//!
//! A single task owns all link and channel state; `tokio::select!` is
//! the only suspension point, with biased ordering so that on every
//! wakeup the timer flags are drained, then the serial line, then
//! stdin, then the tunnel, then whichever channel task completed
//! first. A DATA frame's side effects (the ACK, delivery to a
//! consumer) are fully applied before the loop polls the serial
//! descriptor again.

pub mod command;

use std::collections::{HashMap, VecDeque};
use std::net::Ipv6Addr;
use std::time::Instant;

use bridge_core::types::ChannelId;
use bridge_core::{Error, Result};
use bridge_io::{SerialPort, TimerService, Tunnel};
use bridge_link::{ChannelTable, LinkAction, LinkEngine};
use bridge_protocol::codec::LocalCodec;
use bridge_protocol::stats::StatsSnapshot;
use bridge_protocol::stream_parser::StreamParser;
use bytes::Bytes;
use futures::SinkExt;
use futures::stream::{FuturesUnordered, SplitSink, SplitStream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::Framed;

type ClientFramed = Framed<UnixStream, LocalCodec>;
type ClientSink = SplitSink<ClientFramed, Bytes>;
type ClientStream = SplitStream<ClientFramed>;
type BoxedTask = std::pin::Pin<Box<dyn std::future::Future<Output = ChannelTaskResult> + Send>>;

enum ChannelTaskResult {
    Accept {
        channel: ChannelId,
        listener: UnixListener,
        result: std::io::Result<UnixStream>,
    },
    Read {
        channel: ChannelId,
        stream: ClientStream,
        item: Option<std::result::Result<Bytes, Error>>,
    },
}

async fn accept_task(channel: ChannelId, listener: UnixListener) -> ChannelTaskResult {
    let result = listener.accept().await.map(|(stream, _addr)| stream);
    ChannelTaskResult::Accept { channel, listener, result }
}

async fn read_task(channel: ChannelId, mut stream: ClientStream) -> ChannelTaskResult {
    let item = stream.next().await;
    ChannelTaskResult::Read { channel, stream, item }
}

/// Configuration for one bridge daemon instance.
pub struct DispatcherConfig {
    pub device_path: String,
    pub baud_rate: u32,
    pub ipv6_prefix: Option<String>,
    /// Abstract-namespace prefix for local per-channel endpoints.
    pub socket_dir: String,
}

/// Owns every resource the daemon touches and runs its event loop.
pub struct Dispatcher {
    serial: SerialPort,
    tunnel: Option<Tunnel>,
    timers: TimerService,
    link: LinkEngine,
    parser: StreamParser,
    channels: ChannelTable<()>,
    channel_tasks: FuturesUnordered<BoxedTask>,
    write_halves: HashMap<ChannelId, ClientSink>,
    /// Abstract-namespace prefix passed back to `bridge_io::endpoint::bind`
    /// whenever a channel's listener needs to be re-created after a client
    /// disconnects.
    socket_dir: String,
    outbound_queue: VecDeque<(ChannelId, Vec<u8>)>,
    stdin: tokio::io::Stdin,
    stdin_enabled: bool,
    /// The address reported to the MCU in answer to GET_ADDRESS and on
    /// every IPADDR tick. `None` when no prefix was configured, in
    /// which case the command channel never announces anything.
    reported_address: Option<Ipv6Addr>,
}

impl Dispatcher {
    /// Opens the serial port and, if requested, the tunnel device and
    /// binds every general-purpose channel's local endpoint.
    pub fn new(config: DispatcherConfig) -> Result<Self> {
        let serial = SerialPort::open(&config.device_path, config.baud_rate)?;
        let reported_address = config.ipv6_prefix.as_deref().map(parse_prefix_address).transpose()?;
        let tunnel = config.ipv6_prefix.is_some().then(Tunnel::create).transpose()?;

        let listeners = bridge_io::endpoint::bind_all_channels(&config.socket_dir)?;
        let channel_tasks = FuturesUnordered::new();
        for (channel, listener) in listeners {
            channel_tasks.push(Box::pin(accept_task(channel, listener)) as BoxedTask);
        }

        Ok(Self {
            serial,
            tunnel,
            timers: TimerService::start(),
            link: LinkEngine::new(),
            parser: StreamParser::new(),
            channels: ChannelTable::new(),
            channel_tasks,
            write_halves: HashMap::new(),
            socket_dir: config.socket_dir,
            outbound_queue: VecDeque::new(),
            stdin: tokio::io::stdin(),
            stdin_enabled: true,
            reported_address,
        })
    }

    /// Runs until a fatal I/O error occurs on the serial link.
    pub async fn run(mut self) -> Result<()> {
        let mut serial_buf = [0u8; 4096];
        let mut stdin_buf = [0u8; 4096];
        let mut tunnel_buf = vec![0u8; bridge_io::tunnel::TUNNEL_READ_BUF_SIZE];

        loop {
            // spec.md §4.7 step 1: drain the timer flags before touching
            // any descriptor, so a pending STATS/IPADDR tick is always
            // handled ahead of whatever woke the select below.
            if self.timers.stats.take() {
                self.report_stats().await?;
            }
            if self.timers.ipaddr.take() {
                self.announce_address();
            }

            let rexmit_sleep = match self.link.rexmit_deadline() {
                Some(deadline) => {
                    futures::future::Either::Left(tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)))
                }
                None => futures::future::Either::Right(std::future::pending::<()>()),
            };

            tokio::select! {
                biased;

                () = rexmit_sleep => {
                    if let Some(bytes) = self.link.on_rexmit_deadline(Instant::now()) {
                        self.serial.write_all(&bytes).await.map_err(Error::Io)?;
                    }
                }

                result = self.serial.read(&mut serial_buf) => {
                    let n = result.map_err(Error::Io)?;
                    if n == 0 {
                        tracing::error!("serial link closed (EOF)");
                        return Err(Error::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "serial link closed",
                        )));
                    }
                    self.handle_serial_bytes(&serial_buf[..n]).await?;
                }

                result = self.stdin.read(&mut stdin_buf), if self.stdin_enabled => {
                    match result {
                        Ok(0) => self.stdin_enabled = false,
                        Ok(n) => self.enqueue_send(ChannelId::STDIN, stdin_buf[..n].to_vec()),
                        Err(e) => {
                            tracing::warn!(error = %e, "stdin read failed, disabling stdin channel");
                            self.stdin_enabled = false;
                        }
                    }
                }

                result = read_tunnel(&mut self.tunnel, &mut tunnel_buf), if self.tunnel.is_some() => {
                    match result {
                        Ok(n) => self.enqueue_send(ChannelId::TUNNEL, tunnel_buf[..n].to_vec()),
                        Err(e) => tracing::warn!(error = %e, "tunnel read failed"),
                    }
                }

                Some(task) = self.channel_tasks.next() => {
                    self.handle_channel_task(task).await?;
                }
            }

            self.drain_outbound_queue().await?;
        }
    }

    async fn handle_serial_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for &byte in bytes {
            let event = self.parser.feed(byte);
            if matches!(event, bridge_protocol::DecodeEvent::None) {
                continue;
            }
            let actions = self.link.on_rx_event(event, Instant::now());
            for action in actions {
                self.apply_link_action(action).await?;
            }
        }
        Ok(())
    }

    async fn apply_link_action(&mut self, action: LinkAction) -> Result<()> {
        match action {
            LinkAction::SendAck(seqno) => {
                let mut buf = bytes::BytesMut::new();
                bridge_protocol::frame::Frame::ack(seqno).encode(&mut buf);
                self.serial.write_all(&buf).await.map_err(Error::Io)?;
            }
            LinkAction::SendNack => {
                let mut buf = bytes::BytesMut::new();
                bridge_protocol::frame::Frame::nack().encode(&mut buf);
                self.serial.write_all(&buf).await.map_err(Error::Io)?;
            }
            LinkAction::SendFrame(bytes) => {
                self.serial.write_all(&bytes).await.map_err(Error::Io)?;
            }
            LinkAction::Deliver { channel, payload } => {
                self.deliver(channel, payload).await?;
            }
        }
        Ok(())
    }

    /// Delivers one payload to channel `channel`. Built-in consumers
    /// (stdin, command, tunnel) run first and always fire; then, per
    /// spec.md §4.5, a connected local client on the *same* channel
    /// also gets the payload, independent of whatever the built-in
    /// consumer did with it.
    async fn deliver(&mut self, channel: ChannelId, payload: Vec<u8>) -> Result<()> {
        self.channels.record_serial_received(channel);

        if payload.is_empty() {
            // spec.md §4.4/§4.5: an empty DATA payload is acknowledged
            // (already done by the caller) and counted above, but never
            // reaches a built-in consumer or a connected local client.
            return Ok(());
        }

        if channel == ChannelId::STDIN {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&payload).await.map_err(Error::Io)?;
            stdout.flush().await.map_err(Error::Io)?;
            self.channels.record_domain_forwarded(channel);
        } else if channel == ChannelId::TUNNEL {
            if let Some(tunnel) = self.tunnel.as_mut() {
                match tunnel.write_all(&payload).await {
                    Ok(()) => self.channels.record_domain_forwarded(channel),
                    Err(e) => tracing::warn!(error = %e, "tunnel write failed"),
                }
            } else {
                tracing::debug!("dropping tunnel payload: no tunnel device configured");
            }
        } else if channel == ChannelId::COMMAND {
            match command::parse(&payload) {
                Some(command::CommandMessage::GetAddress) => {
                    self.channels.record_domain_forwarded(channel);
                    self.announce_address();
                }
                Some(command::CommandMessage::AddressReply(addr)) => {
                    tracing::debug!(%addr, "ignoring unexpected ADDRESS_REPLY from MCU");
                }
                Some(command::CommandMessage::Unknown(opcode)) => {
                    tracing::warn!(opcode, "unrecognized command opcode");
                }
                None => tracing::warn!("malformed command-channel payload"),
            }
        }

        // A local client may be attached to any channel, built-in or
        // not, and gets forwarded the same payload independently.
        if let Some(sink) = self.write_halves.get_mut(&channel) {
            if sink.send(Bytes::from(payload)).await.is_err() {
                self.disconnect_channel(channel);
            } else {
                self.channels.record_domain_forwarded(channel);
            }
        } else if self.channels.record_drop_not_connected(channel) {
            self.link.stats.drop_notconnected += 1;
            tracing::debug!(%channel, "dropped frame for unconnected channel");
        }

        Ok(())
    }

    async fn handle_channel_task(&mut self, task: ChannelTaskResult) -> Result<()> {
        match task {
            ChannelTaskResult::Accept { channel, listener, result } => match result {
                Ok(stream) => {
                    // spec.md §4.5: once accepted, the listening endpoint is
                    // closed until the client disconnects. Dropping `listener`
                    // here (rather than keeping it around for later reuse)
                    // closes its fd so a second connect() is refused instead
                    // of queuing in the kernel backlog.
                    drop(listener);
                    self.channels.connect(channel, ());
                    let (sink, stream) = Framed::new(stream, LocalCodec::new()).split();
                    self.write_halves.insert(channel, sink);
                    self.channel_tasks.push(Box::pin(read_task(channel, stream)));
                }
                Err(e) => {
                    tracing::warn!(%channel, error = %e, "accept failed, retrying");
                    self.channel_tasks.push(Box::pin(accept_task(channel, listener)));
                }
            },
            ChannelTaskResult::Read { channel, stream, item } => match item {
                Some(Ok(payload)) => {
                    if channel == ChannelId::LINK_CONTROL {
                        // Channel 0 carries no user payload; a client attached
                        // there only ever receives the stats snapshot push.
                        tracing::debug!("ignoring payload from client on channel 0");
                    } else {
                        self.channels.record_domain_received(channel);
                        self.enqueue_send(channel, payload.to_vec());
                    }
                    self.channel_tasks.push(Box::pin(read_task(channel, stream)));
                }
                Some(Err(e)) => {
                    tracing::warn!(%channel, error = %e, "client read error");
                    self.disconnect_channel(channel);
                }
                None => self.disconnect_channel(channel),
            },
        }
        Ok(())
    }

    /// Returns the slot to listening and re-creates its endpoint, per
    /// spec.md §4.5 ("on disconnect, the slot returns to listening and
    /// re-creates the endpoint"). The old listener was already closed
    /// when the client was accepted, so a fresh one is bound here rather
    /// than one being kept in reserve.
    fn disconnect_channel(&mut self, channel: ChannelId) {
        self.channels.disconnect(channel);
        self.write_halves.remove(&channel);
        match bridge_io::endpoint::bind(channel, &self.socket_dir) {
            Ok(listener) => self.channel_tasks.push(Box::pin(accept_task(channel, listener))),
            Err(e) => tracing::error!(%channel, error = %e, "failed to re-bind channel endpoint after disconnect"),
        }
    }

    fn enqueue_send(&mut self, channel: ChannelId, payload: Vec<u8>) {
        self.outbound_queue.push_back((channel, payload));
    }

    async fn drain_outbound_queue(&mut self) -> Result<()> {
        while !self.link.is_busy() {
            let Some((channel, payload)) = self.outbound_queue.pop_front() else {
                break;
            };
            if let Some(bytes) = self.link.send_data(channel, &payload, Instant::now()) {
                self.channels.record_serial_forwarded(channel);
                self.serial.write_all(&bytes).await.map_err(Error::Io)?;
            }
        }
        Ok(())
    }

    /// STATS tick: print a human-readable line and, if a client is
    /// attached on channel 0, push it the full packed snapshot.
    async fn report_stats(&mut self) -> Result<()> {
        let mut snapshot = StatsSnapshot::new();
        snapshot.global = self.link.stats;
        snapshot.channels.copy_from_slice(self.channels.all_stats());
        println!(
            "stats: serial_rx={} domain_fwd={} domain_rx={} serial_fwd={} lost={} bad={} drop_nc={} \
             (acks={} nacks={} rexmit={})",
            snapshot.global.serial_received,
            snapshot.global.domain_forwarded,
            snapshot.global.domain_received,
            snapshot.global.serial_forwarded,
            snapshot.global.lost_frames,
            snapshot.global.bad_frames,
            snapshot.global.drop_notconnected,
            self.link.acks_received,
            self.link.nacks_received,
            self.link.retransmits,
        );

        if let Some(sink) = self.write_halves.get_mut(&ChannelId::LINK_CONTROL) {
            if sink.send(Bytes::from(snapshot.to_bytes())).await.is_err() {
                self.disconnect_channel(ChannelId::LINK_CONTROL);
            }
        }
        Ok(())
    }

    /// IPADDR tick, and in reply to a GET_ADDRESS request: sends the
    /// configured address on the command channel so the MCU can learn
    /// it without an external address-assignment step.
    fn announce_address(&mut self) {
        if let Some(addr) = self.reported_address {
            self.enqueue_send(ChannelId::COMMAND, command::address_reply(addr));
        } else {
            tracing::debug!("no IPv6 prefix configured; nothing to announce on the command channel");
        }
    }
}

async fn read_tunnel(tunnel: &mut Option<Tunnel>, buf: &mut [u8]) -> std::io::Result<usize> {
    match tunnel {
        Some(t) => t.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Parses the CLI-supplied IPv6 prefix (e.g. `fd00::1/64` or a bare
/// address) into the address reported on the command channel. Address
/// assignment itself stays out of scope; this only extracts the value
/// the command subprotocol hands to the MCU.
fn parse_prefix_address(raw: &str) -> Result<Ipv6Addr> {
    let addr_part = raw.split('/').next().unwrap_or(raw);
    addr_part
        .parse::<Ipv6Addr>()
        .map_err(|_| Error::InvalidPrefix(raw.to_string()))
}
