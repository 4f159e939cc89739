//! Drives a single [`Connection`] over a UDP socket, carrying one segment per datagram.

use std::collections::VecDeque;
use std::io;
use std::net;
use std::time;

use log::{debug, trace};

use crate::endpoint::{self, Connection, ReceiverState, SenderState, TcpState, MAX_PAYLOAD_SIZE};
use crate::frame;
use crate::segment::Segment;
use crate::ErrorKind;

mod epoch;
mod isn;
mod socket;

use epoch::Epoch;
use isn::IsnGenerator;

const POLL_INTERVAL_DEFAULT_MS: u64 = 10;

/// Configuration for a [`Stream`] object.
#[derive(Clone, Debug)]
pub struct Config {
    /// Configuration of the underlying connection. `fixed_isn`, if set, overrides ISN
    /// generation.
    pub connection: endpoint::Config,

    /// Maximum time to block between connection ticks while waiting for an event, in
    /// milliseconds.
    ///
    /// Minimum value: 1 \
    /// Default value: 10
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: Default::default(),
            poll_interval_ms: POLL_INTERVAL_DEFAULT_MS,
        }
    }
}

impl Config {
    fn validate(&self) {
        assert!(
            self.poll_interval_ms > 0,
            "invalid stream configuration: poll_interval_ms == 0"
        );
        assert!(
            frame::HEADER_SIZE + MAX_PAYLOAD_SIZE <= socket::FRAME_SIZE_MAX,
            "segments do not fit in a datagram"
        );

        self.connection.validate();
    }
}

/// Represents a stream event.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Produced when the handshake completes.
    Connect,
    /// Produced when data has been received, in order.
    Receive(Box<[u8]>),
    /// Produced once the peer has finished sending. No further `Receive` events follow.
    Disconnect,
    /// Produced when the connection is reset by the peer or times out.
    Error(ErrorKind),
}

struct StreamCore {
    // Saved configuration
    config: Config,
    // Timestamps are computed relative to this
    epoch: Epoch,
    last_tick_ms: u64,
    isn_generator: IsnGenerator,
    // Socket send handle
    socket_tx: socket::SegmentTx,
    local_addr: net::SocketAddr,
    // Known once connecting, or once a SYN arrives while listening
    peer_addr: Option<net::SocketAddr>,
    connection: Option<Connection>,
    // Queue of events
    events: VecDeque<Event>,
    connect_reported: bool,
    disconnect_reported: bool,
    error_reported: bool,
}

/// A TCP-style byte stream between two UDP sockets.
pub struct Stream {
    core: StreamCore,
    // Socket receive handle
    socket_rx: socket::SegmentRx,
}

impl StreamCore {
    fn new_connection(&self, peer_addr: &net::SocketAddr) -> Connection {
        let mut config = self.config.connection.clone();

        if config.fixed_isn.is_none() {
            config.fixed_isn = Some(self.isn_generator.generate(
                &self.local_addr,
                peer_addr,
                &self.epoch,
            ));
        }

        Connection::new(config)
    }

    // Transmits everything the connection has queued
    fn flush(&mut self) {
        let (connection, peer_addr) = match (&mut self.connection, &self.peer_addr) {
            (Some(connection), Some(peer_addr)) => (connection, peer_addr),
            _ => return,
        };

        while let Some(mut segment) = connection.segments_out().pop_front() {
            segment.header.sport = self.local_addr.port();
            segment.header.dport = peer_addr.port();

            self.socket_tx.send(&segment, peer_addr);
        }
    }

    fn update_events(&mut self) {
        let connection = match &mut self.connection {
            Some(connection) => connection,
            None => return,
        };

        if !self.connect_reported {
            let state = connection.state();

            let sender_open = matches!(
                state.sender,
                SenderState::SynAcked | SenderState::FinSent | SenderState::FinAcked
            );
            let receiver_open = matches!(
                state.receiver,
                ReceiverState::SynRecv | ReceiverState::FinRecv
            );

            if sender_open && receiver_open {
                debug!("connected to {:?}", self.peer_addr);
                self.connect_reported = true;
                self.events.push_back(Event::Connect);
            }
        }

        let inbound = connection.inbound_stream_mut();

        let len = inbound.buffer_size();

        if len > 0 {
            self.events
                .push_back(Event::Receive(inbound.read(len).into_boxed_slice()));
        }

        if !self.disconnect_reported && inbound.eof() && !inbound.error() {
            self.disconnect_reported = true;
            self.events.push_back(Event::Disconnect);
        }

        if !self.error_reported {
            if let Some(kind) = connection.error_kind() {
                self.error_reported = true;
                self.events.push_back(Event::Error(kind));
            }
        }
    }

    fn handle_segment(&mut self, segment: Segment, sender_addr: net::SocketAddr) {
        if let Some(peer_addr) = self.peer_addr {
            if sender_addr != peer_addr {
                trace!("ignored segment from stranger {}", sender_addr);
                return;
            }
        }

        if self.connection.is_none() {
            let header = &segment.header;

            // Listening, wait for an opening segment
            if !header.syn || header.ack || header.rst {
                return;
            }

            debug!("accepted SYN from {}", sender_addr);

            self.connection = Some(self.new_connection(&sender_addr));
            self.peer_addr = Some(sender_addr);
        }

        if let Some(connection) = &mut self.connection {
            connection.segment_received(&segment);
        }

        self.flush();
        self.update_events();
    }

    /// Reads and processes as many segments as possible from socket_rx without blocking.
    fn handle_segments(&mut self, socket_rx: &mut socket::SegmentRx) {
        while let Ok(Some((segment, sender_addr))) = socket_rx.try_recv() {
            self.handle_segment(segment, sender_addr);
        }
    }

    /// Waits up to `wait_timeout` for the socket to become readable, then processes as many
    /// segments as possible.
    fn handle_segments_wait(
        &mut self,
        socket_rx: &mut socket::SegmentRx,
        wait_timeout: Option<time::Duration>,
    ) {
        if let Ok(true) = socket_rx.wait_readable(wait_timeout) {
            self.handle_segments(socket_rx);
        }
    }

    fn process_time(&mut self) {
        let now_ms = self.epoch.time_now_ms();
        let elapsed_ms = now_ms - self.last_tick_ms;

        if elapsed_ms == 0 {
            return;
        }

        self.last_tick_ms = now_ms;

        if let Some(connection) = &mut self.connection {
            connection.tick(elapsed_ms);
        }

        self.flush();
        self.update_events();
    }

    fn poll_interval(&self) -> time::Duration {
        time::Duration::from_millis(self.config.poll_interval_ms)
    }
}

impl Stream {
    fn new(bind_address: net::SocketAddr, config: Config) -> io::Result<Self> {
        config.validate();

        let (socket_tx, socket_rx) = socket::bind(bind_address)?;

        let core = StreamCore {
            config,
            epoch: Epoch::new(),
            last_tick_ms: 0,
            isn_generator: Default::default(),
            socket_tx,
            local_addr: socket_rx.local_addr(),
            peer_addr: None,
            connection: None,
            events: VecDeque::new(),
            connect_reported: false,
            disconnect_reported: false,
            error_reported: false,
        };

        Ok(Self { core, socket_rx })
    }

    /// Equivalent to calling [`Stream::connect_with_config`] with default configuration.
    pub fn connect<A>(peer_addr: A) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
    {
        Self::connect_with_config(peer_addr, Default::default())
    }

    /// Binds a UDP socket to an ephemeral address and sends a SYN to the provided address.
    /// Errors encountered during socket initialization are forwarded to the caller.
    ///
    /// *Note*: Panics if `config` is invalid.
    pub fn connect_with_config<A>(peer_addr: A, config: Config) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
    {
        let peer_addr = peer_addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no peer address"))?;

        let bind_address = match peer_addr {
            net::SocketAddr::V4(_) => (net::Ipv4Addr::UNSPECIFIED, 0).into(),
            net::SocketAddr::V6(_) => (net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let mut stream = Self::new(bind_address, config)?;

        let ref mut core = stream.core;

        let mut connection = core.new_connection(&peer_addr);
        connection.connect();

        core.connection = Some(connection);
        core.peer_addr = Some(peer_addr);
        core.flush();

        Ok(stream)
    }

    /// Equivalent to calling [`Stream::listen_with_config`] with default configuration.
    pub fn listen<A>(bind_address: A) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
    {
        Self::listen_with_config(bind_address, Default::default())
    }

    /// Binds a UDP socket to the provided address and waits for a SYN from any peer. Only the
    /// first peer is served.
    ///
    /// *Note*: Panics if `config` is invalid.
    pub fn listen_with_config<A>(bind_address: A, config: Config) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
    {
        let bind_address = bind_address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no bind address"))?;

        Self::new(bind_address, config)
    }

    /// If any events are ready to be processed, returns the next event immediately. Otherwise,
    /// reads inbound segments and advances time in an attempt to produce an event.
    ///
    /// Returns `None` if no events are available.
    pub fn poll_event(&mut self) -> Option<Event> {
        let ref mut core = self.core;

        if core.events.is_empty() {
            core.handle_segments(&mut self.socket_rx);

            core.process_time();
        }

        core.events.pop_front()
    }

    /// If any events are ready to be processed, returns the next event immediately. Otherwise,
    /// reads inbound segments and advances time until an event can be returned.
    pub fn wait_event(&mut self) -> Event {
        let ref mut core = self.core;

        loop {
            if let Some(event) = core.events.pop_front() {
                return event;
            }

            let wait_timeout = core.poll_interval();

            core.handle_segments_wait(&mut self.socket_rx, Some(wait_timeout));

            core.process_time();
        }
    }

    /// If any events are ready to be processed, returns the next event immediately. Otherwise,
    /// reads inbound segments and advances time until an event can be returned. Waits for a
    /// maximum duration of `timeout`.
    ///
    /// Returns `None` if no events were available within `timeout`.
    pub fn wait_event_timeout(&mut self, timeout: time::Duration) -> Option<Event> {
        let ref mut core = self.core;

        if core.events.is_empty() {
            let mut remaining_timeout = timeout;
            let mut wait_begin = time::Instant::now();

            loop {
                let wait_timeout = remaining_timeout.min(core.poll_interval());

                core.handle_segments_wait(&mut self.socket_rx, Some(wait_timeout));

                core.process_time();

                if !core.events.is_empty() {
                    // Found what we're looking for
                    break;
                }

                let now = time::Instant::now();
                let elapsed_time = now - wait_begin;

                if elapsed_time >= remaining_timeout {
                    // No time left
                    break;
                }

                remaining_timeout -= elapsed_time;
                wait_begin = now;
            }
        }

        core.events.pop_front()
    }

    /// Writes as much of `data` as fits in the outbound stream and sends what the window
    /// allows. Returns the number of bytes accepted, which is zero until a peer is known.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let ref mut core = self.core;

        let count = match &mut core.connection {
            Some(connection) => connection.write(data),
            None => 0,
        };

        core.flush();

        count
    }

    /// Finishes the outbound stream. The peer sees a `Disconnect` once it has received
    /// everything written so far.
    pub fn shutdown_write(&mut self) {
        let ref mut core = self.core;

        if let Some(connection) = &mut core.connection {
            connection.end_input_stream();
        }

        core.flush();
    }

    /// Resets the connection immediately.
    pub fn abort(&mut self) {
        let ref mut core = self.core;

        if let Some(connection) = &mut core.connection {
            connection.abort();
        }

        core.flush();
    }

    /// False once the connection has closed or been reset. A listening stream with no peer is
    /// active.
    pub fn active(&self) -> bool {
        self.core
            .connection
            .as_ref()
            .map(|connection| connection.active())
            .unwrap_or(true)
    }

    /// Number of bytes which may be written before the outbound stream is full.
    pub fn remaining_capacity(&self) -> usize {
        self.core
            .connection
            .as_ref()
            .map(|connection| connection.remaining_outbound_capacity())
            .unwrap_or(0)
    }

    pub fn state(&self) -> Option<TcpState> {
        self.core
            .connection
            .as_ref()
            .map(|connection| connection.state())
    }

    /// Returns the local address of the internal UDP socket.
    pub fn local_addr(&self) -> net::SocketAddr {
        self.core.local_addr
    }

    /// Returns the peer address, once known.
    pub fn peer_addr(&self) -> Option<net::SocketAddr> {
        self.core.peer_addr
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if self.active() {
            self.abort();
        }
    }
}
