use std::collections::VecDeque;

use log::{debug, trace, warn};

use crate::buffer::ByteStream;
use crate::segment::Segment;
use crate::seqnum::SeqNum;
use crate::ErrorKind;

mod receiver;
mod sender;
mod state;
mod timer;

pub use receiver::Receiver;
pub use sender::Sender;
pub use state::{ReceiverState, SenderState, State, TcpState};

/// Maximum number of payload bytes carried by a single segment.
pub const MAX_PAYLOAD_SIZE: usize = 1000;

const CAPACITY_DEFAULT: usize = 64000;
const RT_TIMEOUT_DEFAULT_MS: u64 = 1000;
const MAX_RETX_ATTEMPTS_DEFAULT: u32 = 8;

// TIME_WAIT lasts this many initial retransmission timeouts
const TIME_WAIT_RTO_MULTIPLE: u64 = 10;

#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of both the inbound and outbound byte streams, in bytes.
    ///
    /// Minimum value: 1 \
    /// Default value: 64,000
    pub capacity: usize,

    /// Initial retransmission timeout, in milliseconds. Doubles with each consecutive
    /// retransmission.
    ///
    /// Minimum value: 1 \
    /// Default value: 1,000
    pub rt_timeout_ms: u64,

    /// The connection is aborted once the oldest outstanding segment has been resent more than
    /// this many times in a row.
    ///
    /// Default value: 8
    pub max_retx_attempts: u32,

    /// Initial sequence number to use. If `None`, one is chosen at random.
    ///
    /// Default value: `None`
    pub fixed_isn: Option<SeqNum>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: CAPACITY_DEFAULT,
            rt_timeout_ms: RT_TIMEOUT_DEFAULT_MS,
            max_retx_attempts: MAX_RETX_ATTEMPTS_DEFAULT,
            fixed_isn: None,
        }
    }
}

impl Config {
    pub fn validate(&self) {
        assert!(
            self.capacity > 0,
            "invalid connection configuration: capacity == 0"
        );
        assert!(
            self.rt_timeout_ms > 0,
            "invalid connection configuration: rt_timeout_ms == 0"
        );
    }
}

/// One end of a TCP connection, composed of a [`Sender`] for the outbound stream and a
/// [`Receiver`] for the inbound stream.
///
/// The connection performs no I/O. Received segments are passed to
/// [`Connection::segment_received`], segments to transmit accumulate in
/// [`Connection::segments_out`], and time advances only via [`Connection::tick`].
pub struct Connection {
    config: Config,

    sender: Sender,
    receiver: Receiver,

    segments_out: VecDeque<Segment>,

    // Remain active after both streams finish, to acknowledge a retransmitted FIN
    linger: bool,
    active: bool,

    time_since_last_segment_received_ms: u64,

    error_kind: Option<ErrorKind>,
}

impl Connection {
    /// Creates a connection in the LISTEN state.
    ///
    /// *Note*: Panics if `config` is invalid.
    pub fn new(config: Config) -> Self {
        config.validate();

        Self {
            sender: Sender::new(config.capacity, config.rt_timeout_ms, config.fixed_isn),
            receiver: Receiver::new(config.capacity),
            segments_out: VecDeque::new(),
            linger: true,
            active: true,
            time_since_last_segment_received_ms: 0,
            error_kind: None,
            config,
        }
    }

    fn sender_opened(&self) -> bool {
        self.sender.next_seqno_absolute() > 0
    }

    // Moves everything the sender produced into the outbound queue, stamping each segment with
    // the receiver's acknowledgment fields
    fn flush(&mut self) {
        while let Some(mut segment) = self.sender.segments_out().pop_front() {
            if let Some(ackno) = self.receiver.ackno() {
                segment.header.ack = true;
                segment.header.ackno = ackno;
                segment.header.win = self.receiver.window_size().min(u16::MAX as usize) as u16;
            }

            trace!("out {}", segment);

            self.segments_out.push_back(segment);
        }
    }

    fn shutdown(&mut self, send_rst: bool, error_kind: Option<ErrorKind>) {
        if send_rst {
            // Nothing else goes out
            self.sender.segments_out().clear();

            let mut rst = Segment::default();
            rst.header.rst = true;
            rst.header.seqno = self.sender.next_seqno();

            self.sender.segments_out().push_back(rst);
            self.flush();
        }

        self.sender.stream_in_mut().set_error();
        self.receiver.stream_out_mut().set_error();

        self.active = false;
        self.error_kind = error_kind;
    }

    // Reply with a segment which occupies no sequence space
    fn send_ack(&mut self) {
        self.sender.send_empty_segment();
        self.flush();
    }

    fn check_clean_shutdown(&mut self) {
        let inbound_finished = self.receiver.stream_out().input_ended();

        if inbound_finished && !self.sender.stream_in().eof() {
            // The peer finished first, so no need to linger
            self.linger = false;
        }

        if inbound_finished
            && !self.linger
            && SenderState::of(&self.sender) == SenderState::FinAcked
        {
            debug!("closed");
            self.active = false;
        }
    }

    /// Initiates a connection by sending a SYN.
    pub fn connect(&mut self) {
        if !self.active || self.sender_opened() {
            return;
        }

        self.sender.fill_window();
        self.flush();
    }

    /// Writes as much of `data` to the outbound stream as will fit, and sends whatever the
    /// window allows. Returns the number of bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if !self.active {
            return 0;
        }

        let count = self.sender.stream_in_mut().write(data);

        if self.sender_opened() {
            self.sender.fill_window();
            self.flush();
        }

        count
    }

    /// Closes the outbound stream. A FIN is sent once all written data has been sent.
    pub fn end_input_stream(&mut self) {
        if !self.active {
            return;
        }

        self.sender.stream_in_mut().end_input();

        if self.sender_opened() {
            self.sender.fill_window();
            self.flush();
        }
    }

    /// Immediately resets the connection, queueing an RST for the peer.
    pub fn abort(&mut self) {
        if !self.active {
            return;
        }

        debug!("aborted locally");

        self.shutdown(true, None);
    }

    pub fn segment_received(&mut self, segment: &Segment) {
        if !self.active {
            return;
        }

        self.time_since_last_segment_received_ms = 0;

        trace!("in {}", segment);

        let before = self.state();

        if !self.sender_opened() && self.receiver.ackno().is_none() {
            self.handle_listen(segment);
        } else if self.receiver.ackno().is_none() {
            self.handle_syn_sent(segment);
        } else {
            self.handle_synchronized(segment);
        }

        let after = self.state();

        if after != before {
            debug!("{} -> {}", state_label(&before), state_label(&after));
        }
    }

    fn handle_listen(&mut self, segment: &Segment) {
        let header = &segment.header;

        if header.rst || header.ack || !header.syn {
            return;
        }

        self.receiver.segment_received(segment);

        // The SYN may carry a FIN
        self.check_clean_shutdown();

        // SYN, stamped with an ack
        self.connect();
    }

    fn handle_syn_sent(&mut self, segment: &Segment) {
        let header = &segment.header;

        if header.rst {
            if header.ack && self.sender.ack_is_legal(header.ackno) {
                debug!("reset by peer");
                self.shutdown(false, Some(ErrorKind::Reset));
            }
            return;
        }

        if !header.syn {
            return;
        }

        if header.ack && !self.sender.ack_is_legal(header.ackno) {
            return;
        }

        self.receiver.segment_received(segment);

        if header.ack {
            self.sender.ack_received(header.ackno, header.win);
        }

        self.check_clean_shutdown();

        if !self.active {
            return;
        }

        if self.sender.segments_out().is_empty() {
            self.sender.send_empty_segment();
        }

        self.flush();
    }

    fn handle_synchronized(&mut self, segment: &Segment) {
        let header = &segment.header;

        let in_window = self.receiver.in_window(segment);

        // Keep-alive: empty, one before the next expected seqno
        let is_probe = segment.length_in_sequence_space() == 0
            && self.receiver.ackno().map(|ackno| ackno - 1) == Some(header.seqno);

        if header.rst {
            if in_window || is_probe {
                debug!("reset by peer");
                self.shutdown(false, Some(ErrorKind::Reset));
            }
            return;
        }

        if header.ack && !self.sender.ack_is_legal(header.ackno) {
            self.send_ack();
            return;
        }

        if is_probe {
            self.send_ack();
            return;
        }

        if header.ack {
            self.sender.ack_received(header.ackno, header.win);
        }

        self.receiver.segment_received(segment);

        self.check_clean_shutdown();

        if !self.active {
            return;
        }

        self.sender.fill_window();

        if segment.length_in_sequence_space() > 0 && self.sender.segments_out().is_empty() {
            self.sender.send_empty_segment();
        }

        self.flush();
    }

    /// Notifies the connection that `elapsed_ms` milliseconds have passed.
    pub fn tick(&mut self, elapsed_ms: u64) {
        if !self.active {
            return;
        }

        self.time_since_last_segment_received_ms += elapsed_ms;

        self.sender.tick(elapsed_ms);

        if self.sender.consecutive_retransmissions() > self.config.max_retx_attempts {
            debug!(
                "giving up after {} retransmissions",
                self.sender.consecutive_retransmissions()
            );
            self.shutdown(true, Some(ErrorKind::Timeout));
            return;
        }

        self.flush();

        if self.state().named() == Some(State::TimeWait)
            && self.time_since_last_segment_received_ms
                >= TIME_WAIT_RTO_MULTIPLE * self.config.rt_timeout_ms
        {
            debug!("TIME_WAIT expired");
            self.active = false;
        }
    }

    /// False once the connection has closed or been reset. An inactive connection ignores
    /// further input.
    pub fn active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> TcpState {
        TcpState::new(&self.sender, &self.receiver, self.active, self.linger)
    }

    /// Why the connection was reset, if it was reset by the peer or timed out.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn inbound_stream(&self) -> &ByteStream {
        self.receiver.stream_out()
    }

    pub fn inbound_stream_mut(&mut self) -> &mut ByteStream {
        self.receiver.stream_out_mut()
    }

    pub fn remaining_outbound_capacity(&self) -> usize {
        self.sender.stream_in().remaining_capacity()
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.sender.bytes_in_flight()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.receiver.unassembled_bytes()
    }

    pub fn time_since_last_segment_received(&self) -> u64 {
        self.time_since_last_segment_received_ms
    }

    /// Segments waiting to be transmitted, oldest first.
    pub fn segments_out(&mut self) -> &mut VecDeque<Segment> {
        &mut self.segments_out
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.active {
            warn!("connection dropped while active");
        }
    }
}

fn state_label(state: &TcpState) -> String {
    match state.named() {
        Some(named) => named.to_string(),
        None => format!("({})", state),
    }
}
