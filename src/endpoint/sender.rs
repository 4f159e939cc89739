use std::collections::VecDeque;

use log::trace;

use super::timer::Timer;
use super::MAX_PAYLOAD_SIZE;
use crate::buffer::ByteStream;
use crate::segment::Segment;
use crate::seqnum::{self, SeqNum};

//              highest_ack     next_seqno    highest_ack + window
//              v               v             v
// -------------################______________--------> absolute seqno
//
// #: in flight (outstanding)
// _: sendable

struct Outstanding {
    // Absolute seqno one past the end of this segment
    end_seqno: u64,
    // Number of times this segment has been resent
    retx_count: u32,
    segment: Segment,
}

/// Divides an outbound [`ByteStream`] into segments, tracks which segments are in flight, and
/// resends the oldest outstanding segment whenever the retransmission timer expires.
pub struct Sender {
    isn: SeqNum,

    // Segments ready to be handed to the connection
    segments_out: VecDeque<Segment>,

    initial_rto_ms: u64,
    rto_ms: u64,
    timer: Timer,

    stream: ByteStream,

    next_seqno: u64,
    highest_ack: u64,
    window_size: u16,

    // Sum of the sequence lengths in `outstanding`
    bytes_in_flight: u64,
    outstanding: VecDeque<Outstanding>,

    fin_sent: bool,
}

impl Sender {
    pub fn new(capacity: usize, rt_timeout_ms: u64, fixed_isn: Option<SeqNum>) -> Self {
        let isn = fixed_isn.unwrap_or_else(|| SeqNum(rand::random::<u32>()));

        Self {
            isn,
            segments_out: VecDeque::new(),
            initial_rto_ms: rt_timeout_ms,
            rto_ms: rt_timeout_ms,
            timer: Timer::new(),
            stream: ByteStream::new(capacity),
            next_seqno: 0,
            highest_ack: 0,
            window_size: 1,
            bytes_in_flight: 0,
            outstanding: VecDeque::new(),
            fin_sent: false,
        }
    }

    fn send(&mut self, mut segment: Segment) {
        segment.header.seqno = seqnum::wrap(self.next_seqno, self.isn);

        let len = segment.length_in_sequence_space();

        self.next_seqno += len;
        self.bytes_in_flight += len;

        self.outstanding.push_back(Outstanding {
            end_seqno: self.next_seqno,
            retx_count: 0,
            segment: segment.clone(),
        });

        // Acks are expected, set the resend timeout if not set already
        self.timer.start(self.rto_ms);

        trace!("send {}", segment);

        self.segments_out.push_back(segment);
    }

    /// Creates and queues as many segments as the stream and the receiver's window allow.
    pub fn fill_window(&mut self) {
        if self.next_seqno == 0 {
            // The connection opens with a lone SYN
            let mut segment = Segment::default();
            segment.header.syn = true;
            self.send(segment);
            return;
        }

        // A zero window is probed with a single byte
        let window = u64::from(self.window_size.max(1));

        while !self.fin_sent {
            let span = self.next_seqno - self.highest_ack;

            if span >= window {
                break;
            }

            let budget = (window - span).min(MAX_PAYLOAD_SIZE as u64) as usize;

            let mut payload = self.stream.read(budget - 1);
            let extra = self.stream.read(1);

            let mut fin = false;

            if extra.is_empty() {
                if self.stream.eof() {
                    fin = true;
                } else if payload.is_empty() {
                    // Nothing ready
                    break;
                }
            } else {
                payload.extend_from_slice(&extra);
            }

            let mut segment = Segment::default();
            segment.header.fin = fin;
            segment.payload = payload.into_boxed_slice();

            self.fin_sent = fin;
            self.send(segment);
        }
    }

    /// True if `ackno` acknowledges nothing beyond what has been sent.
    pub fn ack_is_legal(&self, ackno: SeqNum) -> bool {
        seqnum::unwrap(ackno, self.isn, self.highest_ack) <= self.next_seqno
    }

    /// Processes an acknowledgment from the remote receiver. Returns false if `ackno`
    /// acknowledges data which has not been sent.
    pub fn ack_received(&mut self, ackno: SeqNum, window_size: u16) -> bool {
        let ack = seqnum::unwrap(ackno, self.isn, self.highest_ack);

        if ack > self.next_seqno {
            return false;
        }

        if ack < self.highest_ack {
            // Stale
            return true;
        }

        self.window_size = window_size;

        if ack > self.highest_ack {
            self.highest_ack = ack;

            let mut released = false;

            while let Some(front) = self.outstanding.front() {
                if front.end_seqno > ack {
                    break;
                }

                self.bytes_in_flight -= front.segment.length_in_sequence_space();
                self.outstanding.pop_front();

                released = true;
            }

            if released {
                self.rto_ms = self.initial_rto_ms;

                if self.outstanding.is_empty() {
                    self.timer.stop();
                } else {
                    self.timer.restart(self.rto_ms);
                }
            }
        }

        self.fill_window();

        true
    }

    /// Notifies the sender that `elapsed_ms` milliseconds have passed.
    pub fn tick(&mut self, elapsed_ms: u64) {
        if !self.timer.tick(elapsed_ms) {
            return;
        }

        if let Some(front) = self.outstanding.front_mut() {
            front.retx_count += 1;

            trace!(
                "resend {} (attempt {}, rto {}ms)",
                front.segment,
                front.retx_count,
                self.rto_ms
            );

            self.segments_out.push_back(front.segment.clone());

            self.rto_ms = self.rto_ms.saturating_mul(2);
            self.timer.start(self.rto_ms);
        }
    }

    /// Queues a segment which occupies no sequence space, for pure acknowledgments.
    pub fn send_empty_segment(&mut self) {
        let mut segment = Segment::default();
        segment.header.seqno = self.next_seqno();
        self.segments_out.push_back(segment);
    }

    /// Number of times in a row the oldest outstanding segment has been resent.
    pub fn consecutive_retransmissions(&self) -> u32 {
        self.outstanding
            .front()
            .map(|front| front.retx_count)
            .unwrap_or(0)
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    pub fn next_seqno_absolute(&self) -> u64 {
        self.next_seqno
    }

    pub fn next_seqno(&self) -> SeqNum {
        seqnum::wrap(self.next_seqno, self.isn)
    }

    /// True once the FIN has been sent, whether or not it has been acknowledged.
    pub fn fin_sent(&self) -> bool {
        self.fin_sent
    }

    pub fn stream_in(&self) -> &ByteStream {
        &self.stream
    }

    pub fn stream_in_mut(&mut self) -> &mut ByteStream {
        &mut self.stream
    }

    pub fn segments_out(&mut self) -> &mut VecDeque<Segment> {
        &mut self.segments_out
    }
}
