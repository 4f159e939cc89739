use log::trace;

use crate::buffer::{ByteStream, Reassembler};
use crate::segment::Segment;
use crate::seqnum::{self, SeqNum};

/// Converts inbound segments into stream substrings for the reassembler, and tracks the
/// acknowledgment number and window to advertise back to the sender.
#[derive(Debug)]
pub struct Receiver {
    reassembler: Reassembler,
    // Peer's ISN, known once a SYN has been received
    isn: Option<SeqNum>,
}

impl Receiver {
    pub fn new(capacity: usize) -> Self {
        Self {
            reassembler: Reassembler::new(capacity),
            isn: None,
        }
    }

    // Stream index of the first payload byte in `segment`, if it can be placed
    fn stream_index(&self, isn: SeqNum, segment: &Segment) -> Option<u64> {
        if segment.header.syn {
            return Some(0);
        }

        let checkpoint = self.reassembler.next_index();
        let absolute = seqnum::unwrap(segment.header.seqno, isn, checkpoint);

        // Absolute zero belongs to the SYN
        absolute.checked_sub(1)
    }

    fn overlaps_window(&self, index: u64, len: u64) -> bool {
        let window_start = self.reassembler.next_index();
        let window_end = window_start + self.reassembler.window_size() as u64;

        if len == 0 {
            index == window_start || (index > window_start && index < window_end)
        } else {
            index < window_end && index + len > window_start
        }
    }

    /// Processes an inbound segment. Returns false if the segment was rejected.
    pub fn segment_received(&mut self, segment: &Segment) -> bool {
        let header = &segment.header;

        let isn = match self.isn {
            Some(isn) => {
                if header.syn {
                    // Duplicate SYN
                    return false;
                }
                isn
            }
            None => {
                if !header.syn {
                    return false;
                }

                trace!("peer isn {}", header.seqno);

                self.isn = Some(header.seqno);
                header.seqno
            }
        };

        if self.reassembler.finished() && segment.length_in_sequence_space() > 0 {
            return false;
        }

        let index = match self.stream_index(isn, segment) {
            Some(index) => index,
            None => return false,
        };

        if !header.syn && !self.overlaps_window(index, segment.payload.len() as u64) {
            return false;
        }

        self.reassembler
            .push_substring(&segment.payload, index, header.fin);

        true
    }

    /// True if `segment` occupies any part of the current receive window. Always false before
    /// the peer's ISN is known.
    pub fn in_window(&self, segment: &Segment) -> bool {
        let isn = match self.isn {
            Some(isn) => isn,
            None => return false,
        };

        match self.stream_index(isn, segment) {
            Some(index) => self.overlaps_window(index, segment.payload.len() as u64),
            None => false,
        }
    }

    /// The next sequence number expected from the peer, once the peer's ISN is known.
    pub fn ackno(&self) -> Option<SeqNum> {
        self.isn.map(|isn| {
            // SYN, plus FIN once it has been assembled
            let absolute = self.reassembler.next_index() + 1 + self.reassembler.finished() as u64;
            seqnum::wrap(absolute, isn)
        })
    }

    pub fn window_size(&self) -> usize {
        self.reassembler.window_size()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.reassembler.unassembled_bytes()
    }

    pub fn stream_out(&self) -> &ByteStream {
        self.reassembler.stream_out()
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        self.reassembler.stream_out_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::segment::Header;

    const ISN: SeqNum = SeqNum(0xFFFF_FFFE);

    fn segment(seqno: SeqNum, syn: bool, fin: bool, payload: &[u8]) -> Segment {
        Segment {
            header: Header {
                seqno,
                syn,
                fin,
                ..Default::default()
            },
            payload: payload.to_vec().into(),
        }
    }

    fn read_all(receiver: &mut Receiver) -> Vec<u8> {
        let len = receiver.stream_out().buffer_size();
        receiver.stream_out_mut().read(len)
    }

    #[test]
    fn waits_for_syn() {
        let mut receiver = Receiver::new(4000);

        assert_eq!(receiver.ackno(), None);
        assert_eq!(receiver.segment_received(&segment(ISN + 1, false, false, b"abc")), false);
        assert_eq!(receiver.ackno(), None);
        assert_eq!(receiver.window_size(), 4000);

        assert_eq!(receiver.segment_received(&segment(ISN, true, false, b"")), true);
        assert_eq!(receiver.ackno(), Some(ISN + 1));
    }

    #[test]
    fn syn_with_payload_and_fin() {
        let mut receiver = Receiver::new(4000);

        assert!(receiver.segment_received(&segment(ISN, true, true, b"hello")));
        assert_eq!(receiver.ackno(), Some(ISN + 7));
        assert_eq!(read_all(&mut receiver), b"hello".to_vec());
        assert_eq!(receiver.stream_out().eof(), true);
    }

    #[test]
    fn duplicate_syn_rejected() {
        let mut receiver = Receiver::new(4000);

        assert!(receiver.segment_received(&segment(ISN, true, false, b"")));
        assert_eq!(receiver.segment_received(&segment(ISN, true, false, b"")), false);
        assert_eq!(receiver.segment_received(&segment(ISN + 5, true, false, b"x")), false);
        assert_eq!(receiver.ackno(), Some(ISN + 1));
    }

    #[test]
    fn out_of_order_across_wrap() {
        let mut receiver = Receiver::new(4000);

        assert!(receiver.segment_received(&segment(ISN, true, false, b"")));

        // ISN + 1 and onward wrap past zero
        assert!(receiver.segment_received(&segment(ISN + 5, false, false, b"efgh")));
        assert_eq!(receiver.ackno(), Some(ISN + 1));
        assert_eq!(receiver.unassembled_bytes(), 4);

        assert!(receiver.segment_received(&segment(ISN + 1, false, false, b"abcd")));
        assert_eq!(receiver.ackno(), Some(ISN + 9));
        assert_eq!(receiver.unassembled_bytes(), 0);
        assert_eq!(read_all(&mut receiver), b"abcdefgh".to_vec());
    }

    #[test]
    fn outside_window_rejected() {
        let mut receiver = Receiver::new(4);

        assert!(receiver.segment_received(&segment(ISN, true, false, b"")));

        // Starts right at the end of the window
        assert_eq!(receiver.segment_received(&segment(ISN + 5, false, false, b"e")), false);

        // Entirely before the window
        assert!(receiver.segment_received(&segment(ISN + 1, false, false, b"ab")));
        assert_eq!(receiver.segment_received(&segment(ISN + 1, false, false, b"a")), false);

        // Overlapping the start is fine
        assert!(receiver.segment_received(&segment(ISN + 1, false, false, b"abc")));
        assert_eq!(receiver.ackno(), Some(ISN + 4));
        assert_eq!(receiver.window_size(), 1);
    }

    #[test]
    fn zero_seqno_without_syn_rejected() {
        let mut receiver = Receiver::new(4000);

        assert!(receiver.segment_received(&segment(ISN, true, false, b"")));
        assert_eq!(receiver.segment_received(&segment(ISN, false, false, b"abc")), false);
        assert_eq!(receiver.stream_out().bytes_written(), 0);
    }

    #[test]
    fn fin_accounting() {
        let mut receiver = Receiver::new(4000);

        assert!(receiver.segment_received(&segment(ISN, true, false, b"")));

        // FIN ahead of the missing data
        assert!(receiver.segment_received(&segment(ISN + 3, false, true, b"c")));
        assert_eq!(receiver.ackno(), Some(ISN + 1));
        assert_eq!(receiver.stream_out().input_ended(), false);

        assert!(receiver.segment_received(&segment(ISN + 1, false, false, b"ab")));
        assert_eq!(receiver.ackno(), Some(ISN + 5));
        assert_eq!(receiver.stream_out().input_ended(), true);

        // Nothing further is accepted
        assert_eq!(receiver.segment_received(&segment(ISN + 5, false, false, b"d")), false);
    }

    #[test]
    fn window_membership() {
        let mut receiver = Receiver::new(10);

        assert_eq!(receiver.in_window(&segment(ISN + 1, false, false, b"")), false);

        assert!(receiver.segment_received(&segment(ISN, true, false, b"")));

        assert_eq!(receiver.in_window(&segment(ISN + 1, false, false, b"")), true);
        assert_eq!(receiver.in_window(&segment(ISN + 10, false, false, b"")), true);
        assert_eq!(receiver.in_window(&segment(ISN + 11, false, false, b"")), false);
        assert_eq!(receiver.in_window(&segment(ISN, false, false, b"")), false);
    }
}
