use std::fmt;

use super::seqnum::SeqNum;

/// TCP header fields consumed and produced by the core. Options are not supported.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Header {
    pub sport: u16,
    pub dport: u16,
    pub seqno: SeqNum,
    pub ackno: SeqNum,
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,
    pub win: u16,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Segment {
    pub header: Header,
    pub payload: Box<[u8]>,
}

impl Segment {
    /// Number of sequence numbers occupied: SYN and FIN count for one each.
    pub fn length_in_sequence_space(&self) -> u64 {
        self.payload.len() as u64 + self.header.syn as u64 + self.header.fin as u64
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flags = [
            (self.urg, 'U'),
            (self.ack, 'A'),
            (self.psh, 'P'),
            (self.rst, 'R'),
            (self.syn, 'S'),
            (self.fin, 'F'),
        ];

        for (set, c) in flags {
            write!(f, "{}", if set { c } else { '-' })?;
        }

        write!(f, " seqno={}", self.seqno)?;

        if self.ack {
            write!(f, " ackno={}", self.ackno)?;
        }

        write!(f, " win={}", self.win)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} len={}", self.header, self.payload.len())
    }
}
