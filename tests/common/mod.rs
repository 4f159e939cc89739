pub mod link;

use bramble::{Header, Segment, SeqNum};

/// Builds a segment from the given header fields and payload.
pub fn segment(header: Header, payload: &[u8]) -> Segment {
    Segment {
        header,
        payload: payload.to_vec().into(),
    }
}

/// An acknowledgment-bearing header with the given seqno, ackno and window.
pub fn ack_header(seqno: SeqNum, ackno: SeqNum, win: u16) -> Header {
    Header {
        seqno,
        ackno,
        ack: true,
        win,
        ..Default::default()
    }
}

/// Deterministic pseudo-random bytes.
pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    use rand::{RngCore, SeedableRng};

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut bytes = vec![0; len];
    rng.fill_bytes(&mut bytes);
    bytes
}
