pub mod serial;

use crate::segment::{Header, Segment};

use serial::Serial;

pub use serial::HEADER_SIZE;

/// Serializes a segment as an option-less TCP header followed by the payload.
pub fn write_segment(segment: &Segment) -> Box<[u8]> {
    let mut buf = vec![0; HEADER_SIZE + segment.payload.len()];

    // The buffer is always large enough
    let header_len = Header::write(&mut buf, &segment.header).unwrap_or(HEADER_SIZE);

    buf[header_len..].copy_from_slice(&segment.payload);

    buf.into_boxed_slice()
}

/// Parses a segment written by [`write_segment`]. Returns `None` if the frame is truncated or
/// malformed.
pub fn read_segment(frame_bytes: &[u8]) -> Option<Segment> {
    let (header, header_len) = Header::read(frame_bytes)?;

    Some(Segment {
        header,
        payload: frame_bytes[header_len..].into(),
    })
}
