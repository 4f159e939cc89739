use std::fmt;
use std::ops;

const WRAP: u64 = 1 << 32;

/// A 32-bit TCP sequence number. Arithmetic wraps modulo 2^32.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct SeqNum(pub u32);

impl SeqNum {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw_value(self) -> u32 {
        self.0
    }
}

impl ops::Add<u32> for SeqNum {
    type Output = SeqNum;

    fn add(self, rhs: u32) -> SeqNum {
        SeqNum(self.0.wrapping_add(rhs))
    }
}

impl ops::Sub<u32> for SeqNum {
    type Output = SeqNum;

    fn sub(self, rhs: u32) -> SeqNum {
        SeqNum(self.0.wrapping_sub(rhs))
    }
}

impl ops::Sub for SeqNum {
    type Output = u32;

    /// Forward distance from `rhs` to `self`.
    fn sub(self, rhs: SeqNum) -> u32 {
        self.0.wrapping_sub(rhs.0)
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Converts an absolute 64-bit sequence number (zero at the ISN) into its 32-bit wire value.
pub fn wrap(absolute: u64, isn: SeqNum) -> SeqNum {
    isn + absolute as u32
}

/// Returns the absolute sequence number which wraps to `n` and lies closest to `checkpoint`.
//
//   checkpoint & !0xFFFFFFFF
//   v
//   |----------------|----------------|----------------|
//          base - 2^32      base       base + 2^32
//
// Only the three candidates in the neighborhood of the checkpoint's wrap count can be nearest.
pub fn unwrap(n: SeqNum, isn: SeqNum, checkpoint: u64) -> u64 {
    let delta = (n - isn) as u64;
    let base = (checkpoint & !(WRAP - 1)) + delta;

    let mut best = base;

    let above = base + WRAP;
    if above.abs_diff(checkpoint) < best.abs_diff(checkpoint) {
        best = above;
    }

    if base >= WRAP {
        let below = base - WRAP;
        if below.abs_diff(checkpoint) < best.abs_diff(checkpoint) {
            best = below;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::Rng;

    #[test]
    fn wrap_basic() {
        assert_eq!(wrap(0, SeqNum(0)), SeqNum(0));
        assert_eq!(wrap(3 * WRAP, SeqNum(0)), SeqNum(0));
        assert_eq!(wrap(3 * WRAP + 17, SeqNum(15)), SeqNum(32));
        assert_eq!(wrap(7 * WRAP - 2, SeqNum(15)), SeqNum(13));
        assert_eq!(wrap(1, SeqNum(u32::MAX)), SeqNum(0));
    }

    #[test]
    fn unwrap_basic() {
        // Unwrap the first byte after ISN
        assert_eq!(unwrap(SeqNum(1), SeqNum(0), 0), 1);
        // Unwrap the first byte after the first wrap
        assert_eq!(unwrap(SeqNum(1), SeqNum(0), u32::MAX as u64), WRAP + 1);
        // Unwrap the last byte before the third wrap
        assert_eq!(unwrap(SeqNum(u32::MAX - 1), SeqNum(0), 3 * WRAP), 3 * WRAP - 2);
        // Unwrap the 10th from last byte before the third wrap
        assert_eq!(unwrap(SeqNum(u32::MAX - 10), SeqNum(0), 3 * WRAP), 3 * WRAP - 11);
        // Non-zero ISN
        assert_eq!(unwrap(SeqNum(u32::MAX), SeqNum(10), 3 * WRAP), 3 * WRAP - 11);
        // Big unwrap
        assert_eq!(unwrap(SeqNum(u32::MAX), SeqNum(0), 0), u32::MAX as u64);
        // Unwrap a non-zero ISN
        assert_eq!(unwrap(SeqNum(16), SeqNum(16), 0), 0);
        // Big unwrap with non-zero ISN
        assert_eq!(unwrap(SeqNum(15), SeqNum(16), 0), u32::MAX as u64);
        // Big unwrap with non-zero ISN
        assert_eq!(unwrap(SeqNum(0), SeqNum(i32::MAX as u32), 0), (i32::MAX as u64) + 2);
        // Barely big unwrap with non-zero ISN
        assert_eq!(unwrap(SeqNum(u32::MAX), SeqNum(i32::MAX as u32), 0), 1 << 31);
        // Nearly big unwrap with non-zero ISN
        assert_eq!(
            unwrap(SeqNum(u32::MAX), SeqNum(1 << 31), 0),
            (u32::MAX as u64) >> 1
        );
    }

    #[test]
    fn unwrap_near_checkpoint() {
        let mut rng = rand::thread_rng();

        for _ in 0..100_000 {
            let isn = SeqNum(rng.gen());
            let checkpoint: u64 = rng.gen_range(0..(1u64 << 48));
            let offset: i64 = rng.gen_range(-(1i64 << 31) + 1..(1i64 << 31));

            let absolute = checkpoint.saturating_add_signed(offset);

            assert_eq!(unwrap(wrap(absolute, isn), isn, checkpoint), absolute);
        }
    }

    #[test]
    fn seqnum_arithmetic() {
        assert_eq!(SeqNum(u32::MAX) + 2, SeqNum(1));
        assert_eq!(SeqNum(1) - 2, SeqNum(u32::MAX));
        assert_eq!(SeqNum(1) - SeqNum(u32::MAX), 2);
    }
}
