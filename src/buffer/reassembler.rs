use std::collections::BTreeMap;

use super::ByteStream;

// Stream layout relative to the output stream:
//
//   bytes_read  next_index            next_index + capacity
//   v           v                     v
// --[###########]___aaa__bbbb_________-------> stream index
//
// #: buffered in the output stream, unread
// a, b: pending fragments, not yet contiguous
// _: acceptable but not yet received

/// Assembles possibly-overlapping, possibly-out-of-order substrings of a byte stream into an
/// in-order [`ByteStream`].
#[derive(Debug)]
pub struct Reassembler {
    // Pending fragments keyed by stream index, pairwise non-overlapping and non-adjacent
    pending: BTreeMap<u64, Vec<u8>>,
    // Sum of pending fragment lengths
    unassembled: usize,
    // Next stream index to be written to the output
    next_index: u64,
    // Stream index of the end of input, once known
    eof_index: Option<u64>,
    capacity: usize,
    output: ByteStream,
}

impl Reassembler {
    /// Creates a reassembler which will hold up to `capacity` bytes, counting both assembled
    /// bytes waiting in the output stream and pending fragments.
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            unassembled: 0,
            next_index: 0,
            eof_index: None,
            capacity,
            output: ByteStream::new(capacity),
        }
    }

    /// Receives a substring whose first byte sits at stream index `index`, and writes any newly
    /// contiguous bytes into the output stream. Data which does not fit is dropped; if any of
    /// `data` was dropped for that reason, `is_end` is disregarded.
    pub fn push_substring(&mut self, data: &[u8], index: u64, is_end: bool) {
        let end = index + data.len() as u64;

        if end <= self.next_index {
            // Everything here has already been assembled. Only an end marker at the cursor
            // still means something.
            if is_end && end == self.next_index {
                self.eof_index = Some(end);
            }

            self.close_if_finished();
            return;
        }

        // Trim the already-assembled prefix
        let (start, data) = if index < self.next_index {
            let skip = (self.next_index - index) as usize;
            (self.next_index, &data[skip..])
        } else {
            (index, data)
        };

        let window_end = self.next_index + self.capacity as u64;

        if start >= window_end {
            return;
        }

        let budget = self
            .capacity
            .saturating_sub(self.unassembled + self.output.buffer_size());
        let limit = budget.min((window_end - start) as usize);

        let truncated = data.len() > limit;
        let data = &data[..data.len().min(limit)];

        if is_end && !truncated {
            self.eof_index = Some(end);
        }

        if !data.is_empty() {
            self.insert(start, data);
            self.deliver();
        }

        self.close_if_finished();
    }

    fn insert(&mut self, start: u64, data: &[u8]) {
        let mut new_start = start;
        let mut new_end = start + data.len() as u64;

        // Fragments touching [new_start, new_end]. Fragment ends increase with their starts, so
        // walking backward from new_end we can stop at the first one ending before new_start.
        let mergeable: Vec<u64> = self
            .pending
            .range(..=new_end)
            .rev()
            .take_while(|&(&lo, fragment)| lo + fragment.len() as u64 >= new_start)
            .map(|(&lo, _)| lo)
            .collect();

        let mut merged = data.to_vec();

        for lo in mergeable {
            let fragment = match self.pending.remove(&lo) {
                Some(fragment) => fragment,
                None => continue,
            };

            self.unassembled -= fragment.len();

            let hi = lo + fragment.len() as u64;

            if lo < new_start {
                let mut prefixed = fragment[..(new_start - lo) as usize].to_vec();
                prefixed.extend_from_slice(&merged);
                merged = prefixed;
                new_start = lo;
            }

            if hi > new_end {
                let suffix_len = (hi - new_end) as usize;
                merged.extend_from_slice(&fragment[fragment.len() - suffix_len..]);
                new_end = hi;
            }
        }

        self.unassembled += merged.len();
        self.pending.insert(new_start, merged);
    }

    fn deliver(&mut self) {
        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() != self.next_index {
                break;
            }

            let fragment = entry.remove();
            let written = self.output.write(&fragment);

            self.unassembled -= written;
            self.next_index += written as u64;

            if written < fragment.len() {
                // Output is full, keep the remainder for later
                self.pending
                    .insert(self.next_index, fragment[written..].to_vec());
                break;
            }
        }
    }

    fn close_if_finished(&mut self) {
        if let Some(eof_index) = self.eof_index {
            if self.next_index >= eof_index {
                self.output.end_input();
            }
        }
    }

    /// Number of bytes stored in pending fragments. Each stream index is counted once.
    pub fn unassembled_bytes(&self) -> usize {
        self.unassembled
    }

    /// True if no fragments are waiting to be assembled.
    pub fn empty(&self) -> bool {
        self.unassembled == 0
    }

    /// Stream index of the next byte expected by the output stream.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// True once the end of the stream has been written to the output.
    pub fn finished(&self) -> bool {
        self.output.input_ended()
    }

    pub fn window_size(&self) -> usize {
        self.capacity - self.output.buffer_size()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stream_out(&self) -> &ByteStream {
        &self.output
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }
}
