// Bounded FIFO of bytes with a fixed-size ring as backing storage.
//
//        head       head+len
//        v          v
// -------##########-------   (may wrap around the end of storage)
//
// #: buffered, unread

#[derive(Debug)]
pub struct ByteStream {
    storage: Box<[u8]>,
    head: usize,
    len: usize,

    bytes_written: u64,
    bytes_read: u64,

    input_ended: bool,
    error: bool,
}

impl ByteStream {
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
            bytes_written: 0,
            bytes_read: 0,
            input_ended: false,
            error: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Writes as many bytes from `data` as will fit and returns the number accepted. Nothing is
    /// accepted once input has ended.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.input_ended {
            return 0;
        }

        let count = data.len().min(self.remaining_capacity());

        if count == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let tail = (self.head + self.len) % capacity;

        // Copy up to the end of storage, then wrap
        let first_len = count.min(capacity - tail);
        self.storage[tail..tail + first_len].copy_from_slice(&data[..first_len]);
        self.storage[..count - first_len].copy_from_slice(&data[first_len..count]);

        self.len += count;
        self.bytes_written += count as u64;

        count
    }

    /// Copies up to `len` bytes from the output side of the buffer.
    pub fn peek_output(&self, len: usize) -> Vec<u8> {
        let count = len.min(self.len);

        let mut out = Vec::with_capacity(count);

        if count > 0 {
            let capacity = self.capacity();

            let first_len = count.min(capacity - self.head);
            out.extend_from_slice(&self.storage[self.head..self.head + first_len]);
            out.extend_from_slice(&self.storage[..count - first_len]);
        }

        out
    }

    /// Discards up to `len` bytes from the output side of the buffer.
    pub fn pop_output(&mut self, len: usize) {
        let count = len.min(self.len);

        if count > 0 {
            self.head = (self.head + count) % self.capacity();
            self.len -= count;
            self.bytes_read += count as u64;
        }
    }

    /// Equivalent to calling [`ByteStream::peek_output`] followed by [`ByteStream::pop_output`].
    pub fn read(&mut self, len: usize) -> Vec<u8> {
        let out = self.peek_output(len);
        self.pop_output(out.len());
        out
    }

    pub fn end_input(&mut self) {
        self.input_ended = true;
    }

    pub fn input_ended(&self) -> bool {
        self.input_ended
    }

    pub fn buffer_size(&self) -> usize {
        self.len
    }

    pub fn buffer_empty(&self) -> bool {
        self.len == 0
    }

    /// True once input has ended and every buffered byte has been read.
    pub fn eof(&self) -> bool {
        self.input_ended && self.len == 0
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity() - self.len
    }

    pub fn set_error(&mut self) {
        self.error = true;
    }

    pub fn error(&self) -> bool {
        self.error
    }
}
