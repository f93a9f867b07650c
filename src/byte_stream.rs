//! A bounded in-memory byte pipe with EOF and error signalling.
//!
//! One [`ByteStream`] carries one direction of application data.  The
//! producer uses the [`Writer`] view (append, close, flag errors) and the
//! consumer the [`Reader`] view (peek, pop).  `peek` + `pop` instead of a
//! copying `read` lets the consumer hand buffered bytes straight into
//! segment payloads.
//!
//! Capacity bounds the bytes *buffered*, not the bytes transported: the
//! cumulative `bytes_pushed` / `bytes_popped` counters grow without bound
//! and double as absolute stream indices for the reassembler.

use std::collections::VecDeque;

#[derive(Debug)]
pub struct ByteStream {
    capacity: usize,
    buf: VecDeque<u8>,
    closed: bool,
    error: bool,
    pushed: u64,
    popped: u64,
}

impl ByteStream {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buf: VecDeque::with_capacity(capacity.min(4096)),
            closed: false,
            error: false,
            pushed: 0,
            popped: 0,
        }
    }

    /// The producer's view of this stream.
    pub fn writer(&mut self) -> Writer<'_> {
        Writer { stream: self }
    }

    /// The consumer's view of this stream.
    pub fn reader(&mut self) -> Reader<'_> {
        Reader { stream: self }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bytes_buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn available_capacity(&self) -> usize {
        self.capacity - self.buf.len()
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.pushed
    }

    pub fn bytes_popped(&self) -> u64 {
        self.popped
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closed and fully drained.
    pub fn is_finished(&self) -> bool {
        self.closed && self.buf.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.error
    }
}

/// Write half of a [`ByteStream`].
pub struct Writer<'a> {
    stream: &'a mut ByteStream,
}

impl Writer<'_> {
    /// Append as much of `data` as capacity allows, discarding the rest.
    /// Returns the number of bytes accepted.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.stream.available_capacity());
        self.stream.buf.extend(&data[..n]);
        self.stream.pushed += n as u64;
        n
    }

    /// Signal that no further bytes will be pushed.  Idempotent.
    pub fn close(&mut self) {
        self.stream.closed = true;
    }

    /// Flag the stream as errored.  Sticky.
    pub fn set_error(&mut self) {
        self.stream.error = true;
    }

    pub fn is_closed(&self) -> bool {
        self.stream.closed
    }

    pub fn available_capacity(&self) -> usize {
        self.stream.available_capacity()
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.stream.pushed
    }
}

/// Read half of a [`ByteStream`].
pub struct Reader<'a> {
    stream: &'a mut ByteStream,
}

impl Reader<'_> {
    /// A contiguous view of buffered bytes.  Non-empty whenever
    /// `bytes_buffered() > 0`, but possibly shorter than the full backlog;
    /// loop `peek` + `pop` to see everything.
    pub fn peek(&self) -> &[u8] {
        let (front, back) = self.stream.buf.as_slices();
        if front.is_empty() {
            back
        } else {
            front
        }
    }

    /// Remove `n` bytes from the front of the buffer.
    ///
    /// # Panics
    ///
    /// Panics when `n` exceeds `bytes_buffered()` — that is a caller bug,
    /// not a recoverable condition.
    pub fn pop(&mut self, n: usize) {
        assert!(
            n <= self.stream.buf.len(),
            "pop of {n} bytes exceeds {} buffered",
            self.stream.buf.len()
        );
        self.stream.buf.drain(..n);
        self.stream.popped += n as u64;
    }

    pub fn is_finished(&self) -> bool {
        self.stream.is_finished()
    }

    pub fn has_error(&self) -> bool {
        self.stream.error
    }

    pub fn bytes_buffered(&self) -> usize {
        self.stream.buf.len()
    }

    pub fn bytes_popped(&self) -> u64 {
        self.stream.popped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop_in_order() {
        let mut stream = ByteStream::new(16);
        assert_eq!(stream.writer().push(b"hello"), 5);
        assert_eq!(stream.bytes_pushed(), 5);
        assert_eq!(stream.bytes_buffered(), 5);

        let mut reader = stream.reader();
        assert_eq!(reader.peek(), b"hello");
        reader.pop(2);
        assert_eq!(reader.peek(), b"llo");
        assert_eq!(reader.bytes_popped(), 2);
        assert_eq!(stream.bytes_buffered(), 3);
    }

    #[test]
    fn push_beyond_capacity_truncates() {
        let mut stream = ByteStream::new(4);
        assert_eq!(stream.writer().push(b"abcdef"), 4);
        assert_eq!(stream.bytes_pushed(), 4);
        assert_eq!(stream.available_capacity(), 0);
        assert_eq!(stream.writer().push(b"x"), 0);

        stream.reader().pop(2);
        assert_eq!(stream.available_capacity(), 2);
        assert_eq!(stream.writer().push(b"ef"), 2);
        assert_eq!(stream.bytes_pushed(), 6);
    }

    #[test]
    fn accounting_invariant_holds() {
        let mut stream = ByteStream::new(8);
        stream.writer().push(b"12345678");
        stream.reader().pop(3);
        stream.writer().push(b"abc");
        assert_eq!(
            stream.bytes_pushed() - stream.bytes_popped(),
            stream.bytes_buffered() as u64
        );
        assert!(stream.bytes_buffered() <= stream.capacity());
    }

    #[test]
    fn close_then_drain_finishes() {
        let mut stream = ByteStream::new(8);
        stream.writer().push(b"bye");
        stream.writer().close();
        assert!(stream.is_closed());
        assert!(!stream.is_finished());

        stream.reader().pop(3);
        assert!(stream.is_finished());
        assert!(stream.reader().is_finished());
    }

    #[test]
    fn close_is_idempotent() {
        let mut stream = ByteStream::new(8);
        stream.writer().close();
        stream.writer().close();
        assert!(stream.is_finished());
    }

    #[test]
    fn error_flag_is_sticky() {
        let mut stream = ByteStream::new(8);
        stream.writer().set_error();
        assert!(stream.has_error());
        assert!(stream.reader().has_error());
    }

    #[test]
    fn peek_is_nonempty_while_buffered() {
        let mut stream = ByteStream::new(4);
        // Force wraparound inside the ring buffer.
        stream.writer().push(b"abcd");
        stream.reader().pop(3);
        stream.writer().push(b"ef");
        let mut collected = Vec::new();
        while stream.bytes_buffered() > 0 {
            let mut reader = stream.reader();
            let view = reader.peek();
            assert!(!view.is_empty());
            let n = view.len();
            collected.extend_from_slice(view);
            reader.pop(n);
        }
        assert_eq!(collected, b"def");
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn pop_past_buffered_panics() {
        let mut stream = ByteStream::new(8);
        stream.writer().push(b"ab");
        stream.reader().pop(3);
    }
}
