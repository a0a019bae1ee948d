//! Fixed-Capacity Byte Ring Buffer
//!
//! Both directions of a connection use the same circular buffer. Data lives
//! between a logical head (`start`) and `start + size`, taken modulo the
//! capacity, so the readable region may wrap past the physical end:
//!
//! ```text
//!          tail            start
//!           │                │
//!           ▼                ▼
//! ┌─────────┬────────────────┬──────────────┐
//! │ data... │   free space   │   data...    │
//! └─────────┴────────────────┴──────────────┘
//! 0                                      capacity
//! ```
//!
//! Copies that cross the boundary are split into at most two `copy_from_slice`
//! calls. The `continuous_*` spans tell the I/O layer how much it can hand to a
//! single `read`/`write` system call without crossing the boundary.

/// A fixed-capacity circular byte buffer.
///
/// Writes never grow the buffer: anything past [`available_space`] is
/// silently dropped, so callers check room before writing.
///
/// [`available_space`]: RingBuffer::available_space
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: Box<[u8]>,
    start: usize,
    size: usize,
}

impl RingBuffer {
    /// Creates an empty buffer.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            size: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    /// Number of bytes that can still be written.
    #[inline]
    pub fn available_space(&self) -> usize {
        self.capacity() - self.size
    }

    #[inline]
    fn tail(&self) -> usize {
        (self.start + self.size) % self.capacity()
    }

    /// Bytes readable from the head without crossing the physical end.
    pub fn continuous_read_span(&self) -> usize {
        self.size.min(self.capacity() - self.start)
    }

    /// Bytes writable at the tail without crossing the physical end.
    pub fn continuous_write_span(&self) -> usize {
        self.available_space().min(self.capacity() - self.tail())
    }

    /// The contiguous readable region starting at the head.
    pub fn read_slice(&self) -> &[u8] {
        let span = self.continuous_read_span();
        &self.buf[self.start..self.start + span]
    }

    /// The contiguous writable region starting at the tail.
    ///
    /// Bytes placed here become readable only after [`commit`](Self::commit).
    pub fn write_slice(&mut self) -> &mut [u8] {
        let tail = self.tail();
        let span = self.continuous_write_span();
        &mut self.buf[tail..tail + span]
    }

    /// Marks `n` bytes written through [`write_slice`](Self::write_slice) as held.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(n <= self.continuous_write_span());
        self.size += n.min(self.available_space());
    }

    /// Discards up to `n` bytes from the head, returning how many were dropped.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.size);
        self.start = (self.start + n) % self.capacity();
        self.size -= n;
        n
    }

    /// Copies up to `out.len()` bytes from the head without removing them.
    pub fn peek(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.size);
        let first = n.min(self.capacity() - self.start);
        out[..first].copy_from_slice(&self.buf[self.start..self.start + first]);
        if first < n {
            out[first..n].copy_from_slice(&self.buf[..n - first]);
        }
        n
    }

    /// Removes up to `out.len()` bytes from the head into `out`.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = self.peek(out);
        self.consume(n)
    }

    /// Appends as much of `data` as fits, returning the number of bytes taken.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.available_space());
        let tail = self.tail();
        let first = n.min(self.capacity() - tail);
        self.buf[tail..tail + first].copy_from_slice(&data[..first]);
        if first < n {
            self.buf[..n - first].copy_from_slice(&data[first..n]);
        }
        self.size += n;
        n
    }
}
