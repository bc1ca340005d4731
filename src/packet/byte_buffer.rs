// src/packet/byte_buffer.rs

use crate::common::error::VnError;

/// Fixed-capacity ring of received bytes awaiting synchronization.
///
/// Writes are all-or-nothing and never overwrite unread data.
#[derive(Debug)]
pub struct ByteBuffer {
    data: Box<[u8]>,
    head: usize,
    len: usize,
}

impl ByteBuffer {
    pub fn new(capacity: usize) -> Self {
        ByteBuffer { data: vec![0; capacity].into_boxed_slice(), head: 0, len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free space.
    pub fn available(&self) -> usize {
        self.capacity() - self.len
    }

    /// Appends `bytes`, or nothing at all when they do not fit.
    pub fn put(&mut self, bytes: &[u8]) -> Result<(), VnError> {
        if bytes.len() > self.available() {
            return Err(VnError::BufferFull { needed: bytes.len(), available: self.available() });
        }
        let cap = self.capacity();
        let tail = (self.head + self.len) % cap.max(1);
        let first = bytes.len().min(cap - tail);
        self.data[tail..tail + first].copy_from_slice(&bytes[..first]);
        self.data[..bytes.len() - first].copy_from_slice(&bytes[first..]);
        self.len += bytes.len();
        Ok(())
    }

    /// Contiguous view of every unread byte.
    ///
    /// Rotates the storage when the unread region wraps, so the cost is paid at most once per
    /// wrap.
    pub fn peek(&mut self) -> &[u8] {
        if self.head + self.len > self.capacity() {
            self.data.rotate_left(self.head);
            self.head = 0;
        }
        &self.data[self.head..self.head + self.len]
    }

    /// Consumes up to `n` bytes from the front.
    pub fn discard(&mut self, n: usize) {
        let n = n.min(self.len);
        self.len -= n;
        self.head = if self.len == 0 { 0 } else { (self.head + n) % self.capacity() };
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
