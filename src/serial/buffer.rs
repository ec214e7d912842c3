//! Bounded receive buffer for the emulated UART.
//!
//! Filled in one shot by a socket receive and drained one byte at a time by
//! the firmware. The available count only ever goes down between fills.

use bytes::{Buf, Bytes};

/// Default receive capacity in bytes.
pub const DEFAULT_BUFFER_LEN: usize = 256;

/// Fixed-capacity byte buffer with a read cursor.
#[derive(Debug, Clone)]
pub struct SerialBuffer {
    pending: Bytes,
    capacity: usize,
}

impl Default for SerialBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_LEN)
    }
}

impl SerialBuffer {
    /// Empty buffer holding at most `capacity` bytes per fill.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Bytes::new(),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replaces the contents with `data` and rewinds the cursor.
    ///
    /// Bytes beyond capacity are discarded. Returns the number stored.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(self.capacity);
        self.pending = Bytes::copy_from_slice(&data[..len]);
        len
    }

    /// Unread bytes remaining.
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.pending.remaining()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.pending.has_remaining()
    }

    /// Next unread byte, or `None` on underrun.
    pub fn take_byte(&mut self) -> Option<u8> {
        if self.pending.has_remaining() {
            Some(self.pending.get_u8())
        } else {
            None
        }
    }

    /// Drops any unread bytes.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let mut buf = SerialBuffer::new(16);
        assert_eq!(buf.capacity(), 16);
        assert_eq!(buf.available_count(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.take_byte(), None);
    }

    #[test]
    fn test_zero_capacity_promoted() {
        assert_eq!(SerialBuffer::new(0).capacity(), 1);
    }

    #[test]
    fn test_drain_in_order() {
        let mut buf = SerialBuffer::new(16);
        assert_eq!(buf.fill(b"abc"), 3);

        assert_eq!(buf.take_byte(), Some(b'a'));
        assert_eq!(buf.available_count(), 2);
        assert_eq!(buf.take_byte(), Some(b'b'));
        assert_eq!(buf.available_count(), 1);
        assert_eq!(buf.take_byte(), Some(b'c'));
        assert_eq!(buf.available_count(), 0);
        assert_eq!(buf.take_byte(), None);
    }

    #[test]
    fn test_fill_truncates_to_capacity() {
        let mut buf = SerialBuffer::new(4);
        assert_eq!(buf.fill(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(buf.available_count(), 4);
    }

    #[test]
    fn test_fill_replaces_and_rewinds() {
        let mut buf = SerialBuffer::new(8);
        buf.fill(&[1, 2, 3]);
        buf.take_byte();
        buf.fill(&[9]);
        assert_eq!(buf.available_count(), 1);
        assert_eq!(buf.take_byte(), Some(9));
    }

    #[test]
    fn test_clear() {
        let mut buf = SerialBuffer::default();
        buf.fill(&[1, 2, 3]);
        buf.clear();
        assert!(buf.is_empty());
    }
}
