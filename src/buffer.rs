//! Fixed-capacity message store
//!
//! Holds the last committed write. One slot is always kept free for the
//! terminator byte, so at most `capacity - 1` payload bytes are stored.

/// Terminator written after every committed payload
pub const TERMINATOR: u8 = 0;

/// Fixed-capacity byte store plus its content length.
///
/// Bytes past `len()` are not cleared between writes and are never exposed.
#[derive(Debug)]
pub struct MessageBuffer {
    storage: Box<[u8]>,
    len: usize,
}

impl MessageBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes.
    ///
    /// A capacity of 0 is raised to 1 so the terminator always fits.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0; capacity.max(1)].into_boxed_slice(),
            len: 0,
        }
    }

    /// Total size including the terminator slot
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Largest payload a single write can store
    #[inline(always)]
    pub fn max_payload(&self) -> usize {
        self.capacity() - 1
    }

    /// Number of valid bytes
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// How many bytes of a `requested` write would be accepted.
    ///
    /// Anything that would not leave room for the terminator is cut to
    /// `capacity - 1`.
    #[inline]
    pub fn accept_len(&self, requested: usize) -> usize {
        requested.min(self.max_payload())
    }

    /// Replace the contents with `payload`, truncating if necessary.
    ///
    /// Returns the number of bytes stored.
    pub fn commit(&mut self, payload: &[u8]) -> usize {
        let len = self.accept_len(payload.len());
        self.storage[..len].copy_from_slice(&payload[..len]);
        self.storage[len] = TERMINATOR;
        self.len = len;
        len
    }

    /// The valid bytes
    #[inline]
    pub fn contents(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Up to `max` valid bytes starting at `offset`; empty at or past the end.
    pub fn window(&self, offset: usize, max: usize) -> &[u8] {
        if offset >= self.len {
            return &[];
        }
        let end = offset + max.min(self.len - offset);
        &self.storage[offset..end]
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> &[u8] {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_and_window() {
        let mut buf = MessageBuffer::new(16);
        assert!(buf.is_empty());

        assert_eq!(buf.commit(b"hello world"), 11);
        assert_eq!(buf.contents(), b"hello world");
        assert_eq!(buf.raw()[11], TERMINATOR);

        assert_eq!(buf.window(0, 5), b"hello");
        assert_eq!(buf.window(6, 100), b"world");
        assert_eq!(buf.window(11, 4), b"");
        assert_eq!(buf.window(50, 4), b"");
    }

    #[test]
    fn test_truncates_to_leave_terminator_slot() {
        let mut buf = MessageBuffer::new(8);
        assert_eq!(buf.commit(&[0xAA; 8]), 7);
        assert_eq!(buf.len(), 7);
        assert_eq!(buf.raw()[7], TERMINATOR);

        assert_eq!(buf.commit(&[0xBB; 100]), 7);
        assert_eq!(buf.contents(), &[0xBB; 7]);
    }

    #[test]
    fn test_shorter_write_hides_stale_tail() {
        let mut buf = MessageBuffer::new(8);
        buf.commit(b"abcdef");
        buf.commit(b"xy");
        assert_eq!(buf.contents(), b"xy");
        assert_eq!(buf.window(0, 8), b"xy");
        // only the terminator overwrote the old tail
        assert_eq!(&buf.raw()[..6], b"xy\0def");
    }

    #[test]
    fn test_empty_write() {
        let mut buf = MessageBuffer::new(4);
        buf.commit(b"abc");
        assert_eq!(buf.commit(b""), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.window(0, 4), b"");
    }
}
