use bytes::{Buf, Bytes, BytesMut};

/// Initial capacity, roughly one VGA JPEG frame.
const INITIAL_CAPACITY: usize = 64 * 1024;

/// Unconsumed tail of a multipart stream.
///
/// Holds exactly the bytes received but not yet handed out as a frame or
/// dropped as framing overhead. Backed by a single `BytesMut`: appends grow
/// it with amortized reallocation, and consuming from the front only moves
/// the start pointer, so no byte is ever copied twice by the buffer itself.
#[derive(Debug)]
pub struct ByteBuffer {
    inner: BytesMut,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(capacity),
        }
    }

    /// Append a freshly received chunk at the tail.
    pub fn append(&mut self, chunk: &[u8]) {
        self.inner.extend_from_slice(chunk);
    }

    /// Drop the first `n` bytes. Consuming more than is buffered empties it.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.inner.len());
        self.inner.advance(n);
    }

    /// Detach the first `n` bytes as an immutable, zero-copy view.
    ///
    /// `n` is clamped to the buffered length.
    pub fn split_front(&mut self, n: usize) -> Bytes {
        let n = n.min(self.inner.len());
        self.inner.split_to(n).freeze()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Whether the buffered bytes at `offset` start with `pattern`.
    ///
    /// Returns `None` when not enough bytes have arrived to decide.
    pub fn starts_with_at(&self, offset: usize, pattern: &[u8]) -> Option<bool> {
        let end = offset.checked_add(pattern.len())?;
        if end > self.inner.len() {
            return None;
        }
        Some(&self.inner[offset..end] == pattern)
    }

    /// Release all buffered bytes and the backing allocation.
    pub fn release(&mut self) {
        self.inner = BytesMut::new();
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_consume() {
        let mut buf = ByteBuffer::new();
        buf.append(b"hello ");
        buf.append(b"world");
        assert_eq!(buf.len(), 11);
        buf.consume(6);
        assert_eq!(buf.as_slice(), b"world");
    }

    #[test]
    fn consume_past_end_empties() {
        let mut buf = ByteBuffer::new();
        buf.append(b"abc");
        buf.consume(10);
        assert!(buf.is_empty());
    }

    #[test]
    fn split_front_detaches_prefix() {
        let mut buf = ByteBuffer::new();
        buf.append(b"ABCDrest");
        let front = buf.split_front(4);
        assert_eq!(&front[..], b"ABCD");
        assert_eq!(buf.as_slice(), b"rest");
    }

    #[test]
    fn starts_with_at_needs_enough_bytes() {
        let mut buf = ByteBuffer::new();
        buf.append(b"--frame-");
        assert_eq!(buf.starts_with_at(7, b"--"), None);
        buf.append(b"-");
        assert_eq!(buf.starts_with_at(7, b"--"), Some(true));
        assert_eq!(buf.starts_with_at(0, b"xx"), Some(false));
    }

    #[test]
    fn release_frees_everything() {
        let mut buf = ByteBuffer::new();
        buf.append(&[0u8; 1024]);
        buf.release();
        assert!(buf.is_empty());
    }
}
