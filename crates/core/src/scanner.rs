//! Boundary scanning.
//!
//! A multipart stream separates parts with a marker line:
//!
//! ```text
//! --frame\r\n                 part boundary
//! Content-Length: 4\r\n\r\n
//! ABCD\r\n
//! --frame--                   terminal boundary, end of stream
//! ```
//!
//! [`find`] is a plain forward subsequence search. Callers carry a resume
//! offset between chunk arrivals (see [`resume_offset`]) so a byte range
//! that was already scanned is never scanned again, keeping total work
//! linear in the stream length.

use bytes::Bytes;

/// Suffix that turns a boundary into the terminal boundary.
pub const TERMINAL_SUFFIX: &[u8] = b"--";

/// Immutable boundary marker, e.g. `--frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryMarker {
    bytes: Bytes,
}

impl BoundaryMarker {
    pub fn new(marker: &str) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(marker.as_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Find the next occurrence of this marker at or after `from`.
    pub fn find_in(&self, haystack: &[u8], from: usize) -> Option<usize> {
        find(haystack, &self.bytes, from)
    }

    /// Whether the marker found at `index` is the terminal variant
    /// (`<marker>--`).
    ///
    /// Returns `None` while the two bytes after the marker have not arrived.
    pub fn is_terminal_at(&self, haystack: &[u8], index: usize) -> Option<bool> {
        let suffix_start = index + self.bytes.len();
        let suffix_end = suffix_start + TERMINAL_SUFFIX.len();
        if suffix_end > haystack.len() {
            return None;
        }
        Some(&haystack[suffix_start..suffix_end] == TERMINAL_SUFFIX)
    }
}

/// Byte-for-byte search for `needle` in `haystack`, starting at `from`.
///
/// Never matches before `from`. Returns `None` when no complete occurrence
/// is buffered yet, which includes a needle split across the end of the
/// haystack.
pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    let first = needle[0];
    let last_start = haystack.len().checked_sub(needle.len())?;
    let mut i = from;
    while i <= last_start {
        // Cheap first-byte skip before the full comparison.
        match haystack[i..=last_start].iter().position(|&b| b == first) {
            Some(offset) => i += offset,
            None => return None,
        }
        if &haystack[i..i + needle.len()] == needle {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Offset to resume scanning from after a failed search over `len` bytes.
///
/// A needle that straddles the current end can start at most
/// `needle_len - 1` bytes before it; everything earlier has been ruled out.
pub fn resume_offset(len: usize, needle_len: usize) -> usize {
    len.saturating_sub(needle_len.saturating_sub(1))
}
