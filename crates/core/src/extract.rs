//! Payload extraction strategies.
//!
//! Once a part header has been consumed, the payload starts at the front of
//! the buffer. Its end is found one of two ways:
//!
//! | Strategy | Selected when | Payload end |
//! |----------|---------------|-------------|
//! | [`Strategy::DeclaredLength`] | header has `Content-Length: N`, N > 0 | exactly N bytes |
//! | [`Strategy::BoundaryDelimited`] | no usable `Content-Length` | next boundary marker, minus one CRLF |
//!
//! Both strategies leave the buffer untouched when they report
//! [`Extraction::NeedMore`].

use bytes::Bytes;

use crate::buffer::ByteBuffer;
use crate::header::PartHeader;
use crate::scanner::{BoundaryMarker, resume_offset};

const CRLF: &[u8] = b"\r\n";

/// How the payload of the current part is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Payload is exactly this many bytes (always > 0).
    DeclaredLength(usize),
    /// Payload runs until the next boundary marker.
    BoundaryDelimited,
}

/// Result of one extraction attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Extraction {
    /// A complete, non-empty payload was split off the buffer.
    Payload(Bytes),
    /// The part was complete but carried no payload bytes.
    Empty,
    /// The payload has not fully arrived yet.
    NeedMore,
}

impl Strategy {
    pub fn for_header(header: &PartHeader) -> Self {
        match header.content_length() {
            Some(len) => Self::DeclaredLength(len),
            None => Self::BoundaryDelimited,
        }
    }

    /// Try to extract the payload sitting at the front of `buffer`.
    ///
    /// `scan_from` is the boundary-delimited resume offset; it is advanced
    /// on `NeedMore` and reset once a payload completes.
    pub fn extract(
        &self,
        buffer: &mut ByteBuffer,
        marker: &BoundaryMarker,
        scan_from: &mut usize,
    ) -> Extraction {
        match *self {
            Self::DeclaredLength(len) => extract_declared(buffer, len),
            Self::BoundaryDelimited => extract_delimited(buffer, marker, scan_from),
        }
    }
}

fn extract_declared(buffer: &mut ByteBuffer, len: usize) -> Extraction {
    if buffer.len() < len {
        return Extraction::NeedMore;
    }

    let payload = buffer.split_front(len);

    // A CRLF normally separates the payload from the next boundary. If it
    // hasn't arrived yet the boundary scan discards it as preamble later.
    if buffer.starts_with_at(0, CRLF) == Some(true) {
        buffer.consume(CRLF.len());
    }

    if payload.is_empty() {
        Extraction::Empty
    } else {
        Extraction::Payload(payload)
    }
}

fn extract_delimited(
    buffer: &mut ByteBuffer,
    marker: &BoundaryMarker,
    scan_from: &mut usize,
) -> Extraction {
    let Some(boundary) = marker.find_in(buffer.as_slice(), *scan_from) else {
        *scan_from = resume_offset(buffer.len(), marker.len());
        return Extraction::NeedMore;
    };
    *scan_from = 0;

    let mut end = boundary;
    if end >= CRLF.len() && &buffer.as_slice()[end - CRLF.len()..end] == CRLF {
        end -= CRLF.len();
    }

    let payload = buffer.split_front(end);
    // Drop the trimmed CRLF; the boundary itself stays for the next scan.
    buffer.consume(boundary - end);

    if payload.is_empty() {
        Extraction::Empty
    } else {
        Extraction::Payload(payload)
    }
}
