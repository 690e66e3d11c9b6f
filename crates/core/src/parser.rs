//! Push-driven multipart parser.
//!
//! [`FrameParser`] owns the [`ByteBuffer`] and runs the boundary scan →
//! header parse → payload extraction loop over it. It performs no I/O:
//! callers [`push`](FrameParser::push) bytes as they arrive and pull frames
//! with [`next_frame`](FrameParser::next_frame) until it reports
//! [`Demuxed::NeedMore`].
//!
//! ## Part lifecycle
//!
//! ```text
//! Boundary --marker--> Header --terminator--> Payload(strategy) --> Boundary
//!     |                   |                                             |
//!     |                   +--marker (empty part)--> Boundary            |
//!     +--marker + "--"--> Finished <------------------------------------+
//! ```
//!
//! Bytes discarded while looking for a marker still count against the
//! buffer ceiling, so a sender that never emits a boundary fails with
//! [`DemuxError::BufferOverflow`].

use crate::buffer::ByteBuffer;
use crate::config::DemuxerConfig;
use crate::error::{DemuxError, Result};
use crate::extract::{Extraction, Strategy};
use crate::frame::Frame;
use crate::header::{PartHeader, find_header_end};
use crate::scanner::{BoundaryMarker, resume_offset};

/// Outcome of [`FrameParser::next_frame`].
#[derive(Debug, PartialEq, Eq)]
pub enum Demuxed {
    /// A complete frame, in wire order.
    Frame(Frame),
    /// No further frame can be completed from the buffered bytes.
    NeedMore,
    /// The terminal boundary was seen; nothing more will be produced.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Boundary,
    Header,
    Payload(Strategy),
    Finished,
}

impl Phase {
    fn waiting_for(&self) -> &'static str {
        match self {
            Self::Boundary => "boundary",
            Self::Header => "part header terminator",
            Self::Payload(Strategy::DeclaredLength(_)) => "declared payload",
            Self::Payload(Strategy::BoundaryDelimited) => "payload boundary",
            Self::Finished => "nothing",
        }
    }
}

enum Step {
    Continue,
    Frame(Frame),
    NeedMore,
    End,
}

/// Incremental multipart/x-mixed-replace parser.
#[derive(Debug)]
pub struct FrameParser {
    buffer: ByteBuffer,
    marker: BoundaryMarker,
    header_terminator: Vec<u8>,
    max_buffer_size: usize,
    max_header_size: Option<usize>,
    phase: Phase,
    scan_from: usize,
    /// Bytes dropped since the last marker was found.
    discarded: usize,
    frames: u64,
}

impl FrameParser {
    /// Create a parser from an already validated configuration.
    pub fn new(config: &DemuxerConfig) -> Self {
        Self {
            buffer: ByteBuffer::new(),
            marker: BoundaryMarker::new(&config.boundary),
            header_terminator: config.header_terminator.clone(),
            max_buffer_size: config.max_buffer_size,
            max_header_size: config.max_header_size,
            phase: Phase::Boundary,
            scan_from: 0,
            discarded: 0,
            frames: 0,
        }
    }

    /// Append received bytes. Ignored once the terminal boundary was seen.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.phase != Phase::Finished {
            self.buffer.append(chunk);
        }
    }

    /// Extract the next complete frame, if any.
    ///
    /// Empty parts are skipped. Returns [`DemuxError::BufferOverflow`] when
    /// the parser needs more data but already holds more than the ceiling,
    /// and [`DemuxError::MalformedHeader`] when a header block outgrows the
    /// optional header cap.
    pub fn next_frame(&mut self) -> Result<Demuxed> {
        loop {
            let step = match self.phase {
                Phase::Boundary => self.seek_boundary()?,
                Phase::Header => self.parse_header()?,
                Phase::Payload(strategy) => self.extract_payload(strategy),
                Phase::Finished => Step::End,
            };

            match step {
                Step::Continue => continue,
                Step::Frame(frame) => return Ok(Demuxed::Frame(frame)),
                Step::NeedMore => {
                    self.check_ceiling()?;
                    return Ok(Demuxed::NeedMore);
                }
                Step::End => return Ok(Demuxed::End),
            }
        }
    }

    /// Number of unconsumed bytes.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Number of frames produced so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Whether a part has started but not completed.
    pub fn has_partial_part(&self) -> bool {
        !matches!(self.phase, Phase::Boundary | Phase::Finished)
    }

    /// Drop all buffered bytes and any in-flight part.
    pub fn release(&mut self) {
        self.buffer.release();
        self.scan_from = 0;
        self.discarded = 0;
    }

    fn seek_boundary(&mut self) -> Result<Step> {
        let Some(index) = self.marker.find_in(self.buffer.as_slice(), 0) else {
            // Bytes that cannot start a marker are preamble or epilogue.
            let discard = resume_offset(self.buffer.len(), self.marker.len());
            self.discard(discard)?;
            return Ok(Step::NeedMore);
        };

        match self.marker.is_terminal_at(self.buffer.as_slice(), index) {
            None => {
                self.discard(index)?;
                Ok(Step::NeedMore)
            }
            Some(true) => {
                tracing::debug!(frames = self.frames, "terminal boundary reached");
                self.buffer.release();
                self.discarded = 0;
                self.phase = Phase::Finished;
                Ok(Step::End)
            }
            Some(false) => {
                if index > 0 {
                    tracing::trace!(bytes = index, "discarded bytes before boundary");
                }
                self.buffer.consume(index + self.marker.len());
                self.scan_from = 0;
                self.discarded = 0;
                self.phase = Phase::Header;
                Ok(Step::Continue)
            }
        }
    }

    fn discard(&mut self, count: usize) -> Result<()> {
        self.buffer.consume(count);
        self.discarded += count;
        self.check_ceiling()
    }

    /// Whether the next marker follows the previous one directly, with at
    /// most a line break in between. `None` until enough bytes arrived.
    fn marker_follows(&self) -> Option<bool> {
        let data = self.buffer.as_slice();
        let offset = if data.starts_with(b"\r\n") {
            2
        } else if data.starts_with(b"\n") {
            1
        } else if data.is_empty() || data == b"\r" {
            return None;
        } else {
            0
        };

        let marker = self.marker.as_bytes();
        let available = &data[offset..];
        let n = available.len().min(marker.len());
        if available[..n] != marker[..n] {
            Some(false)
        } else if n == marker.len() {
            Some(true)
        } else {
            None
        }
    }

    fn parse_header(&mut self) -> Result<Step> {
        let terminator_len = self.header_terminator.len();

        if self.scan_from == 0 {
            match self.marker_follows() {
                None => return Ok(Step::NeedMore),
                Some(true) => {
                    tracing::trace!("skipping part without header block");
                    self.phase = Phase::Boundary;
                    return Ok(Step::Continue);
                }
                Some(false) => {}
            }
        }

        let Some(end) =
            find_header_end(self.buffer.as_slice(), &self.header_terminator, self.scan_from)
        else {
            self.check_header_cap(self.buffer.len())?;
            self.scan_from = resume_offset(self.buffer.len(), terminator_len);
            return Ok(Step::NeedMore);
        };
        self.check_header_cap(end)?;

        let header = PartHeader::parse(&self.buffer.as_slice()[..end]);
        self.buffer.consume(end + terminator_len);
        self.scan_from = 0;

        let strategy = Strategy::for_header(&header);
        if let Strategy::DeclaredLength(len) = strategy {
            if len > self.max_buffer_size {
                return Err(DemuxError::BufferOverflow {
                    buffered: len,
                    limit: self.max_buffer_size,
                    waiting_for: "declared payload",
                });
            }
        }

        tracing::trace!(?strategy, headers = header.headers.len(), "part header parsed");
        self.phase = Phase::Payload(strategy);
        Ok(Step::Continue)
    }

    fn check_header_cap(&self, header_len: usize) -> Result<()> {
        match self.max_header_size {
            Some(cap) if header_len > cap => Err(DemuxError::MalformedHeader(format!(
                "header block exceeds {cap} bytes without terminator"
            ))),
            _ => Ok(()),
        }
    }

    fn extract_payload(&mut self, strategy: Strategy) -> Step {
        match strategy.extract(&mut self.buffer, &self.marker, &mut self.scan_from) {
            Extraction::NeedMore => Step::NeedMore,
            Extraction::Empty => {
                tracing::trace!("skipping empty part");
                self.phase = Phase::Boundary;
                Step::Continue
            }
            Extraction::Payload(data) => {
                self.frames += 1;
                self.phase = Phase::Boundary;
                Step::Frame(Frame::new(self.frames, data))
            }
        }
    }

    fn check_ceiling(&self) -> Result<()> {
        let pending = self.buffer.len() + self.discarded;
        if pending > self.max_buffer_size {
            return Err(DemuxError::BufferOverflow {
                buffered: pending,
                limit: self.max_buffer_size,
                waiting_for: self.phase.waiting_for(),
            });
        }
        Ok(())
    }
}
