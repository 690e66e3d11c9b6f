//! Incremental demuxer for `multipart/x-mixed-replace` (MJPEG-over-HTTP)
//! camera streams.
//!
//! A relay turns an RTSP camera feed into a multipart HTTP response where
//! every part is one JPEG image. This crate consumes that byte stream in
//! arbitrarily sized chunks and emits the JPEG payloads, in order, as
//! [`Frame`]s.
//!
//! ## Pipeline
//!
//! ```text
//! ByteSource --read()--> ByteBuffer --> boundary scan --> part header --> extraction --> FrameSink
//! ```
//!
//! - [`buffer`]: unconsumed stream tail.
//! - [`scanner`]: boundary marker search with resumable offsets.
//! - [`header`]: part header block parsing (`Content-Length`).
//! - [`extract`]: declared-length and boundary-delimited payload strategies.
//! - [`parser`]: the push-driven loop tying the above together.
//! - [`demuxer`]: pull-based controller, state machine, cancellation.
//!
//! Use [`FrameParser`] directly when bytes are pushed to you (e.g. from an
//! async body stream); use [`Demuxer`] with a [`ByteSource`] when you pull.

pub mod buffer;
pub mod config;
pub mod demuxer;
pub mod error;
pub mod extract;
pub mod frame;
pub mod header;
pub mod parser;
pub mod scanner;
pub mod sink;
pub mod source;

pub use config::{DemuxerConfig, boundary_from_content_type};
pub use demuxer::{Demuxer, DemuxerState};
pub use error::{DemuxError, ErrorKind, Result};
pub use frame::Frame;
pub use parser::{Demuxed, FrameParser};
pub use sink::{Collector, FrameSink};
pub use source::{ByteSource, CancelHandle, IterSource, ReaderSource};
