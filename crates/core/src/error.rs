//! Error types for the MJPEG demuxer.

use std::fmt;

/// Errors that can occur while demuxing a multipart stream.
///
/// Variants map to specific failure modes:
///
/// - **Framing**: [`BufferOverflow`](Self::BufferOverflow),
///   [`MalformedHeader`](Self::MalformedHeader) — the sender never completed
///   a part within the configured limits.
/// - **Transport**: [`Upstream`](Self::Upstream) — the byte source failed.
/// - **Setup**: [`InvalidConfig`](Self::InvalidConfig),
///   [`AlreadyStarted`](Self::AlreadyStarted).
///
/// Framing and transport errors are fatal: the demuxer that produced them
/// is left in [`DemuxerState::Errored`](crate::DemuxerState::Errored) and
/// must be discarded.
#[derive(Debug, thiserror::Error)]
pub enum DemuxError {
    /// More bytes are buffered than the configured ceiling allows and no
    /// frame could be completed from them.
    #[error("buffer overflow: {buffered} bytes buffered (limit {limit}) while waiting for {waiting_for}")]
    BufferOverflow {
        buffered: usize,
        limit: usize,
        waiting_for: &'static str,
    },

    /// A part header block could not be resolved within the header size cap.
    #[error("malformed part header: {0}")]
    MalformedHeader(String),

    /// The underlying byte source reported a read failure.
    #[error("upstream read failed: {0}")]
    Upstream(#[from] std::io::Error),

    /// [`DemuxerConfig::validate`](crate::DemuxerConfig::validate) rejected the configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// [`Demuxer::start`](crate::Demuxer::start) was called on a demuxer that
    /// already left the `Idle` state.
    #[error("demuxer already started")]
    AlreadyStarted,
}

impl DemuxError {
    /// Category reported through [`FrameSink::on_error`](crate::FrameSink::on_error).
    ///
    /// `None` for setup errors, which are returned to the caller and never
    /// reach a sink.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::BufferOverflow { .. } => Some(ErrorKind::BufferOverflow),
            Self::MalformedHeader(_) => Some(ErrorKind::MalformedHeader),
            Self::Upstream(_) => Some(ErrorKind::UpstreamError),
            Self::InvalidConfig(_) | Self::AlreadyStarted => None,
        }
    }
}

/// Fatal error category passed to sinks alongside a human-readable detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Buffered size exceeded the ceiling without completing a frame.
    BufferOverflow,
    /// A header block exceeded the dedicated header cap.
    MalformedHeader,
    /// The byte source failed.
    UpstreamError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferOverflow => write!(f, "BufferOverflow"),
            Self::MalformedHeader => write!(f, "MalformedHeader"),
            Self::UpstreamError => write!(f, "UpstreamError"),
        }
    }
}

/// Convenience alias for `Result<T, DemuxError>`.
pub type Result<T> = std::result::Result<T, DemuxError>;
