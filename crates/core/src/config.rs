use crate::error::{DemuxError, Result};

/// Boundary marker used by the camera relay when none is advertised.
pub const DEFAULT_BOUNDARY: &str = "--frame";

/// Sequence that ends a part header block.
pub const DEFAULT_HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Default ceiling on unconsumed bytes (8 MiB).
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Default size of a single read issued by [`ReaderSource`](crate::source::ReaderSource).
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16 * 1024;

/// RFC 2046 §5.1.1 caps a boundary at 70 characters; the marker also carries
/// the leading `--`.
const MAX_BOUNDARY_LEN: usize = 72;

/// Demuxer configuration.
#[derive(Debug, Clone)]
pub struct DemuxerConfig {
    /// Boundary marker including the leading `--` (e.g. `--frame`).
    pub boundary: String,
    /// Sequence terminating each part header block.
    pub header_terminator: Vec<u8>,
    /// Maximum number of buffered bytes allowed while no frame completes.
    pub max_buffer_size: usize,
    /// Optional cap on a single part header block. When `None`, header
    /// blocks are bounded only by `max_buffer_size`.
    pub max_header_size: Option<usize>,
    /// Bytes requested per read by reader-backed sources.
    pub read_chunk_size: usize,
}

impl Default for DemuxerConfig {
    fn default() -> Self {
        Self {
            boundary: DEFAULT_BOUNDARY.to_string(),
            header_terminator: DEFAULT_HEADER_TERMINATOR.to_vec(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            max_header_size: None,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl DemuxerConfig {
    /// Default configuration with an explicit buffer ceiling.
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            max_buffer_size,
            ..Self::default()
        }
    }

    /// Set the boundary marker. A bare token such as `frame` is prefixed
    /// with `--`.
    #[must_use]
    pub fn with_boundary(mut self, boundary: &str) -> Self {
        self.boundary = normalize_boundary(boundary);
        self
    }

    #[must_use]
    pub fn with_header_terminator(mut self, terminator: &[u8]) -> Self {
        self.header_terminator = terminator.to_vec();
        self
    }

    #[must_use]
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = Some(size);
        self
    }

    #[must_use]
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Check the configuration for values the demuxer cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.boundary.is_empty() {
            return Err(DemuxError::InvalidConfig("boundary must not be empty".into()));
        }
        if self.boundary.len() > MAX_BOUNDARY_LEN {
            return Err(DemuxError::InvalidConfig(format!(
                "boundary is {} bytes, limit is {MAX_BOUNDARY_LEN}",
                self.boundary.len()
            )));
        }
        if self.header_terminator.is_empty() {
            return Err(DemuxError::InvalidConfig(
                "header terminator must not be empty".into(),
            ));
        }
        if self.max_buffer_size == 0 {
            return Err(DemuxError::InvalidConfig(
                "max_buffer_size must be greater than zero".into(),
            ));
        }
        if let Some(cap) = self.max_header_size {
            if cap == 0 || cap > self.max_buffer_size {
                return Err(DemuxError::InvalidConfig(format!(
                    "max_header_size {cap} must be within 1..={}",
                    self.max_buffer_size
                )));
            }
        }
        if self.read_chunk_size == 0 {
            return Err(DemuxError::InvalidConfig(
                "read_chunk_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn normalize_boundary(boundary: &str) -> String {
    if boundary.starts_with("--") {
        boundary.to_string()
    } else {
        format!("--{boundary}")
    }
}

/// Derive the boundary marker from a `Content-Type` header value.
///
/// ```text
/// multipart/x-mixed-replace; boundary=frame      -> "--frame"
/// multipart/x-mixed-replace;boundary="--myboundary" -> "--myboundary"
/// ```
///
/// Returns `None` when the value carries no `boundary` parameter. Relays
/// disagree on whether the advertised token already includes the leading
/// `--`; both spellings yield the same marker.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        if value.is_empty() {
            None
        } else {
            Some(normalize_boundary(value))
        }
    })
}
