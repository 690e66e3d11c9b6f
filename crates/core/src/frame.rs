use base64::prelude::{BASE64_STANDARD, Engine as _};
use bytes::Bytes;

/// One complete part payload, normally a JPEG image.
///
/// The payload is a zero-copy view split out of the demuxer's buffer; once
/// handed to a sink the demuxer keeps no reference to it. Frames are never
/// empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    sequence: u64,
    data: Bytes,
}

impl Frame {
    pub(crate) fn new(sequence: u64, data: Bytes) -> Self {
        debug_assert!(!data.is_empty());
        Self { sequence, data }
    }

    /// 1-based position of this frame in the stream.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Render as a `data:image/jpeg;base64,...` URL, usable directly as an
    /// image source.
    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode(&self.data))
    }
}
