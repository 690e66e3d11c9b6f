use crate::error::ErrorKind;
use crate::frame::Frame;

/// Receives the demuxer's output, in order.
///
/// For a given stream, `on_frame` is called zero or more times, followed by
/// at most one of `on_end` (clean termination) or `on_error` (fatal
/// failure). Cancellation invokes neither.
pub trait FrameSink {
    /// A complete frame. Ownership passes to the sink.
    fn on_frame(&mut self, frame: Frame);

    /// The stream ended cleanly.
    fn on_end(&mut self) {}

    /// The stream failed; the demuxer must be discarded.
    fn on_error(&mut self, kind: ErrorKind, detail: &str) {
        let _ = (kind, detail);
    }
}

impl<T: FrameSink + ?Sized> FrameSink for &mut T {
    fn on_frame(&mut self, frame: Frame) {
        (**self).on_frame(frame)
    }

    fn on_end(&mut self) {
        (**self).on_end()
    }

    fn on_error(&mut self, kind: ErrorKind, detail: &str) {
        (**self).on_error(kind, detail)
    }
}

/// Sink that records every callback, for tests and batch consumers.
#[derive(Debug, Default)]
pub struct Collector {
    pub frames: Vec<Frame>,
    pub ended: bool,
    pub errors: Vec<(ErrorKind, String)>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads received so far, as owned byte vectors.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.frames.iter().map(|f| f.as_bytes().to_vec()).collect()
    }
}

impl FrameSink for Collector {
    fn on_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn on_end(&mut self) {
        self.ended = true;
    }

    fn on_error(&mut self, kind: ErrorKind, detail: &str) {
        self.errors.push((kind, detail.to_string()));
    }
}
