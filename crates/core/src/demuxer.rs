//! Demuxer controller.
//!
//! Drives a [`ByteSource`] through a [`FrameParser`] and delivers frames to
//! a [`FrameSink`].
//!
//! ## State machine
//!
//! ```text
//! Idle --start()--> Reading --chunk--> Reading
//!                      |
//!                      +--terminal boundary / end of stream--> Draining --> Closed
//!                      +--cancel()-------------------------------------->  Closed
//!                      +--overflow / malformed header / read error------>  Errored
//! ```
//!
//! `Closed` and `Errored` are terminal. An errored demuxer cannot be
//! resumed; discard it and reconnect.

use crate::config::DemuxerConfig;
use crate::error::{DemuxError, Result};
use crate::parser::{Demuxed, FrameParser};
use crate::sink::FrameSink;
use crate::source::{ByteSource, CancelHandle};

/// Lifecycle of a [`Demuxer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxerState {
    /// Constructed, [`Demuxer::start`] not yet called.
    Idle,
    /// Pulling chunks and extracting frames.
    Reading,
    /// Input is exhausted (terminal boundary or end of stream); finishing up.
    Draining,
    /// Finished cleanly or cancelled.
    Closed,
    /// Failed on a fatal error.
    Errored,
}

impl DemuxerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }
}

enum Outcome {
    Ended,
    Cancelled,
}

enum Progress {
    Stalled,
    Terminal,
    Cancelled,
}

/// Pull-based MJPEG demuxer for one stream.
///
/// Issues one read at a time and only reads again once every complete frame
/// in the buffer has been handed to the sink. Independent streams use
/// independent demuxers; nothing is shared between instances.
///
/// ```no_run
/// use mjpeg::{Collector, Demuxer, DemuxerConfig, ReaderSource};
///
/// let file = std::fs::File::open("capture.mjpeg")?;
/// let mut demuxer = Demuxer::new(ReaderSource::new(file), DemuxerConfig::default())?;
/// let mut frames = Collector::new();
/// demuxer.start(&mut frames)?;
/// println!("{} frames", frames.frames.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Demuxer<S> {
    source: S,
    parser: FrameParser,
    state: DemuxerState,
    cancel: CancelHandle,
    bytes_received: u64,
}

impl<S: ByteSource> Demuxer<S> {
    /// Create an idle demuxer. Fails with [`DemuxError::InvalidConfig`] when
    /// the configuration does not validate.
    pub fn new(source: S, config: DemuxerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            parser: FrameParser::new(&config),
            state: DemuxerState::Idle,
            cancel: CancelHandle::new(),
            bytes_received: 0,
        })
    }

    /// Use an existing cancellation handle, e.g. one already wired into the
    /// transport that feeds `source`.
    #[must_use]
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    /// Handle that cancels this demuxer from any thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> DemuxerState {
        self.state
    }

    /// Frames handed to the sink so far.
    pub fn frames_emitted(&self) -> u64 {
        self.parser.frames()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Run the stream to completion, delivering output to `sink`.
    ///
    /// Returns the terminal state reached. Stream failures are reported
    /// through [`FrameSink::on_error`], not as `Err`; only setup errors such
    /// as [`DemuxError::AlreadyStarted`] are returned.
    pub fn start<K: FrameSink>(&mut self, mut sink: K) -> Result<DemuxerState> {
        if self.state != DemuxerState::Idle {
            return Err(DemuxError::AlreadyStarted);
        }

        self.transition(DemuxerState::Reading);

        let outcome = self.pump(&mut sink);
        self.parser.release();

        match outcome {
            Ok(Outcome::Ended) => {
                self.transition(DemuxerState::Closed);
                tracing::debug!(
                    frames = self.frames_emitted(),
                    bytes = self.bytes_received,
                    "stream ended"
                );
                sink.on_end();
            }
            Ok(Outcome::Cancelled) => {
                self.source.cancel();
                self.transition(DemuxerState::Closed);
                tracing::debug!(frames = self.frames_emitted(), "stream cancelled");
            }
            Err(err) => {
                self.source.cancel();
                self.transition(DemuxerState::Errored);
                let Some(kind) = err.kind() else {
                    return Err(err);
                };
                tracing::warn!(%kind, error = %err, frames = self.frames_emitted(), "stream failed");
                sink.on_error(kind, &err.to_string());
            }
        }

        Ok(self.state)
    }

    fn pump<K: FrameSink>(&mut self, sink: &mut K) -> Result<Outcome> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }

            let read = self.source.read();
            if self.cancel.is_cancelled() {
                // Whatever the read produced belongs to an aborted transfer.
                return Ok(Outcome::Cancelled);
            }

            let Some(chunk) = read? else {
                self.transition(DemuxerState::Draining);
                if self.parser.has_partial_part() || self.parser.buffered() > 0 {
                    tracing::warn!(
                        discarded = self.parser.buffered(),
                        "stream ended mid-part without terminal boundary"
                    );
                } else {
                    tracing::debug!("stream ended without terminal boundary");
                }
                return Ok(Outcome::Ended);
            };

            self.bytes_received += chunk.len() as u64;
            self.parser.push(&chunk);

            match self.drain(sink)? {
                Progress::Stalled => {}
                Progress::Terminal => {
                    self.transition(DemuxerState::Draining);
                    self.source.cancel();
                    return Ok(Outcome::Ended);
                }
                Progress::Cancelled => return Ok(Outcome::Cancelled),
            }
        }
    }

    /// Emit every frame the buffered bytes can complete.
    fn drain<K: FrameSink>(&mut self, sink: &mut K) -> Result<Progress> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(Progress::Cancelled);
            }
            match self.parser.next_frame()? {
                Demuxed::Frame(frame) => {
                    tracing::trace!(seq = frame.sequence(), bytes = frame.len(), "frame");
                    sink.on_frame(frame);
                }
                Demuxed::NeedMore => return Ok(Progress::Stalled),
                Demuxed::End => return Ok(Progress::Terminal),
            }
        }
    }

    fn transition(&mut self, state: DemuxerState) {
        tracing::debug!(old_state = ?self.state, new_state = ?state, "state transition");
        self.state = state;
    }
}
