//! Pull-based byte sources and cancellation.
//!
//! The demuxer never touches sockets or credentials. It pulls chunks from a
//! [`ByteSource`] one read at a time, which gives natural backpressure: the
//! next read is only issued after every extractable frame has been emitted.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::{DEFAULT_READ_CHUNK_SIZE, DemuxerConfig};

/// A pull-based stream of byte chunks.
pub trait ByteSource {
    /// Read the next chunk. `Ok(None)` signals end of stream.
    ///
    /// Chunks may be of any size and split the stream at any byte.
    fn read(&mut self) -> io::Result<Option<Bytes>>;

    /// Abort the underlying transfer. Called at most once by the demuxer,
    /// after which `read` is never called again.
    fn cancel(&mut self) {}
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self) -> io::Result<Option<Bytes>> {
        (**self).read()
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }
}

/// Adapts a blocking [`Read`] (file, stdin, `TcpStream`) into a
/// [`ByteSource`].
pub struct ReaderSource<R> {
    reader: Option<R>,
    scratch: Vec<u8>,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_READ_CHUNK_SIZE)
    }

    /// Read in chunks of `config.read_chunk_size` bytes.
    pub fn from_config(reader: R, config: &DemuxerConfig) -> Self {
        Self::with_chunk_size(reader, config.read_chunk_size)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader: Some(reader),
            scratch: vec![0u8; chunk_size.max(1)],
        }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read(&mut self) -> io::Result<Option<Bytes>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        loop {
            match reader.read(&mut self.scratch) {
                Ok(0) => return Ok(None),
                Ok(n) => return Ok(Some(Bytes::copy_from_slice(&self.scratch[..n]))),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Drops the reader, closing files and sockets it owns.
    fn cancel(&mut self) {
        self.reader = None;
    }
}

/// Adapts an iterator of chunks into a [`ByteSource`].
///
/// Works with pre-split fixtures as well as `mpsc::Receiver::into_iter()`
/// when another thread produces the chunks.
pub struct IterSource<I> {
    chunks: Option<I>,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = io::Result<Bytes>>,
{
    pub fn new(chunks: I) -> Self {
        Self {
            chunks: Some(chunks),
        }
    }
}

impl IterSource<std::vec::IntoIter<io::Result<Bytes>>> {
    /// Source yielding the given chunks in order, then end of stream.
    pub fn from_chunks<T: AsRef<[u8]>>(chunks: &[T]) -> Self {
        let chunks: Vec<io::Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_ref())))
            .collect();
        Self::new(chunks.into_iter())
    }
}

impl<I> ByteSource for IterSource<I>
where
    I: Iterator<Item = io::Result<Bytes>>,
{
    fn read(&mut self) -> io::Result<Option<Bytes>> {
        match self.chunks.as_mut() {
            Some(chunks) => chunks.next().transpose(),
            None => Ok(None),
        }
    }

    fn cancel(&mut self) {
        self.chunks = None;
    }
}

type CancelHook = Box<dyn FnOnce() + Send>;

struct CancelInner {
    cancelled: AtomicBool,
    hooks: Mutex<Vec<CancelHook>>,
}

/// Thread-safe, idempotent cancellation signal.
///
/// Clones share state. Hooks registered with [`on_cancel`](Self::on_cancel)
/// run once, on the thread that cancels; use them to unblock a read that is
/// parked in the kernel (e.g. `TcpStream::shutdown`).
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Request cancellation. Subsequent calls do nothing.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let hooks: Vec<CancelHook> = self.inner.hooks.lock().drain(..).collect();
        tracing::debug!(hooks = hooks.len(), "cancellation requested");
        for hook in hooks {
            hook();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register a hook to run on cancellation. Runs immediately if the
    /// handle is already cancelled.
    pub fn on_cancel<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut hooks = self.inner.hooks.lock();
        if self.is_cancelled() {
            drop(hooks);
            hook();
        } else {
            hooks.push(Box::new(hook));
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
