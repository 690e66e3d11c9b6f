mod http;

use std::fs;
use std::io;
use std::net::Shutdown;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use mjpeg::config::{DEFAULT_MAX_BUFFER_SIZE, DEFAULT_READ_CHUNK_SIZE};
use mjpeg::{
    ByteSource, CancelHandle, Demuxer, DemuxerConfig, DemuxerState, ErrorKind, Frame, FrameSink,
    ReaderSource, boundary_from_content_type,
};

#[derive(Parser)]
#[command(
    name = "mjpeg-dump",
    about = "Extract JPEG frames from a multipart/x-mixed-replace stream"
)]
struct Args {
    /// Read the stream from a file ("-" for stdin)
    #[arg(long, short, conflicts_with = "connect", required_unless_present = "connect")]
    input: Option<PathBuf>,

    /// Fetch the stream over plain HTTP from a relay (host:port)
    #[arg(long, short)]
    connect: Option<String>,

    /// Request path used with --connect
    #[arg(long, default_value = "/stream")]
    path: String,

    /// Boundary marker; taken from the relay's Content-Type when omitted
    #[arg(long)]
    boundary: Option<String>,

    /// Maximum buffered bytes while no frame completes
    #[arg(long, default_value_t = DEFAULT_MAX_BUFFER_SIZE)]
    max_buffer: usize,

    /// Dedicated cap on a single part header block
    #[arg(long)]
    max_header: Option<usize>,

    /// Bytes requested per read
    #[arg(long, default_value_t = DEFAULT_READ_CHUNK_SIZE)]
    read_chunk: usize,

    /// Directory receiving frame-NNNNNN.jpg files
    #[arg(long, short, default_value = "frames")]
    out: PathBuf,

    /// Print frames as data: URLs on stdout instead of writing files
    #[arg(long)]
    data_url: bool,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Stop after this many seconds. A read blocked on stdin is not
    /// interrupted; the limit takes effect once the next chunk arrives.
    #[arg(long)]
    duration: Option<u64>,
}

impl Args {
    fn reads_stdin(&self) -> bool {
        self.connect.is_none() && self.input.as_deref().is_none_or(|p| p.as_os_str() == "-")
    }
}

/// Writes each frame to disk (or stdout) and cancels once enough arrived.
struct DumpSink {
    out: Option<PathBuf>,
    max_frames: Option<u64>,
    cancel: CancelHandle,
    written: u64,
    failed: bool,
}

impl DumpSink {
    fn write(&self, frame: &Frame) -> io::Result<()> {
        match &self.out {
            Some(dir) => {
                let path = dir.join(format!("frame-{:06}.jpg", frame.sequence()));
                fs::write(&path, frame.as_bytes())
            }
            None => {
                println!("{}", frame.to_data_url());
                Ok(())
            }
        }
    }
}

impl FrameSink for DumpSink {
    fn on_frame(&mut self, frame: Frame) {
        if let Err(e) = self.write(&frame) {
            tracing::error!(seq = frame.sequence(), error = %e, "failed to write frame");
            self.failed = true;
            self.cancel.cancel();
            return;
        }
        self.written += 1;
        tracing::debug!(seq = frame.sequence(), bytes = frame.len(), "frame written");

        if self.max_frames.is_some_and(|max| self.written >= max) {
            tracing::info!(frames = self.written, "frame limit reached");
            self.cancel.cancel();
        }
    }

    fn on_end(&mut self) {
        tracing::info!(frames = self.written, "stream finished");
    }

    fn on_error(&mut self, kind: ErrorKind, detail: &str) {
        tracing::error!(%kind, detail, frames = self.written, "stream failed");
    }
}

fn open_source(
    args: &Args,
    config: &DemuxerConfig,
    cancel: &CancelHandle,
) -> io::Result<(Box<dyn ByteSource + Send>, Option<String>)> {
    if let Some(addr) = &args.connect {
        let response = http::get(addr, &args.path)?;
        let socket = response.socket;
        cancel.on_cancel(move || {
            let _ = socket.shutdown(Shutdown::Both);
        });
        let source = ReaderSource::from_config(response.reader, config);
        return Ok((Box::new(source), response.content_type));
    }

    match args.input.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            let file = fs::File::open(path)?;
            Ok((Box::new(ReaderSource::from_config(file, config)), None))
        }
        _ => Ok((Box::new(ReaderSource::from_config(io::stdin(), config)), None)),
    }
}

fn base_config(args: &Args) -> DemuxerConfig {
    let mut config = DemuxerConfig::new(args.max_buffer).with_read_chunk_size(args.read_chunk);
    if let Some(cap) = args.max_header {
        config = config.with_max_header_size(cap);
    }
    config
}

fn run(args: &Args) -> Result<(DemuxerState, bool), Box<dyn std::error::Error>> {
    let cancel = CancelHandle::new();
    let mut config = base_config(args);
    let (source, content_type) = open_source(args, &config, &cancel)?;

    let boundary = args
        .boundary
        .clone()
        .or_else(|| content_type.as_deref().and_then(boundary_from_content_type));
    if let Some(boundary) = &boundary {
        config = config.with_boundary(boundary);
    }

    let out = if args.data_url {
        None
    } else {
        fs::create_dir_all(&args.out)?;
        Some(args.out.clone())
    };

    if let Some(secs) = args.duration {
        if args.reads_stdin() {
            tracing::warn!(secs, "duration cannot interrupt a blocked stdin read");
        }
        let timer = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            tracing::info!(secs, "duration elapsed");
            timer.cancel();
        });
    }

    tracing::info!(boundary = %config.boundary, max_buffer = config.max_buffer_size, "demuxing");

    let mut demuxer = Demuxer::new(source, config)?.with_cancel_handle(cancel.clone());
    let mut sink = DumpSink {
        out,
        max_frames: args.max_frames,
        cancel,
        written: 0,
        failed: false,
    };
    let state = demuxer.start(&mut sink)?;
    Ok((state, sink.failed))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match run(&args) {
        Ok((DemuxerState::Errored, _)) | Ok((_, true)) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mjpeg-dump: {e}");
            ExitCode::FAILURE
        }
    }
}
