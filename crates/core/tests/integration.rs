//! End-to-end demuxing through the public API: in-memory chunk sources,
//! a threaded channel source with cancellation, and a loopback TCP relay.

use std::io::{self, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;

use mjpeg::{
    CancelHandle, Collector, Demuxer, DemuxerConfig, DemuxerState, ErrorKind, IterSource,
    ReaderSource,
};

const SCENARIO_A: &[u8] = b"--frame\r\nContent-Length: 4\r\n\r\nABCD\r\n--frame\r\nContent-Length: 3\r\n\r\nXYZ\r\n--frame--";
const SCENARIO_B: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\nABCD\r\n--frame\r\nContent-Type: image/jpeg\r\n\r\nXYZ\r\n--frame--";

fn part(payload: &[u8], declare_length: bool) -> Vec<u8> {
    let mut out = b"--frame\r\nContent-Type: image/jpeg\r\n".to_vec();
    if declare_length {
        out.extend_from_slice(format!("Content-Length: {}\r\n", payload.len()).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\r\n");
    out
}

/// Payload that looks like a JPEG and contains CRLFs and dashes.
fn fake_jpeg(seed: u8, len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend((0..len).map(|i| match i % 17 {
        3 => b'\r',
        4 => b'\n',
        9 | 10 => b'-',
        _ => seed.wrapping_add(i as u8),
    }));
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

fn demux_chunks(chunks: &[&[u8]], config: DemuxerConfig) -> (DemuxerState, Collector) {
    let mut demuxer = Demuxer::new(IterSource::from_chunks(chunks), config).expect("valid config");
    let mut sink = Collector::new();
    let state = demuxer.start(&mut sink).expect("first start");
    (state, sink)
}

fn demux_split(stream: &[u8], chunk_size: usize) -> (DemuxerState, Collector) {
    let chunks: Vec<&[u8]> = stream.chunks(chunk_size).collect();
    demux_chunks(&chunks, DemuxerConfig::default())
}

#[test]
fn scenario_declared_length() {
    let (state, sink) = demux_chunks(&[SCENARIO_A], DemuxerConfig::default());
    assert_eq!(state, DemuxerState::Closed);
    assert_eq!(sink.payloads(), vec![b"ABCD".to_vec(), b"XYZ".to_vec()]);
    assert!(sink.ended);
    assert!(sink.errors.is_empty());
}

#[test]
fn scenario_boundary_fallback() {
    let (state, sink) = demux_chunks(&[SCENARIO_B], DemuxerConfig::default());
    assert_eq!(state, DemuxerState::Closed);
    assert_eq!(sink.payloads(), vec![b"ABCD".to_vec(), b"XYZ".to_vec()]);
    assert!(sink.ended);
    assert!(sink.errors.is_empty());
}

#[test]
fn n_parts_in_one_chunk() {
    let payloads: Vec<Vec<u8>> = (0..25).map(|i| fake_jpeg(i, 40 + i as usize * 13)).collect();
    let mut stream = Vec::new();
    for p in &payloads {
        stream.extend(part(p, true));
    }
    stream.extend_from_slice(b"--frame--\r\n");

    let (state, sink) = demux_chunks(&[&stream[..]], DemuxerConfig::default());
    assert_eq!(state, DemuxerState::Closed);
    assert_eq!(sink.payloads(), payloads);
}

#[test]
fn every_chunk_size_yields_same_frames() {
    for stream in [SCENARIO_A, SCENARIO_B] {
        let (_, whole) = demux_split(stream, stream.len());
        for size in 1..=stream.len() {
            let (state, split) = demux_split(stream, size);
            assert_eq!(state, DemuxerState::Closed, "chunk size {size}");
            assert_eq!(split.payloads(), whole.payloads(), "chunk size {size}");
            assert!(split.ended, "chunk size {size}");
        }
    }
}

#[test]
fn random_splits_yield_same_frames() {
    let mut stream = b"HTTP preamble the relay may leave behind\r\n".to_vec();
    for i in 0..12u8 {
        stream.extend(part(&fake_jpeg(i, 200 + i as usize), i % 3 != 0));
    }
    stream.extend_from_slice(b"--frame--");

    let (_, reference) = demux_split(&stream, stream.len());
    assert_eq!(reference.frames.len(), 12);

    let mut rng = rand::rng();
    for _ in 0..50 {
        let mut chunks: Vec<&[u8]> = Vec::new();
        let mut rest = &stream[..];
        while !rest.is_empty() {
            let n = rng.random_range(1..=rest.len().min(97));
            let (head, tail) = rest.split_at(n);
            chunks.push(head);
            rest = tail;
        }
        let (state, sink) = demux_chunks(&chunks, DemuxerConfig::default());
        assert_eq!(state, DemuxerState::Closed);
        assert_eq!(sink.payloads(), reference.payloads());
    }
}

#[test]
fn fallback_trims_exactly_one_crlf() {
    let stream = b"--frame\r\n\r\nAB\r\n\r\n--frame\r\n\r\n\r\nCD\r\n--frame--";
    let (_, sink) = demux_chunks(&[&stream[..]], DemuxerConfig::default());
    assert_eq!(sink.payloads(), vec![b"AB\r\n".to_vec(), b"\r\nCD".to_vec()]);
}

#[test]
fn zero_length_part_is_skipped() {
    let stream = b"--frame\r\n\r\n--frame\r\nContent-Length: 0\r\n\r\n\r\n--frame\r\nContent-Length: 2\r\n\r\nOK\r\n--frame--";
    let (state, sink) = demux_chunks(&[&stream[..]], DemuxerConfig::default());
    assert_eq!(state, DemuxerState::Closed);
    assert_eq!(sink.payloads(), vec![b"OK".to_vec()]);
    assert!(sink.ended);
}

#[test]
fn adjacent_boundaries_without_header_block() {
    let stream = b"--frame\r\n--frame\r\nContent-Length: 2\r\n\r\nOK\r\n--frame\r\n--frame--\r\n";
    for size in [stream.len(), 1] {
        let (state, sink) = demux_split(stream, size);
        assert_eq!(state, DemuxerState::Closed, "chunk size {size}");
        assert_eq!(sink.payloads(), vec![b"OK".to_vec()], "chunk size {size}");
        assert!(sink.ended, "chunk size {size}");
        assert!(sink.errors.is_empty(), "chunk size {size}");
    }
}

#[test]
fn empty_part_then_terminal_stops_reading() {
    // A relay that keeps the connection open fails any read past the end.
    let chunks = vec![
        Ok(Bytes::from_static(
            b"--frame\r\nContent-Length: 2\r\n\r\nOK\r\n--frame\r\n--frame--\r\n",
        )),
        Err(io::Error::other("read after terminal boundary")),
    ];
    let mut demuxer = Demuxer::new(IterSource::new(chunks.into_iter()), DemuxerConfig::default())
        .expect("valid config");
    let mut sink = Collector::new();
    let state = demuxer.start(&mut sink).expect("first start");

    assert_eq!(state, DemuxerState::Closed);
    assert_eq!(sink.payloads(), vec![b"OK".to_vec()]);
    assert!(sink.ended);
    assert!(sink.errors.is_empty());
}

#[test]
fn junk_without_boundary_overflows() {
    let junk = [b'x'; 1024];
    let chunks: Vec<&[u8]> = std::iter::repeat_n(&junk[..], 100).collect();
    let (state, sink) = demux_chunks(&chunks, DemuxerConfig::new(1024));
    assert_eq!(state, DemuxerState::Errored);
    assert!(!sink.ended);
    assert_eq!(sink.errors.len(), 1);
    assert_eq!(sink.errors[0].0, ErrorKind::BufferOverflow);
}

#[test]
fn terminal_boundary_ignores_trailing_bytes() {
    let mut stream = SCENARIO_A.to_vec();
    stream.extend_from_slice(b"\r\n--frame\r\nContent-Length: 3\r\n\r\nBAD\r\n");
    let (state, sink) = demux_chunks(&[&stream[..]], DemuxerConfig::default());
    assert_eq!(state, DemuxerState::Closed);
    assert_eq!(sink.payloads(), vec![b"ABCD".to_vec(), b"XYZ".to_vec()]);
    assert!(sink.ended);
    assert!(sink.errors.is_empty());
}

#[test]
fn buffer_overflow_reported_through_sink() {
    let mut header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
    header.extend(std::iter::repeat_n(0x42, 300));
    let (state, sink) = demux_chunks(&[&header[..], &[0x42u8; 300][..]], DemuxerConfig::new(512));

    assert_eq!(state, DemuxerState::Errored);
    assert!(sink.frames.is_empty());
    assert!(!sink.ended);
    assert_eq!(sink.errors.len(), 1);
    assert_eq!(sink.errors[0].0, ErrorKind::BufferOverflow);
    assert_eq!(sink.errors[0].0.to_string(), "BufferOverflow");
}

#[test]
fn frames_before_overflow_are_kept() {
    let mut stream = part(b"first", true);
    stream.extend_from_slice(b"--frame\r\n\r\n");
    stream.extend(std::iter::repeat_n(b'z', 128));
    let (state, sink) = demux_chunks(&[&stream[..]], DemuxerConfig::new(64));
    assert_eq!(state, DemuxerState::Errored);
    assert_eq!(sink.payloads(), vec![b"first".to_vec()]);
}

#[test]
fn header_cap_fails_fast() {
    let stream = format!("--frame\r\nX-Pad: {}", "p".repeat(200));
    let config = DemuxerConfig::new(4096).with_max_header_size(64);
    let (state, sink) = demux_chunks(&[stream.as_bytes()], config);
    assert_eq!(state, DemuxerState::Errored);
    assert_eq!(sink.errors[0].0, ErrorKind::MalformedHeader);
}

#[test]
fn scenario_cancel_mid_frame() {
    let (tx, rx) = mpsc::channel::<Bytes>();
    tx.send(Bytes::from_static(b"--frame\r\nContent-Le"))
        .expect("receiver alive");
    tx.send(Bytes::from_static(b"ngth: 4\r\n\r\nAB"))
        .expect("receiver alive");

    let handle = CancelHandle::new();
    // Dropping the sender unblocks the demuxer's pending read.
    handle.on_cancel(move || drop(tx));

    let source = IterSource::new(rx.into_iter().map(Ok));
    let mut demuxer = Demuxer::new(source, DemuxerConfig::default())
        .expect("valid config")
        .with_cancel_handle(handle.clone());

    let worker = thread::spawn(move || {
        let mut sink = Collector::new();
        let state = demuxer.start(&mut sink).expect("first start");
        (state, sink)
    });

    thread::sleep(Duration::from_millis(50));
    handle.cancel();

    let (state, sink) = worker.join().expect("demuxer thread");
    assert_eq!(state, DemuxerState::Closed);
    assert!(sink.frames.is_empty());
    assert!(sink.errors.is_empty());
    assert!(!sink.ended);
}

#[test]
fn independent_streams_on_separate_threads() {
    let workers: Vec<_> = (0..4u8)
        .map(|cam| {
            thread::spawn(move || {
                let mut stream = Vec::new();
                for i in 0..10u8 {
                    stream.extend(part(&fake_jpeg(cam * 16 + i, 64), cam % 2 == 0));
                }
                stream.extend_from_slice(b"--frame--");
                let (_, sink) = demux_split(&stream, 5 + cam as usize);
                sink.frames.len()
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().expect("worker"), 10);
    }
}

#[test]
fn loopback_tcp_relay() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    let payloads: Vec<Vec<u8>> = (0..8).map(|i| fake_jpeg(i, 1500)).collect();
    let mut body = Vec::new();
    for (i, p) in payloads.iter().enumerate() {
        body.extend(part(p, i % 2 == 0));
    }
    body.extend_from_slice(b"--frame--\r\n");

    let relay = thread::spawn(move || {
        let (mut conn, _) = listener.accept().expect("accept");
        for piece in body.chunks(333) {
            conn.write_all(piece).expect("write");
            conn.flush().expect("flush");
        }
    });

    let stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("read timeout");

    let mut demuxer = Demuxer::new(
        ReaderSource::with_chunk_size(stream, 211),
        DemuxerConfig::default(),
    )
    .expect("valid config");
    let mut sink = Collector::new();
    let state = demuxer.start(&mut sink).expect("first start");
    relay.join().expect("relay thread");

    assert_eq!(state, DemuxerState::Closed);
    assert_eq!(sink.payloads(), payloads);
    assert!(sink.ended);
}
