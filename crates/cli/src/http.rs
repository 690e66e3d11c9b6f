//! Minimal HTTP/1.1 client for fetching a stream from the camera relay.
//!
//! Only what the relay speaks is supported: a single GET, a `200` status,
//! an identity-encoded body that runs until the connection closes.

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;

/// Status line and the headers the dump tool cares about.
#[derive(Debug, Default)]
pub struct ResponseHead {
    pub status: u16,
    pub content_type: Option<String>,
    pub chunked: bool,
}

/// An open relay response, positioned at the first body byte.
pub struct HttpStream {
    /// Body reader; keeps any body bytes already read past the head.
    pub reader: BufReader<TcpStream>,
    /// Second handle to the socket, used to shut it down on cancellation.
    pub socket: TcpStream,
    pub content_type: Option<String>,
}

/// Issue `GET path` to `addr` and read the response head.
pub fn get(addr: &str, path: &str) -> io::Result<HttpStream> {
    let mut stream = TcpStream::connect(addr)?;
    write!(
        stream,
        "GET {path} HTTP/1.1\r\nHost: {addr}\r\nAccept: multipart/x-mixed-replace\r\nConnection: close\r\n\r\n"
    )?;
    stream.flush()?;

    let socket = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let head = read_head(&mut reader)?;

    if head.status != 200 {
        return Err(io::Error::other(format!("relay answered HTTP {}", head.status)));
    }
    if head.chunked {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "chunked transfer encoding is not supported",
        ));
    }

    tracing::info!(addr, path, content_type = ?head.content_type, "relay stream opened");

    Ok(HttpStream {
        reader,
        socket,
        content_type: head.content_type,
    })
}

/// Read a status line and headers up to and including the blank line.
pub fn read_head<R: BufRead>(reader: &mut R) -> io::Result<ResponseHead> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before status line",
        ));
    }

    let status = line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid status line: {}", line.trim()),
            )
        })?;

    let mut head = ResponseHead {
        status,
        ..ResponseHead::default()
    };

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" || line == "\n" {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("content-type") {
            head.content_type = Some(value.to_string());
        } else if name.trim().eq_ignore_ascii_case("transfer-encoding") {
            head.chunked = value.to_ascii_lowercase().contains("chunked");
        }
    }

    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn parses_relay_head_and_keeps_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary=frame\r\nCache-Control: no-cache\r\n\r\n--frame\r\n";
        let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
        let head = read_head(&mut reader).unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(
            head.content_type.as_deref(),
            Some("multipart/x-mixed-replace; boundary=frame")
        );
        assert!(!head.chunked);

        let mut body = Vec::new();
        reader.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"--frame\r\n");
    }

    #[test]
    fn detects_chunked_encoding() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: Chunked\r\n\r\n";
        let head = read_head(&mut Cursor::new(raw.to_vec())).unwrap();
        assert!(head.chunked);
    }

    #[test]
    fn rejects_garbage_status_line() {
        assert!(read_head(&mut Cursor::new(b"hello\r\n\r\n".to_vec())).is_err());
        assert!(read_head(&mut Cursor::new(Vec::new())).is_err());
    }

    #[test]
    fn non_200_status_is_parsed() {
        let head = read_head(&mut Cursor::new(b"HTTP/1.1 401 Unauthorized\r\n\r\n".to_vec())).unwrap();
        assert_eq!(head.status, 401);
    }
}
