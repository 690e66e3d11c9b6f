use crate::scanner;

/// Header block of a single multipart part.
///
/// ```text
/// --frame\r\n
/// Content-Type: image/jpeg\r\n
/// Content-Length: 5321\r\n
/// \r\n
/// <payload>
/// ```
///
/// Header lookup is case-insensitive. Only `Content-Length` drives
/// extraction; other headers are kept for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct PartHeader {
    /// Headers as ordered (name, value) pairs, names stored as received.
    pub headers: Vec<(String, String)>,
}

impl PartHeader {
    /// Parse a header block (the bytes between the boundary marker and the
    /// header terminator).
    ///
    /// The block is decoded as lossy UTF-8. Blank lines and lines without a
    /// colon are skipped rather than rejected: cameras in the wild emit
    /// stray whitespace and vendor junk between parts.
    pub fn parse(block: &[u8]) -> Self {
        let text = String::from_utf8_lossy(block);
        let mut headers = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_string(), value.trim().to_string()));
                }
                None => {
                    tracing::trace!(line, "skipping part header line without colon");
                }
            }
        }

        Self { headers }
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Declared payload length.
    ///
    /// Reads the leading digits of the `Content-Length` value. Returns
    /// `None` when the header is absent, has no digits, overflows, or is
    /// zero; all of these select boundary-delimited extraction.
    pub fn content_length(&self) -> Option<usize> {
        let value = self.get("Content-Length")?;
        let digits_end = value
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(value.len());
        match value[..digits_end].parse::<usize>() {
            Ok(0) | Err(_) => None,
            Ok(len) => Some(len),
        }
    }
}

/// Locate the header terminator at or after `from`.
///
/// Returns the index of the terminator's first byte, or `None` when it has
/// not been fully received yet.
pub fn find_header_end(buffer: &[u8], terminator: &[u8], from: usize) -> Option<usize> {
    scanner::find(buffer, terminator, from)
}
