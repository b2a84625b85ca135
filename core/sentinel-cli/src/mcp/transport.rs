//! Blocking stdio framing with auto-detection.
//!
//! Supports both:
//! - newline-delimited JSON (one object per line)
//! - `Content-Length: N\r\n\r\n<json>` header framing
//!
//! The first non-blank line decides: `{` or `[` selects newline framing,
//! anything else header framing. The choice is fixed for the rest of the
//! connection and replies use the same framing.

use std::io::{self, BufRead, Read, Write};

use serde_json::Value;
use thiserror::Error;

pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

const CONTENT_LENGTH: &str = "content-length:";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Framing {
    Unknown,
    NewlineJson,
    ContentLength,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("stdio I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("missing Content-Length header")]
    MissingContentLength,

    #[error("message of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("invalid JSON frame: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl TransportError {
    /// Only I/O failures end the connection; the rest skip one frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Io(_))
    }
}

fn strip_utf8_bom(line: &mut Vec<u8>) {
    const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
    if line.starts_with(BOM) {
        line.drain(..BOM.len());
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace());
    let Some(start) = start else {
        return &[];
    };
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |end| end + 1);
    &bytes[start..end]
}

fn parse_content_length(line: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(line).ok()?.trim();
    if line.len() < CONTENT_LENGTH.len()
        || !line.as_bytes()[..CONTENT_LENGTH.len()].eq_ignore_ascii_case(CONTENT_LENGTH.as_bytes())
    {
        return None;
    }
    line[CONTENT_LENGTH.len()..].trim().parse().ok()
}

pub struct StdioTransport<R, W> {
    reader: R,
    writer: W,
    framing: Framing,
    max_bytes: usize,
}

impl<R: BufRead, W: Write> StdioTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_limit(reader, writer, MAX_MESSAGE_BYTES)
    }

    /// Like [`StdioTransport::new`] with a custom per-message byte limit.
    pub fn with_limit(reader: R, writer: W, max_bytes: usize) -> Self {
        Self {
            reader,
            writer,
            framing: Framing::Unknown,
            max_bytes,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    fn too_large(&self, size: usize) -> TransportError {
        TransportError::TooLarge {
            size,
            max: self.max_bytes,
        }
    }

    /// Reads one raw line including its terminator. Empty at EOF.
    ///
    /// At most `max_bytes + 2` bytes are buffered (room for `\r\n`); the
    /// rest of a longer line is discarded and reported as too large.
    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let cap = self.max_bytes.saturating_add(2);
        let mut line = Vec::new();
        (&mut self.reader)
            .take(cap as u64)
            .read_until(b'\n', &mut line)?;
        if line.len() >= cap && line.last() != Some(&b'\n') {
            let skipped = self.discard_line()?;
            return Err(self.too_large(line.len() + skipped));
        }
        Ok(line)
    }

    /// Consumes input up to and including the next newline without keeping
    /// it. Returns the number of bytes dropped.
    fn discard_line(&mut self) -> io::Result<usize> {
        let mut skipped = 0;
        loop {
            let (consumed, done) = {
                let buf = self.reader.fill_buf()?;
                if buf.is_empty() {
                    return Ok(skipped);
                }
                match buf.iter().position(|&b| b == b'\n') {
                    Some(pos) => (pos + 1, true),
                    None => (buf.len(), false),
                }
            };
            self.reader.consume(consumed);
            skipped += consumed;
            if done {
                return Ok(skipped);
            }
        }
    }

    /// Next decoded message, or `None` at end of input.
    pub fn read_message(&mut self) -> Result<Option<Value>, TransportError> {
        loop {
            let mut line = self.read_line()?;
            if line.is_empty() {
                return Ok(None);
            }
            if self.framing == Framing::Unknown {
                strip_utf8_bom(&mut line);
            }
            let trimmed = trim_ascii(&line);
            if trimmed.is_empty() {
                continue;
            }

            if self.framing == Framing::Unknown {
                self.framing = if matches!(trimmed[0], b'{' | b'[') {
                    Framing::NewlineJson
                } else {
                    Framing::ContentLength
                };
                tracing::debug!(framing = ?self.framing, "Stdio framing detected");
            }

            return match self.framing {
                Framing::ContentLength => {
                    let first = trimmed.to_vec();
                    self.read_framed(first).map(Some)
                }
                _ => {
                    if trimmed.len() > self.max_bytes {
                        return Err(self.too_large(trimmed.len()));
                    }
                    Ok(Some(serde_json::from_slice(trimmed)?))
                }
            };
        }
    }

    /// Reads the rest of a header block starting at `first`, then the body.
    fn read_framed(&mut self, first: Vec<u8>) -> Result<Value, TransportError> {
        let mut length = parse_content_length(&first);
        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            let header = trim_ascii(&line);
            if header.is_empty() {
                break;
            }
            if let Some(value) = parse_content_length(header) {
                length = Some(value);
            }
        }

        let length = length.ok_or(TransportError::MissingContentLength)?;
        if length > self.max_bytes {
            // Drain the body so the next frame starts cleanly.
            io::copy(&mut (&mut self.reader).take(length as u64), &mut io::sink())?;
            return Err(self.too_large(length));
        }

        let mut body = vec![0u8; length];
        self.reader.read_exact(&mut body)?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub fn write_message(&mut self, message: &Value) -> Result<(), TransportError> {
        let body = serde_json::to_vec(message)?;
        match self.framing {
            Framing::ContentLength => {
                write!(self.writer, "Content-Length: {}\r\n\r\n", body.len())?;
                self.writer.write_all(&body)?;
            }
            Framing::NewlineJson | Framing::Unknown => {
                self.writer.write_all(&body)?;
                self.writer.write_all(b"\n")?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer
    }
}
