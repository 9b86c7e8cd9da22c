//! Message boundaries on a TCP byte stream.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::warn;

use crate::error::FrameError;

/// Largest frame accepted by the newline and octet-counting framings.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

// a length prefix has at most 10 decimal digits
const MAX_LEN_DIGITS: usize = 10;

/// How messages are delimited on a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Framing {
    /// Every `read` from the socket is one message. Messages split across
    /// TCP segments, or several messages coalesced into one read, are not
    /// separated.
    ///
    /// Unlike a plain pass-through of the read buffer, a single trailing `\n`
    /// or `\r\n` is cut from the message, and a read holding nothing but a
    /// line ending is dropped without a report.
    #[default]
    PerRead,
    /// LF terminated messages, RFC 6587 non-transparent framing.
    Newline,
    /// `MSG-LEN SP SYSLOG-MSG`, RFC 6587 octet counting.
    OctetCounting,
}

impl Framing {
    pub fn as_str(self) -> &'static str {
        match self {
            Framing::PerRead => "per-read",
            Framing::Newline => "newline",
            Framing::OctetCounting => "octet-counting",
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-read" => Ok(Framing::PerRead),
            "newline" => Ok(Framing::Newline),
            "octet-counting" => Ok(Framing::OctetCounting),
            _ => Err(format!(
                "unknown framing {s:?}, expected one of per-read, newline, octet-counting"
            )),
        }
    }
}

/// Drop a single trailing `\n` or `\r\n`.
pub fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delimiter {
    Newline,
    OctetCounting,
}

/// Stream decoder for the [`Framing::Newline`] and [`Framing::OctetCounting`]
/// framings. [`Framing::PerRead`] needs no decoder, the read loop hands each
/// read over as it is.
#[derive(Debug)]
pub struct FrameDecoder {
    delimiter: Delimiter,
    max_frame_bytes: usize,
}

impl FrameDecoder {
    /// LF terminated frames.
    pub fn newline(max_frame_bytes: usize) -> Self {
        Self {
            delimiter: Delimiter::Newline,
            max_frame_bytes,
        }
    }

    /// RFC 6587 octet-counted frames.
    pub fn octet_counting(max_frame_bytes: usize) -> Self {
        Self {
            delimiter: Delimiter::OctetCounting,
            max_frame_bytes,
        }
    }

    fn decode_newline(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        loop {
            let Some(nl) = src.iter().position(|&b| b == b'\n') else {
                if src.len() > self.max_frame_bytes {
                    return Err(FrameError::TooLarge {
                        len: src.len(),
                        max: self.max_frame_bytes,
                    });
                }

                return Ok(None);
            };

            let line = src.split_to(nl + 1);
            let line = trim_line_ending(&line);
            if line.is_empty() {
                continue;
            }
            if line.len() > self.max_frame_bytes {
                return Err(FrameError::TooLarge {
                    len: line.len(),
                    max: self.max_frame_bytes,
                });
            }

            return Ok(Some(Bytes::copy_from_slice(line)));
        }
    }

    fn decode_octet_counted(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        // tolerate line endings some senders put between frames
        let skip = src
            .iter()
            .take_while(|b| matches!(b, b'\n' | b'\r'))
            .count();
        src.advance(skip);

        let digits = src.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > MAX_LEN_DIGITS {
            return Err(FrameError::InvalidLength);
        }
        match src.get(digits) {
            Some(b' ') if digits > 0 => {}
            None => return Ok(None),
            _ => return Err(FrameError::InvalidLength),
        }

        let len = std::str::from_utf8(&src[..digits])
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or(FrameError::InvalidLength)?;
        if len == 0 {
            return Err(FrameError::InvalidLength);
        }
        if len > self.max_frame_bytes {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_bytes,
            });
        }

        let total = digits + 1 + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(digits + 1);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Decoder for FrameDecoder {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        match self.delimiter {
            Delimiter::Newline => self.decode_newline(src),
            Delimiter::OctetCounting => self.decode_octet_counted(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }

        match self.delimiter {
            Delimiter::Newline => {
                // last line without a terminator
                let rest = src.split();
                let line = trim_line_ending(&rest);
                if line.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Bytes::copy_from_slice(line)))
                }
            }
            Delimiter::OctetCounting => {
                warn!(bytes = src.len(), "Discarding incomplete frame at end of stream");
                src.clear();
                Ok(None)
            }
        }
    }
}
