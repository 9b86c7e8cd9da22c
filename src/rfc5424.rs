//! Decoder for [RFC 5424](https://datatracker.ietf.org/doc/html/rfc5424) messages.

use crate::error::DecodeError;
use crate::message::DecodedMessage;
use crate::structured_data::{parse_structured_data_with, DuplicateIds};
use crate::timestamp::parse_timestamp;

/// Highest valid PRI value, facility local7 with severity debug.
const MAX_PRIORITY: u32 = 191;

/// RFC 5424 message decoder.
///
/// Decoding is pure: the decoder keeps no state between calls and the
/// returned message shares nothing with the input buffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Decoder {
    duplicate_ids: DuplicateIds,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// How repeated SD-IDs in one message are handled, see [`DuplicateIds`].
    pub fn with_duplicate_ids(mut self, duplicate_ids: DuplicateIds) -> Self {
        self.duplicate_ids = duplicate_ids;
        self
    }

    pub fn decode(&self, raw: &[u8]) -> Result<DecodedMessage, DecodeError> {
        let input = std::str::from_utf8(raw)?;
        let mut offset = 0;

        let priority = parse_priority(input, &mut offset)?;

        // https://datatracker.ietf.org/doc/html/rfc5424#section-9.1
        let version = match take_token(input, &mut offset) {
            Some("1") => 1,
            Some("") => return Err(DecodeError::MalformedHeader("missing VERSION after PRI")),
            Some(token) => return Err(DecodeError::UnsupportedVersion(token.to_owned())),
            None => return Err(DecodeError::IncompleteHeader("missing VERSION")),
        };

        let timestamp = parse_timestamp(next_field(input, &mut offset, "missing TIMESTAMP")?)?;
        let hostname = nil_or_owned(next_field(input, &mut offset, "missing HOSTNAME")?);
        let app_name = nil_or_owned(next_field(input, &mut offset, "missing APP-NAME")?);
        let proc_id = nil_or_owned(next_field(input, &mut offset, "missing PROCID")?);
        let msg_id = nil_or_owned(next_field(input, &mut offset, "missing MSGID")?);

        skip_separator(input, &mut offset);
        let bytes = input.as_bytes();
        let structured_data = match bytes.get(offset) {
            Some(b'-') if matches!(bytes.get(offset + 1), None | Some(b' ')) => {
                offset += 1;
                Vec::new()
            }
            Some(b'[') => {
                let (elements, end) =
                    parse_structured_data_with(input, offset, self.duplicate_ids)?;
                offset = end;
                elements
            }
            _ => return Err(DecodeError::IncompleteHeader("missing STRUCTURED-DATA")),
        };

        // exactly one separator between STRUCTURED-DATA and MSG
        if bytes.get(offset) == Some(&b' ') {
            offset += 1;
        }
        let msg = input[offset..].to_owned();

        Ok(DecodedMessage {
            priority,
            version,
            timestamp,
            hostname,
            app_name,
            proc_id,
            msg_id,
            structured_data,
            msg,
        })
    }
}

/// Decode one RFC 5424 message with the default [`Decoder`].
///
/// # Example
///
/// ```
/// let raw = b"<13>1 2023-10-10T14:48:00Z myhost myapp 1234 ID47 - Test message";
/// let msg = syslog_tcp::decode(raw).unwrap();
///
/// assert_eq!(msg.hostname.as_deref(), Some("myhost"));
/// assert_eq!(msg.msg, "Test message");
/// ```
pub fn decode(raw: &[u8]) -> Result<DecodedMessage, DecodeError> {
    Decoder::new().decode(raw)
}

// https://datatracker.ietf.org/doc/html/rfc5424#section-6.2.1
fn parse_priority(input: &str, offset: &mut usize) -> Result<u8, DecodeError> {
    let bytes = input.as_bytes();
    if bytes.first() != Some(&b'<') {
        return Err(DecodeError::MalformedHeader("expected '<' at start of PRI"));
    }

    // PRIVAL has no leading zeros, "<0>" is the only value starting with 0
    if bytes.get(1) == Some(&b'0') && bytes.get(2) != Some(&b'>') {
        return Err(DecodeError::MalformedHeader("leading zero in PRI"));
    }

    let mut prival = 0u32;
    for (pos, ch) in bytes.iter().enumerate().skip(1) {
        match ch {
            b'0'..=b'9' if pos <= 3 => prival = prival * 10 + (ch - b'0') as u32,
            b'>' if pos > 1 => {
                if prival > MAX_PRIORITY {
                    return Err(DecodeError::MalformedHeader("PRI out of range"));
                }

                *offset = pos + 1;
                return Ok(prival as u8);
            }
            _ => return Err(DecodeError::MalformedHeader("invalid PRI")),
        }
    }

    Err(DecodeError::MalformedHeader("unterminated PRI"))
}

#[inline]
fn skip_separator(input: &str, offset: &mut usize) {
    let bytes = input.as_bytes();
    while bytes.get(*offset) == Some(&b' ') {
        *offset += 1;
    }
}

/// Take the token at `offset` up to the next space or end of input.
/// `None` when the input is already exhausted.
#[inline]
fn take_token<'a>(input: &'a str, offset: &mut usize) -> Option<&'a str> {
    if *offset >= input.len() {
        return None;
    }

    let start = *offset;
    let end = input[start..]
        .find(' ')
        .map_or(input.len(), |pos| start + pos);

    *offset = end;
    Some(&input[start..end])
}

#[inline]
fn next_field<'a>(
    input: &'a str,
    offset: &mut usize,
    missing: &'static str,
) -> Result<&'a str, DecodeError> {
    skip_separator(input, offset);
    take_token(input, offset).ok_or(DecodeError::IncompleteHeader(missing))
}

#[inline]
fn nil_or_owned(token: &str) -> Option<String> {
    match token {
        "-" => None,
        s => Some(s.to_owned()),
    }
}
