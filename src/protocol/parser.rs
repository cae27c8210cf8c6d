//! Streaming RESP parser.
//!
//! Parsing is built around [`FrameReader`], a cursor over a borrowed
//! buffer. The reader pulls one framing line at a time, splits off
//! the leading type tag, and interprets the rest of the line as
//! either the payload itself (`+`, `-`, `:`) or as a length header
//! (`$`, `*`) announcing payload bytes or nested elements to follow.
//! The cursor position doubles as the consumed-byte count, so the
//! caller never does framing arithmetic.
//!
//! [`RespParser::parse`] returns:
//! - `Ok(Some((value, consumed)))`: one complete frame was decoded
//!   from the first `consumed` bytes,
//! - `Ok(None)`: the buffer ends mid-frame; feed more input and retry
//!   (partial reads cost nothing but the retry),
//! - `Err(ParseError)`: the data violates the protocol. The buffer
//!   position is then meaningless and the caller must close the
//!   connection.
//!
//! A request is always an array of bulk strings;
//! [`command_from_value`] performs that final validation and hands
//! the dispatcher a plain argument vector.

use crate::protocol::types::{RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors produced while decoding RESP frames.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown type tag byte.
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// A structurally broken frame; the detail names the violation.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    /// A `$` or `*` header length below -1.
    #[error("invalid length: {0}")]
    InvalidLength(i64),

    /// A request array with zero elements.
    #[error("empty command")]
    EmptyCommand,

    /// A payload above the allowed size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size of a single bulk string (512 MB, same as Redis).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Incremental RESP parser.
///
/// Stateless between calls: each call walks the buffer with a fresh
/// [`FrameReader`] and either yields a whole frame or asks for more
/// input, so a connection can keep one parser for its lifetime.
#[derive(Debug, Default)]
pub struct RespParser;

impl RespParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to decode one RESP value from the front of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let mut frame = FrameReader::new(buf);
        match frame.read_value(0)? {
            Some(value) => Ok(Some((value, frame.pos))),
            None => Ok(None),
        }
    }
}

/// Cursor over a borrowed buffer that decodes RESP frames. `pos` is
/// the number of bytes consumed by everything read so far.
struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// The next CRLF-terminated line, without its terminator, or
    /// `None` while the terminator has not arrived yet.
    fn take_line(&mut self) -> Option<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        let end = rest.windows(2).position(|w| w == CRLF)?;
        self.pos += end + 2;
        Some(&rest[..end])
    }

    /// Exactly `len` payload bytes plus their trailing CRLF, or
    /// `None` while they have not all arrived.
    fn take_payload(&mut self, len: usize) -> ParseResult<Option<&'a [u8]>> {
        let rest = &self.buf[self.pos..];
        if rest.len() < len + 2 {
            return Ok(None);
        }
        if &rest[len..len + 2] != CRLF {
            return Err(ParseError::Malformed("bulk payload missing trailing CRLF"));
        }
        self.pos += len + 2;
        Ok(Some(&rest[..len]))
    }

    /// Decodes one value. Line-based kinds are finished immediately;
    /// `$` and `*` hand their header line on to the payload readers.
    fn read_value(&mut self, depth: usize) -> ParseResult<Option<RespValue>> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ParseError::Malformed("maximum nesting depth exceeded"));
        }

        let line = match self.take_line() {
            Some(line) => line,
            None => return Ok(None),
        };

        let (&tag, payload) = match line.split_first() {
            Some(split) => split,
            None => return Err(ParseError::Malformed("empty frame line")),
        };

        match tag {
            b'+' => Ok(Some(RespValue::SimpleString(text(payload)?))),
            b'-' => Ok(Some(RespValue::Error(text(payload)?))),
            b':' => Ok(Some(RespValue::Integer(decimal(payload)?))),
            b'$' => self.read_bulk(payload),
            b'*' => self.read_array(payload, depth),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// Payload of a `$` frame, given its header line. A length of -1
    /// is the null bulk; the payload bytes are taken verbatim, so
    /// embedded CR or LF does not terminate the frame.
    fn read_bulk(&mut self, header: &[u8]) -> ParseResult<Option<RespValue>> {
        let declared = decimal(header)?;
        if declared == -1 {
            return Ok(Some(RespValue::Null));
        }
        if declared < 0 {
            return Err(ParseError::InvalidLength(declared));
        }

        let len = declared as usize;
        if len > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: len,
                max: MAX_BULK_SIZE,
            });
        }

        match self.take_payload(len)? {
            Some(data) => Ok(Some(RespValue::BulkString(Bytes::copy_from_slice(data)))),
            None => Ok(None),
        }
    }

    /// Elements of a `*` frame, given its header line. A count of -1
    /// is the null array.
    fn read_array(&mut self, header: &[u8], depth: usize) -> ParseResult<Option<RespValue>> {
        let declared = decimal(header)?;
        if declared == -1 {
            return Ok(Some(RespValue::Null));
        }
        if declared < 0 {
            return Err(ParseError::InvalidLength(declared));
        }

        let mut elements = Vec::with_capacity(declared as usize);
        for _ in 0..declared {
            match self.read_value(depth + 1)? {
                Some(value) => elements.push(value),
                None => return Ok(None),
            }
        }
        Ok(Some(RespValue::Array(elements)))
    }
}

fn text(raw: &[u8]) -> ParseResult<String> {
    match std::str::from_utf8(raw) {
        Ok(s) => Ok(s.to_string()),
        Err(_) => Err(ParseError::Malformed("line is not valid UTF-8")),
    }
}

fn decimal(raw: &[u8]) -> ParseResult<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ParseError::Malformed("not a decimal integer"))
}

/// Parses a single RESP message from a byte slice. Convenience
/// wrapper around a fresh [`RespParser`].
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}

/// Validates that a parsed frame is a non-empty array of bulk
/// strings and extracts the argument vector the dispatcher expects.
pub fn command_from_value(value: RespValue) -> ParseResult<Vec<Bytes>> {
    let elements = match value {
        RespValue::Array(elements) => elements,
        _ => return Err(ParseError::Malformed("expected array frame")),
    };

    if elements.is_empty() {
        return Err(ParseError::EmptyCommand);
    }

    elements
        .into_iter()
        .map(|element| match element {
            RespValue::BulkString(data) => Ok(data),
            _ => Err(ParseError::Malformed("expected bulk string argument")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_frames() {
        let cases: Vec<(&[u8], RespValue)> = vec![
            (b"+OK\r\n", RespValue::SimpleString("OK".to_string())),
            (
                b"-ERR unknown command\r\n",
                RespValue::Error("ERR unknown command".to_string()),
            ),
            (b":1000\r\n", RespValue::Integer(1000)),
            (b":-42\r\n", RespValue::Integer(-42)),
            (b"$5\r\nhello\r\n", RespValue::BulkString(Bytes::from("hello"))),
            (b"$0\r\n\r\n", RespValue::BulkString(Bytes::new())),
            (b"$-1\r\n", RespValue::Null),
            (b"*-1\r\n", RespValue::Null),
            (b"*0\r\n", RespValue::Array(vec![])),
        ];

        for (input, expected) in cases {
            let (value, consumed) = parse_message(input).unwrap().unwrap();
            assert_eq!(value, expected, "parsing {:?}", input);
            assert_eq!(consumed, input.len(), "consumed for {:?}", input);
        }
    }

    #[test]
    fn test_incomplete_frames_ask_for_more() {
        let cases: Vec<&[u8]> = vec![
            b"",
            b"+OK",
            b"+OK\r",
            b":12",
            b"$5",
            b"$5\r\nhel",
            b"$5\r\nhello",
            b"*2\r\n",
            b"*2\r\n$3\r\nGET\r\n",
        ];

        for input in cases {
            assert_eq!(parse_message(input).unwrap(), None, "input {:?}", input);
        }
    }

    #[test]
    fn test_consumed_stops_at_frame_boundary() {
        // Two pipelined frames; exactly one may be taken per call.
        let input = b"+OK\r\n:1\r\n";
        let (value, consumed) = parse_message(input).unwrap().unwrap();
        assert_eq!(value, RespValue::SimpleString("OK".to_string()));
        assert_eq!(consumed, 5);

        let (value, consumed) = parse_message(&input[5..]).unwrap().unwrap();
        assert_eq!(value, RespValue::Integer(1));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_bulk_payload_may_contain_crlf() {
        let (value, consumed) = parse_message(b"$7\r\na\r\nb\0cd\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::from(&b"a\r\nb\0cd"[..])));
        assert_eq!(consumed, 13);
    }

    #[test]
    fn test_array_of_bulk_strings() {
        let (value, consumed) = parse_message(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::BulkString(Bytes::from("GET")),
                RespValue::BulkString(Bytes::from("name")),
            ])
        );
        assert_eq!(consumed, 23);
    }

    #[test]
    fn test_mixed_and_nested_arrays() {
        let (value, _) = parse_message(b"*3\r\n+OK\r\n:100\r\n$5\r\nhello\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::SimpleString("OK".to_string()),
                RespValue::Integer(100),
                RespValue::BulkString(Bytes::from("hello")),
            ])
        );

        let (value, _) = parse_message(b"*2\r\n:1\r\n*2\r\n:2\r\n:3\r\n").unwrap().unwrap();
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::Integer(1),
                RespValue::Array(vec![RespValue::Integer(2), RespValue::Integer(3)]),
            ])
        );
    }

    #[test]
    fn test_malformed_frames() {
        assert_eq!(
            parse_message(b"@invalid\r\n"),
            Err(ParseError::UnknownPrefix(b'@'))
        );
        assert!(matches!(
            parse_message(b":not_a_number\r\n"),
            Err(ParseError::Malformed(_))
        ));
        assert_eq!(parse_message(b"$-7\r\n"), Err(ParseError::InvalidLength(-7)));
        assert_eq!(parse_message(b"*-3\r\n"), Err(ParseError::InvalidLength(-3)));
        assert!(matches!(
            parse_message(b"$3\r\nabcXX"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_message(b"\r\n"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_roundtrip() {
        let values = vec![
            RespValue::SimpleString("PONG".to_string()),
            RespValue::error("ERR boom"),
            RespValue::Integer(-7),
            RespValue::bulk_string(Bytes::from(&b"bin\r\n\0data"[..])),
            RespValue::Null,
            RespValue::Array(vec![
                RespValue::bulk_string(Bytes::from("SET")),
                RespValue::bulk_string(Bytes::from("key")),
                RespValue::bulk_string(Bytes::from("value")),
            ]),
        ];

        for original in values {
            let serialized = original.serialize();
            let (parsed, consumed) = parse_message(&serialized).unwrap().unwrap();
            assert_eq!(original, parsed);
            assert_eq!(consumed, serialized.len());
        }
    }

    #[test]
    fn test_command_from_value() {
        let (frame, _) = parse_message(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n")
            .unwrap()
            .unwrap();
        let args = command_from_value(frame).unwrap();
        assert_eq!(
            args,
            vec![Bytes::from("SET"), Bytes::from("foo"), Bytes::from("bar")]
        );
    }

    #[test]
    fn test_command_from_empty_array() {
        let (frame, _) = parse_message(b"*0\r\n").unwrap().unwrap();
        assert_eq!(command_from_value(frame), Err(ParseError::EmptyCommand));
    }

    #[test]
    fn test_command_rejects_non_bulk_elements() {
        let (frame, _) = parse_message(b"*1\r\n:1\r\n").unwrap().unwrap();
        assert!(matches!(
            command_from_value(frame),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_command_rejects_non_array() {
        let (frame, _) = parse_message(b"+PING\r\n").unwrap().unwrap();
        assert!(matches!(
            command_from_value(frame),
            Err(ParseError::Malformed(_))
        ));
    }
}
