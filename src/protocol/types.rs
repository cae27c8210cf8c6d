//! RESP (Redis Serialization Protocol) data types.
//!
//! Every RESP frame starts with a one-byte type tag and is framed
//! with CRLF:
//!
//! - `+` Simple String: `+OK\r\n`
//! - `-` Error: `-ERR unknown command\r\n`
//! - `:` Integer: `:1000\r\n`
//! - `$` Bulk String: `$5\r\nhello\r\n`, null: `$-1\r\n`
//! - `*` Array: `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`, null: `*-1\r\n`
//!
//! Only the framing uses CRLF; bulk string payloads are binary-safe
//! and may contain CR, LF, and NUL bytes.
//!
//! On the wire a value is a sequence of framing lines. `+`, `-`, and
//! `:` are a single line holding the payload itself; `$` and `*` are
//! a length header line followed by the payload bytes or the encoded
//! elements. Both null forms are just a length header of -1, which is
//! why encoding funnels every length through one header writer.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used by the RESP framing.
pub const CRLF: &[u8] = b"\r\n";

/// A value in the RESP protocol, used both for parsed requests and
/// for replies on their way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Non-binary-safe string; cannot contain CRLF.
    SimpleString(String),

    /// Error condition reported to the client.
    Error(String),

    /// 64-bit signed integer.
    Integer(i64),

    /// Binary-safe, length-prefixed string.
    BulkString(Bytes),

    /// Null bulk string (`$-1`) or null array (`*-1`).
    Null,

    /// Array of any RESP values, including nested arrays.
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Builds an error reply.
    pub fn error(message: impl Into<String>) -> Self {
        RespValue::Error(message.into())
    }

    /// Builds a bulk string reply from any byte source.
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// The standard `+OK` reply.
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".into())
    }

    /// The standard `+PONG` reply.
    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".into())
    }

    /// Wire encoding of this value as a fresh buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(16);
        self.serialize_into(&mut wire);
        wire
    }

    /// Appends the wire encoding of this value to `wire`.
    pub fn serialize_into(&self, wire: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => put_line(wire, b'+', s.as_bytes()),
            RespValue::Error(message) => put_line(wire, b'-', message.as_bytes()),
            RespValue::Integer(n) => put_line(wire, b':', n.to_string().as_bytes()),
            RespValue::BulkString(data) => {
                put_header(wire, b'$', data.len() as i64);
                wire.extend_from_slice(data);
                wire.extend_from_slice(CRLF);
            }
            RespValue::Null => put_header(wire, b'$', -1),
            RespValue::Array(elements) => {
                put_header(wire, b'*', elements.len() as i64);
                for element in elements {
                    element.serialize_into(wire);
                }
            }
        }
    }
}

/// One framing line: tag byte, payload, CRLF.
fn put_line(wire: &mut Vec<u8>, tag: u8, payload: &[u8]) {
    wire.push(tag);
    wire.extend_from_slice(payload);
    wire.extend_from_slice(CRLF);
}

/// A length header line for `$` and `*` frames. -1 is the null form.
fn put_header(wire: &mut Vec<u8>, tag: u8, len: i64) {
    put_line(wire, tag, len.to_string().as_bytes());
}

/// Human-readable rendering used by the interactive client: bulk
/// strings quoted, integers tagged, arrays numbered, nil as `(nil)`.
impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(values) => {
                if values.is_empty() {
                    write!(f, "(empty array)")
                } else {
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            writeln!(f)?;
                        }
                        write!(f, "{}) {}", i + 1, v)?;
                    }
                    Ok(())
                }
            }
        }
    }
}
