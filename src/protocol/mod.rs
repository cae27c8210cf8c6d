//! RESP protocol implementation.
//!
//! RESP is the simple, binary-safe protocol Redis clients speak. A
//! request is an array of bulk strings; a reply is any RESP value.
//!
//! - `types`: the [`RespValue`] enum and reply serialization
//! - `parser`: incremental parser for incoming frames

pub mod parser;
pub mod types;

pub use parser::{command_from_value, parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
