//! Interactive client.
//!
//! `--mode=client` connects to a running server, pings it, and drops
//! into a line-oriented prompt. Input is whitespace-tokenized and
//! sent as a RESP array; replies are rendered with the [`RespValue`]
//! display form (`"value"`, `(integer) n`, `(nil)`, numbered array
//! lines).
//!
//! As a shorthand, a single token that is not a known standalone
//! command is sent as `GET <token>`, so typing a bare key name prints
//! its value.

use crate::protocol::{RespParser, RespValue};
use anyhow::{bail, Context, Result};
use bytes::{Buf, Bytes, BytesMut};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Commands that make sense as a single token; anything else alone
/// on a line is treated as a key to GET.
const STANDALONE_COMMANDS: [&str; 4] = ["PING", "ECHO", "FLUSHALL", "DBSIZE"];

struct Client {
    stream: TcpStream,
    buffer: BytesMut,
    parser: RespParser,
}

impl Client {
    async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .with_context(|| format!("failed to connect to {}:{}", host, port))?;

        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            parser: RespParser::new(),
        })
    }

    async fn send_command(&mut self, args: Vec<Bytes>) -> Result<RespValue> {
        let frame = RespValue::Array(args.into_iter().map(RespValue::bulk_string).collect());
        self.stream.write_all(&frame.serialize()).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<RespValue> {
        loop {
            if !self.buffer.is_empty() {
                if let Some((value, consumed)) = self.parser.parse(&self.buffer)? {
                    self.buffer.advance(consumed);
                    return Ok(value);
                }
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                bail!("server closed the connection");
            }
        }
    }
}

/// Runs the interactive session until EOF or `quit`.
pub async fn run(host: &str, port: u16) -> Result<()> {
    let mut client = Client::connect(host, port).await?;

    let reply = client
        .send_command(vec![Bytes::from_static(b"PING")])
        .await?;
    println!("Connected to {}:{} ({})", host, port, reply);
    println!("Type commands, or 'quit' to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        let args = input
            .split_whitespace()
            .map(|token| Bytes::from(token.to_string()))
            .collect();

        let reply = client.send_command(rewrite_single_token(args)).await?;
        println!("{}", reply);
    }

    Ok(())
}

/// Turns a lone unrecognized token into `GET <token>`.
fn rewrite_single_token(args: Vec<Bytes>) -> Vec<Bytes> {
    if args.len() == 1 {
        let token = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
        if !STANDALONE_COMMANDS.contains(&token.as_str()) {
            return vec![Bytes::from_static(b"GET"), args[0].clone()];
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_token_rewrite() {
        let args = rewrite_single_token(vec![Bytes::from("mykey")]);
        assert_eq!(args, vec![Bytes::from("GET"), Bytes::from("mykey")]);
    }

    #[test]
    fn test_known_commands_pass_through() {
        let args = rewrite_single_token(vec![Bytes::from("PING")]);
        assert_eq!(args, vec![Bytes::from("PING")]);

        let args = rewrite_single_token(vec![Bytes::from("dbsize")]);
        assert_eq!(args, vec![Bytes::from("dbsize")]);
    }

    #[test]
    fn test_multi_token_untouched() {
        let args = rewrite_single_token(vec![Bytes::from("SET"), Bytes::from("k"), Bytes::from("v")]);
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], Bytes::from("SET"));
    }
}
