//! Resumable RESP Request Decoder
//!
//! Clients send each command as a multibulk frame: an array header followed
//! by that many bulk strings.
//!
//! ```text
//! *3\r\n
//! $3\r\nSET\r\n
//! $4\r\nname\r\n
//! $4\r\nAriz\r\n
//! ```
//!
//! ## How the Decoder Works
//!
//! The decoder is an explicit state machine:
//!
//! ```text
//!   ┌─────────────┐  *N   ┌────────────┐  $len  ┌──────────────────┐
//!   │ ArrayHeader │──────>│ BulkHeader │───────>│ BulkPayload(len) │
//!   └─────────────┘       └────────────┘        └────────┬─────────┘
//!          ▲                    ▲     more args left      │
//!          │                    └─────────────────────────┤
//!          │              last arg: emit Vec<Bytes>       │
//!          └──────────────────────────────────────────────┘
//! ```
//!
//! Bytes are removed from the connection buffer as soon as the state that
//! needed them completes, and the arguments collected so far stay inside the
//! decoder. A frame split across any number of reads is therefore scanned only
//! once, and `parse()` can be called again whenever more data arrives:
//!
//! - `Ok(Some(args))` - a complete command was decoded
//! - `Ok(None)` - need more data
//! - `Err(ParseError)` - the stream violates the protocol or a limit; the
//!   connection must be closed and the decoder must not be reused

use crate::protocol::limits::ProtocolLimits;
use crate::protocol::types::{prefix, CRLF};
use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// Longest header line (`*<N>` or `$<len>`) accepted before its CRLF.
///
/// A sign plus 19 digits covers every i64, so anything longer is garbage.
const MAX_HEADER_LEN: usize = 32;

/// Framing errors. All of them are fatal to the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A frame did not start with `*`
    #[error("Protocol error: expected '*', got '{0}'")]
    ExpectedArray(char),

    /// An array element did not start with `$`
    #[error("Protocol error: expected '$', got '{0}'")]
    ExpectedBulk(char),

    /// The array header is not a number or exceeds the configured limit
    #[error("Protocol error: invalid multibulk length")]
    InvalidMultibulkLength,

    /// The bulk header is not a number, is negative, or exceeds the limit
    #[error("Protocol error: invalid bulk length")]
    InvalidBulkLength,

    /// The array header line never terminated
    #[error("Protocol error: too big mbulk count string")]
    MultibulkHeaderTooLong,

    /// The bulk header line never terminated
    #[error("Protocol error: too big bulk count string")]
    BulkHeaderTooLong,

    /// A bulk payload was not followed by CRLF
    #[error("Protocol error: bulk string missing trailing CRLF")]
    MissingCrlf,

    /// Too many unread bytes are buffered without completing a frame
    #[error("Protocol error: buffer size {size} exceeds limit {max}")]
    BufferFull { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// What the decoder is waiting for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ArrayHeader,
    BulkHeader,
    BulkPayload(usize),
}

/// Incremental multibulk decoder.
///
/// # Example
///
/// ```
/// use respkv::protocol::{ProtocolLimits, RespParser};
/// use bytes::{Bytes, BytesMut};
///
/// let mut parser = RespParser::new(ProtocolLimits::default());
/// let mut buffer = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$4\r\nna"[..]);
///
/// assert_eq!(parser.parse(&mut buffer), Ok(None));
///
/// buffer.extend_from_slice(b"me\r\n");
/// let args = parser.parse(&mut buffer).unwrap().unwrap();
/// assert_eq!(args, vec![Bytes::from("GET"), Bytes::from("name")]);
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug)]
pub struct RespParser {
    limits: ProtocolLimits,
    state: State,
    /// Elements still expected for the frame in progress
    remaining: usize,
    /// Elements decoded so far for the frame in progress
    args: Vec<Bytes>,
}

impl Default for RespParser {
    fn default() -> Self {
        Self::new(ProtocolLimits::default())
    }
}

impl RespParser {
    /// Creates a decoder enforcing the given limits.
    pub fn new(limits: ProtocolLimits) -> Self {
        Self {
            limits,
            state: State::ArrayHeader,
            remaining: 0,
            args: Vec::new(),
        }
    }

    pub fn limits(&self) -> &ProtocolLimits {
        &self.limits
    }

    /// Returns true if part of a frame has been consumed but not yet emitted.
    pub fn in_frame(&self) -> bool {
        self.state != State::ArrayHeader
    }

    /// Decodes the next command from `buf`, consuming the bytes it used.
    pub fn parse(&mut self, buf: &mut BytesMut) -> ParseResult<Option<Vec<Bytes>>> {
        match self.advance(buf)? {
            Some(args) => Ok(Some(args)),
            None if buf.len() > self.limits.max_buffer_size => Err(ParseError::BufferFull {
                size: buf.len(),
                max: self.limits.max_buffer_size,
            }),
            None => Ok(None),
        }
    }

    /// Runs the state machine until a frame completes or input runs out.
    fn advance(&mut self, buf: &mut BytesMut) -> ParseResult<Option<Vec<Bytes>>> {
        loop {
            match self.state {
                State::ArrayHeader => {
                    let Some(&first) = buf.first() else {
                        return Ok(None);
                    };
                    if first != prefix::ARRAY {
                        return Err(ParseError::ExpectedArray(char::from(first)));
                    }

                    let line = match take_line(buf) {
                        Some(line) => line,
                        None if buf.len() > MAX_HEADER_LEN => {
                            return Err(ParseError::MultibulkHeaderTooLong)
                        }
                        None => return Ok(None),
                    };

                    let count =
                        parse_length(&line[1..]).ok_or(ParseError::InvalidMultibulkLength)?;

                    // Empty and null arrays carry no command.
                    if count <= 0 {
                        continue;
                    }
                    let count = count as usize;
                    if count > self.limits.max_multibulk_len {
                        return Err(ParseError::InvalidMultibulkLength);
                    }

                    self.remaining = count;
                    self.args = Vec::with_capacity(count);
                    self.state = State::BulkHeader;
                }
                State::BulkHeader => {
                    let Some(&first) = buf.first() else {
                        return Ok(None);
                    };
                    if first != prefix::BULK_STRING {
                        return Err(ParseError::ExpectedBulk(char::from(first)));
                    }

                    let line = match take_line(buf) {
                        Some(line) => line,
                        None if buf.len() > MAX_HEADER_LEN => {
                            return Err(ParseError::BulkHeaderTooLong)
                        }
                        None => return Ok(None),
                    };

                    let len = parse_length(&line[1..]).ok_or(ParseError::InvalidBulkLength)?;
                    if len < 0 || len as u64 > self.limits.max_bulk_len as u64 {
                        return Err(ParseError::InvalidBulkLength);
                    }

                    self.state = State::BulkPayload(len as usize);
                }
                State::BulkPayload(len) => {
                    let needed = len + CRLF.len();
                    if buf.len() < needed {
                        // Make room so the rest of the payload fits in one read.
                        buf.reserve(needed - buf.len());
                        return Ok(None);
                    }

                    if &buf[len..needed] != CRLF {
                        return Err(ParseError::MissingCrlf);
                    }

                    let data = buf.split_to(len).freeze();
                    buf.advance(CRLF.len());
                    self.args.push(data);
                    self.remaining -= 1;

                    if self.remaining == 0 {
                        self.state = State::ArrayHeader;
                        return Ok(Some(std::mem::take(&mut self.args)));
                    }
                    self.state = State::BulkHeader;
                }
            }
        }
    }
}

/// Splits off one CRLF-terminated line, without the terminator.
fn take_line(buf: &mut BytesMut) -> Option<BytesMut> {
    let pos = find_crlf(buf)?;
    let line = buf.split_to(pos);
    buf.advance(CRLF.len());
    Some(line)
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == CRLF)
}

/// Parses a decimal header value such as the `3` in `*3`.
fn parse_length(digits: &[u8]) -> Option<i64> {
    // Plain decimal only: `i64::from_str` would also take a leading `+`.
    let magnitude = digits.strip_prefix(b"-").unwrap_or(digits);
    if magnitude.is_empty() || !magnitude.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Decodes a single command from a complete byte slice with default limits.
///
/// Returns the arguments and the number of bytes consumed.
pub fn parse_command(input: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
    let mut buf = BytesMut::from(input);
    let mut parser = RespParser::default();
    Ok(parser
        .parse(&mut buf)?
        .map(|args| (args, input.len() - buf.len())))
}
