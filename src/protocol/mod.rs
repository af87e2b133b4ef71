//! RESP Protocol Implementation
//!
//! This module provides the wire codec for the server.
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` reply enum and its serialization
//! - `parser`: Resumable decoder for inbound multibulk requests
//! - `limits`: Per-connection framing limits shared by decoder and connection
//!
//! ## Example
//!
//! ```
//! use respkv::protocol::{parse_command, RespValue};
//! use bytes::Bytes;
//!
//! // Decoding a request
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (args, consumed) = parse_command(data).unwrap().unwrap();
//! assert_eq!(args[1], Bytes::from("name"));
//! assert_eq!(consumed, data.len());
//!
//! // Encoding a reply
//! let response = RespValue::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(response.serialize(), b"$4\r\nAriz\r\n");
//! ```

pub mod limits;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use limits::ProtocolLimits;
pub use parser::{parse_command, ParseError, ParseResult, RespParser};
pub use types::RespValue;
