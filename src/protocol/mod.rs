//! Wire Protocol Implementation
//!
//! This module implements RingKV's length-prefixed binary framing.
//!
//! ## Overview
//!
//! A request is a vector of byte strings; a response is a status code and a
//! payload. Both are prefixed with their length so a reader always knows how
//! many bytes to wait for, and both are capped at [`MAX_MSG`] bytes.
//!
//! ## Modules
//!
//! - `types`: `Status`, `Response` and the framing constants
//! - `parser`: Request decoding/encoding and incremental response decoding
//!
//! ## Example
//!
//! ```
//! use ringkv::protocol::{encode_request, parse_request, parse_response, Response};
//!
//! // Client side
//! let frame = encode_request(&["set", "foo", "bar"]).unwrap();
//!
//! // Server side: the body follows the 4-byte length prefix
//! let args = parse_request(&frame[4..]).unwrap();
//! assert_eq!(args.len(), 3);
//!
//! let bytes = Response::ok("new foo to bar").serialize();
//! let (response, consumed) = parse_response(&bytes).unwrap().unwrap();
//! assert_eq!(consumed, bytes.len());
//! assert_eq!(response.payload, "new foo to bar");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{encode_request, parse_request, parse_response, ParseError, ParseResult};
pub use types::{Response, Status, LEN_PREFIX, MAX_MSG, STATUS_LEN};
