//! Wire Protocol Data Types
//!
//! Every frame on the wire starts with a 4-byte little-endian length that
//! covers everything after itself.
//!
//! ## Request
//!
//! ```text
//! +-----------+------+-----+------+-----+------+-----+-----+------+
//! | total_len | argc | len | arg1 | len | arg2 | ... | len | argn |
//! +-----------+------+-----+------+-----+------+-----+-----+------+
//! ```
//!
//! ## Response
//!
//! ```text
//! +-----------+--------+---------+
//! | total_len | status | payload |
//! +-----------+--------+---------+
//! ```
//!
//! All integers are unsigned 32-bit little-endian.

use bytes::Bytes;
use std::fmt;

/// Largest body a frame may declare, in bytes.
pub const MAX_MSG: usize = 8192;

/// Size of the length prefix that starts every frame.
pub const LEN_PREFIX: usize = 4;

/// Size of the status field of a response.
pub const STATUS_LEN: usize = 4;

/// Outcome classification carried by every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Status {
    /// The command ran.
    Ok = 0,
    /// Malformed or unknown command.
    Err = 1,
    /// Key not found (only produced by `get`).
    Nx = 2,
}

impl Status {
    /// Returns the on-wire code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Maps an on-wire code back to a status.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::Err),
            2 => Some(Status::Nx),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Err => write!(f, "ERR"),
            Status::Nx => write!(f, "NX"),
        }
    }
}

/// A server response: a status code plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub payload: Bytes,
}

impl Response {
    pub fn new(status: Status, payload: impl Into<Bytes>) -> Self {
        Self {
            status,
            payload: payload.into(),
        }
    }

    /// Creates an OK response.
    ///
    /// # Example
    /// ```
    /// use ringkv::protocol::{Response, Status};
    /// let res = Response::ok("get bar");
    /// assert_eq!(res.status, Status::Ok);
    /// ```
    pub fn ok(payload: impl Into<Bytes>) -> Self {
        Self::new(Status::Ok, payload)
    }

    /// Creates an ERR response.
    pub fn err(payload: impl Into<Bytes>) -> Self {
        Self::new(Status::Err, payload)
    }

    /// Creates an NX response.
    pub fn nx(payload: impl Into<Bytes>) -> Self {
        Self::new(Status::Nx, payload)
    }

    /// Value of the `total_len` field: status plus payload.
    pub fn body_len(&self) -> usize {
        STATUS_LEN + self.payload.len()
    }

    /// Number of bytes the full frame occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        LEN_PREFIX + self.body_len()
    }

    /// The length prefix and status field, ready to be written ahead of the payload.
    pub fn header(&self) -> [u8; LEN_PREFIX + STATUS_LEN] {
        let mut header = [0u8; LEN_PREFIX + STATUS_LEN];
        header[..LEN_PREFIX].copy_from_slice(&(self.body_len() as u32).to_le_bytes());
        header[LEN_PREFIX..].copy_from_slice(&self.status.code().to_le_bytes());
        header
    }

    /// Serializes the response to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.header());
        buf.extend_from_slice(&self.payload);
    }

    /// Payload as text, replacing invalid UTF-8.
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.payload_lossy())
    }
}
