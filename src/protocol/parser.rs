//! Frame Encoding and Decoding
//!
//! The server side only ever decodes request bodies: the connection layer
//! peeks the length prefix straight out of its ring buffer, checks it against
//! [`MAX_MSG`], and hands the body to [`parse_request`] once it is complete.
//!
//! The client side encodes requests with [`encode_request`] and decodes
//! responses incrementally with [`parse_response`], which follows the usual
//! convention:
//! - `Ok(Some((value, consumed)))` - a full frame was decoded
//! - `Ok(None)` - more bytes are needed
//! - `Err(ParseError)` - the frame is invalid

use crate::protocol::types::{Response, Status, LEN_PREFIX, MAX_MSG, STATUS_LEN};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The body is too short to hold its fixed-size fields
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    /// The declared argument count cannot possibly fit in a frame
    #[error("too many arguments: {0}")]
    TooManyArgs(u32),

    /// An argument runs past the end of the frame
    #[error("argument {index} overruns the frame")]
    Truncated { index: usize },

    /// Bytes remain after the last declared argument
    #[error("{0} trailing bytes after the last argument")]
    TrailingBytes(usize),

    /// The frame exceeds the maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The response carries a status code we do not know
    #[error("unknown status code: {0}")]
    UnknownStatus(u32),
}

/// Result type for codec operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Reads a little-endian u32 at `pos`. The caller guarantees four bytes are present.
#[inline]
fn read_u32(buf: &[u8], pos: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[pos..pos + 4]);
    u32::from_le_bytes(raw)
}

/// Decodes a request body (everything after the length prefix) into its arguments.
///
/// # Example
///
/// ```
/// use ringkv::protocol::{encode_request, parse_request};
///
/// let frame = encode_request(&["get", "foo"]).unwrap();
/// let args = parse_request(&frame[4..]).unwrap();
/// assert_eq!(args, vec!["get", "foo"]);
/// ```
pub fn parse_request(body: &[u8]) -> ParseResult<Vec<Bytes>> {
    if body.len() < 4 {
        return Err(ParseError::TooShort(body.len()));
    }

    let argc = read_u32(body, 0);
    if argc as usize > MAX_MSG {
        return Err(ParseError::TooManyArgs(argc));
    }

    let mut args = Vec::with_capacity(argc as usize);
    let mut pos = 4;
    for index in 0..argc as usize {
        if body.len() - pos < 4 {
            return Err(ParseError::Truncated { index });
        }
        let len = read_u32(body, pos) as usize;
        pos += 4;
        if body.len() - pos < len {
            return Err(ParseError::Truncated { index });
        }
        args.push(Bytes::copy_from_slice(&body[pos..pos + len]));
        pos += len;
    }

    if pos != body.len() {
        return Err(ParseError::TrailingBytes(body.len() - pos));
    }

    Ok(args)
}

/// Encodes a full request frame, length prefix included.
pub fn encode_request<A: AsRef<[u8]>>(args: &[A]) -> ParseResult<Vec<u8>> {
    let body_len = 4 + args
        .iter()
        .map(|arg| 4 + arg.as_ref().len())
        .sum::<usize>();
    if body_len > MAX_MSG {
        return Err(ParseError::MessageTooLarge {
            size: body_len,
            max: MAX_MSG,
        });
    }

    let mut buf = Vec::with_capacity(LEN_PREFIX + body_len);
    buf.extend_from_slice(&(body_len as u32).to_le_bytes());
    buf.extend_from_slice(&(args.len() as u32).to_le_bytes());
    for arg in args {
        let arg = arg.as_ref();
        buf.extend_from_slice(&(arg.len() as u32).to_le_bytes());
        buf.extend_from_slice(arg);
    }
    Ok(buf)
}

/// Attempts to decode one response frame from the front of `buf`.
pub fn parse_response(buf: &[u8]) -> ParseResult<Option<(Response, usize)>> {
    if buf.len() < LEN_PREFIX {
        return Ok(None);
    }

    let body_len = read_u32(buf, 0) as usize;
    if body_len > MAX_MSG {
        return Err(ParseError::MessageTooLarge {
            size: body_len,
            max: MAX_MSG,
        });
    }
    if body_len < STATUS_LEN {
        return Err(ParseError::TooShort(body_len));
    }
    if buf.len() < LEN_PREFIX + body_len {
        return Ok(None);
    }

    let code = read_u32(buf, LEN_PREFIX);
    let status = Status::from_code(code).ok_or(ParseError::UnknownStatus(code))?;
    let payload = Bytes::copy_from_slice(&buf[LEN_PREFIX + STATUS_LEN..LEN_PREFIX + body_len]);

    Ok(Some((Response::new(status, payload), LEN_PREFIX + body_len)))
}
