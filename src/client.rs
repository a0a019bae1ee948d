//! Async Client
//!
//! A small client for the RingKV wire protocol. It frames a request, writes it,
//! and reads back exactly one response. The stream type is generic so tests can
//! substitute an in-memory mock for the TCP connection.
//!
//! ## Example
//!
//! ```ignore
//! use ringkv::client::Client;
//!
//! let mut client = Client::connect("127.0.0.1:1234").await?;
//! let response = client.send(&["set", "name", "ringkv"]).await?;
//! println!("{}", response);
//! ```

use crate::protocol::{encode_request, parse_response, ParseError, Response};
use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

/// Errors that can occur while talking to a server
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    #[error("connection closed by server")]
    ConnectionClosed,
}

/// A connection to a RingKV server.
pub struct Client<S = TcpStream> {
    stream: S,
    /// Bytes received but not yet parsed into a response
    buffer: BytesMut,
}

impl Client<TcpStream> {
    /// Connects to a server over TCP.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Sends one request and waits for its response.
    pub async fn send<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<Response, ClientError> {
        let frame = encode_request(args)?;
        debug!(args = args.len(), bytes = frame.len(), "sending request");
        self.send_raw(&frame).await?;
        self.read_response().await
    }

    pub async fn get(&mut self, key: &[u8]) -> Result<Response, ClientError> {
        self.send(&[&b"get"[..], key]).await
    }

    pub async fn set(&mut self, key: &[u8], value: &[u8]) -> Result<Response, ClientError> {
        self.send(&[&b"set"[..], key, value]).await
    }

    pub async fn del(&mut self, key: &[u8]) -> Result<Response, ClientError> {
        self.send(&[&b"del"[..], key]).await
    }

    /// Writes bytes to the server as-is.
    ///
    /// Used to pipeline several pre-encoded requests, or to send frames the
    /// encoder would refuse.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads the next response from the server.
    pub async fn read_response(&mut self) -> Result<Response, ClientError> {
        loop {
            if let Some((response, consumed)) = parse_response(&self.buffer)? {
                self.buffer.advance(consumed);
                debug!(status = %response.status, bytes = consumed, "received response");
                return Ok(response);
            }

            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                return Err(ClientError::ConnectionClosed);
            }
        }
    }
}
