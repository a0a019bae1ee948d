//! Connection State Machine
//!
//! This module drives a single client connection. Nothing here ever blocks:
//! every socket call is a `try_read`/`try_write`, and a `WouldBlock` simply
//! ends the connection's turn. All progress lives in the two ring buffers, so
//! the next readiness event picks up exactly where this one stopped.
//!
//! ## Connection Lifecycle
//!
//! ```text
//!                 frame parsed, response queued
//!        ┌─────────┐ ─────────────────────────> ┌──────────┐
//!  ───>  │ Request │                            │ Response │
//!        └─────────┘ <───────────────────────── └──────────┘
//!             │          write buffer drained        │
//!             │                                      │
//!             │ EOF, I/O error,                      │ I/O error
//!             │ bad or oversized frame,              │
//!             │ write buffer overflow                │
//!             ▼                                      ▼
//!        ┌──────────────────────────────────────────────┐
//!        │                   Closing                    │
//!        └──────────────────────────────────────────────┘
//! ```
//!
//! ## Buffer Management
//!
//! Each direction has a ring buffer sized for exactly one maximum frame
//! (`4 + MAX_MSG` bytes). Requests on a connection are handled strictly in
//! order: a response is queued and flushed before the next buffered request
//! is parsed. A response that does not fit in the write buffer closes the
//! connection instead of being split or held back.

use crate::commands::CommandHandler;
use crate::connection::ring::RingBuffer;
use crate::protocol::{parse_request, LEN_PREFIX, MAX_MSG};
use std::io;
use std::net::SocketAddr;
use tokio::io::Interest;
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Capacity of each connection buffer: one maximum-size frame.
pub const BUFFER_SIZE: usize = LEN_PREFIX + MAX_MSG;

/// Non-blocking socket operations a connection needs.
///
/// Both methods must return `ErrorKind::WouldBlock` instead of blocking.
pub trait Socket {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;
}

impl Socket for TcpStream {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        TcpStream::try_read(self, buf)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        TcpStream::try_write(self, buf)
    }
}

/// Statistics for connection handling
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: u64,
    /// Currently active connections
    pub active_connections: u64,
    /// Total commands processed
    pub commands_processed: u64,
    /// Total bytes read
    pub bytes_read: u64,
    /// Total bytes written
    pub bytes_written: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&mut self) {
        self.connections_accepted += 1;
        self.active_connections += 1;
    }

    pub fn connection_closed(&mut self) {
        self.active_connections = self.active_connections.saturating_sub(1);
    }

    pub fn command_processed(&mut self) {
        self.commands_processed += 1;
    }

    pub fn bytes_read(&mut self, count: usize) {
        self.bytes_read += count as u64;
    }

    pub fn bytes_written(&mut self, count: usize) {
        self.bytes_written += count as u64;
    }
}

/// Where a connection is in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Reading and parsing requests (initial state)
    Request,
    /// Flushing a queued response
    Response,
    /// Scheduled for teardown
    Closing,
}

/// A single client connection.
pub struct Connection<S> {
    socket: S,
    addr: SocketAddr,
    state: ConnState,
    rbuf: RingBuffer,
    wbuf: RingBuffer,
    /// Bytes flushed since the write buffer was last empty.
    sent: usize,
    /// Request body staging area, reused across requests.
    scratch: Vec<u8>,
}

impl<S: Socket> Connection<S> {
    /// Creates a connection in the `Request` state with empty buffers.
    pub fn new(socket: S, addr: SocketAddr) -> Self {
        Self::with_buffer_size(socket, addr, BUFFER_SIZE)
    }

    /// Creates a connection whose ring buffers hold `size` bytes each.
    pub fn with_buffer_size(socket: S, addr: SocketAddr, size: usize) -> Self {
        Self {
            socket,
            addr,
            state: ConnState::Request,
            rbuf: RingBuffer::new(size),
            wbuf: RingBuffer::new(size),
            sent: 0,
            scratch: vec![0u8; MAX_MSG],
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Readiness this connection waits for, or `None` once it is closing.
    pub fn interest(&self) -> Option<Interest> {
        match self.state {
            ConnState::Request => Some(Interest::READABLE),
            ConnState::Response => Some(Interest::WRITABLE),
            ConnState::Closing => None,
        }
    }

    /// Marks the connection for teardown.
    pub fn close(&mut self) {
        self.state = ConnState::Closing;
    }

    /// Runs one turn of the state machine after a readiness event.
    pub fn on_ready(&mut self, commands: &mut CommandHandler, stats: &mut ConnectionStats) {
        if self.state == ConnState::Response {
            self.state_response(stats);
        }
        if self.state == ConnState::Request {
            self.state_request(commands, stats);
        }
    }

    fn state_request(&mut self, commands: &mut CommandHandler, stats: &mut ConnectionStats) {
        // Requests that arrived behind a response which could not be flushed at once.
        while self.try_one_request(commands, stats) {}
        while self.state == ConnState::Request && self.try_fill_buffer(commands, stats) {}
    }

    fn state_response(&mut self, stats: &mut ConnectionStats) {
        while self.try_flush_buffer(stats) {}
    }

    /// Reads once from the socket, then handles every complete request buffered.
    ///
    /// Returns true when the caller should keep reading.
    fn try_fill_buffer(&mut self, commands: &mut CommandHandler, stats: &mut ConnectionStats) -> bool {
        if self.rbuf.is_full() {
            return false;
        }

        let result = {
            let span = self.rbuf.write_slice();
            retry_interrupted(|| self.socket.try_read(span))
        };

        match result {
            Ok(0) => {
                if self.rbuf.is_empty() {
                    info!(client = %self.addr, "EOF, client closed");
                } else {
                    info!(client = %self.addr, buffered = self.rbuf.len(), "Unexpected EOF");
                }
                self.close();
                false
            }
            Ok(n) => {
                self.rbuf.commit(n);
                stats.bytes_read(n);
                trace!(client = %self.addr, bytes = n, "Read data");

                while self.try_one_request(commands, stats) {}
                self.state == ConnState::Request
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Err(e) => {
                error!(client = %self.addr, error = %e, "read() failed");
                self.close();
                false
            }
        }
    }

    /// Parses and executes one request from the read buffer, if a full one is there.
    ///
    /// Returns true when the response was flushed and another request may follow.
    fn try_one_request(&mut self, commands: &mut CommandHandler, stats: &mut ConnectionStats) -> bool {
        if self.state != ConnState::Request || self.rbuf.len() < LEN_PREFIX {
            return false;
        }

        // The length prefix may straddle the wrap, so peek rather than slice.
        let mut prefix = [0u8; LEN_PREFIX];
        self.rbuf.peek(&mut prefix);
        let len = u32::from_le_bytes(prefix) as usize;
        if len > MAX_MSG {
            warn!(client = %self.addr, len, max = MAX_MSG, "request is too long");
            self.close();
            return false;
        }
        if LEN_PREFIX + len > self.rbuf.len() {
            trace!(
                client = %self.addr,
                buffered = self.rbuf.len(),
                "Incomplete request, need more data"
            );
            return false;
        }

        self.rbuf.consume(LEN_PREFIX);
        let body = &mut self.scratch[..len];
        self.rbuf.read(body);

        let args = match parse_request(body) {
            Ok(args) => args,
            Err(e) => {
                warn!(client = %self.addr, error = %e, "bad request");
                self.close();
                return false;
            }
        };

        let response = commands.execute(&args);
        stats.command_processed();

        if self.wbuf.available_space() < response.encoded_len() {
            error!(
                client = %self.addr,
                needed = response.encoded_len(),
                available = self.wbuf.available_space(),
                "write buffer is not enough"
            );
            self.close();
            return false;
        }
        self.wbuf.write(&response.header());
        self.wbuf.write(&response.payload);

        self.state = ConnState::Response;
        self.state_response(stats);

        self.state == ConnState::Request
    }

    /// Writes one contiguous span of the write buffer to the socket.
    ///
    /// Returns true when there is more to write and the socket accepted data.
    fn try_flush_buffer(&mut self, stats: &mut ConnectionStats) -> bool {
        if self.wbuf.is_empty() {
            self.state = ConnState::Request;
            return false;
        }

        let result = {
            let span = self.wbuf.read_slice();
            retry_interrupted(|| self.socket.try_write(span))
        };

        match result {
            Ok(0) => {
                warn!(client = %self.addr, "write() accepted no data");
                self.close();
                false
            }
            Ok(n) => {
                self.wbuf.consume(n);
                self.sent += n;
                stats.bytes_written(n);

                if self.wbuf.is_empty() {
                    trace!(client = %self.addr, bytes = self.sent, "Sent response");
                    self.sent = 0;
                    self.state = ConnState::Request;
                    return false;
                }
                true
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                debug!(
                    client = %self.addr,
                    sent = self.sent,
                    pending = self.wbuf.len(),
                    "write would block"
                );
                false
            }
            Err(e) => {
                error!(client = %self.addr, error = %e, "write() failed");
                self.close();
                false
            }
        }
    }
}

fn retry_interrupted<F>(mut op: F) -> io::Result<usize>
where
    F: FnMut() -> io::Result<usize>,
{
    loop {
        match op() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_request, parse_response, Response};
    use crate::storage::Store;
    use bytes::Bytes;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// What the mock socket does on the next read.
    enum ReadStep {
        Data(Vec<u8>),
        Eof,
        Fail(io::ErrorKind),
    }

    /// In-memory socket. Reads replay scripted steps and then would block;
    /// writes accept up to `write_budget` bytes and then would block.
    struct MockSocket {
        reads: RefCell<VecDeque<ReadStep>>,
        written: RefCell<Vec<u8>>,
        write_budget: RefCell<usize>,
    }

    impl MockSocket {
        fn new() -> Self {
            Self {
                reads: RefCell::new(VecDeque::new()),
                written: RefCell::new(Vec::new()),
                write_budget: RefCell::new(usize::MAX),
            }
        }

        fn push(&self, step: ReadStep) {
            self.reads.borrow_mut().push_back(step);
        }

        fn push_data(&self, data: &[u8]) {
            self.push(ReadStep::Data(data.to_vec()));
        }

        fn set_write_budget(&self, budget: usize) {
            *self.write_budget.borrow_mut() = budget;
        }

        fn take_written(&self) -> Vec<u8> {
            std::mem::take(&mut *self.written.borrow_mut())
        }
    }

    impl Socket for MockSocket {
        fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
            let mut reads = self.reads.borrow_mut();
            match reads.pop_front() {
                None => Err(io::ErrorKind::WouldBlock.into()),
                Some(ReadStep::Eof) => Ok(0),
                Some(ReadStep::Fail(kind)) => Err(kind.into()),
                Some(ReadStep::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        reads.push_front(ReadStep::Data(data.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }

        fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
            let mut budget = self.write_budget.borrow_mut();
            if *budget == 0 {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(*budget);
            *budget -= n;
            self.written.borrow_mut().extend_from_slice(&buf[..n]);
            Ok(n)
        }
    }

    fn create_connection() -> (Connection<MockSocket>, CommandHandler, ConnectionStats) {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        (
            Connection::new(MockSocket::new(), addr),
            CommandHandler::new(Store::new()),
            ConnectionStats::new(),
        )
    }

    fn request(args: &[&str]) -> Vec<u8> {
        encode_request(args).unwrap()
    }

    fn decode_all(mut bytes: &[u8]) -> Vec<Response> {
        let mut responses = Vec::new();
        while let Some((response, consumed)) = parse_response(bytes).unwrap() {
            responses.push(response);
            bytes = &bytes[consumed..];
        }
        assert!(bytes.is_empty(), "left over bytes: {:?}", bytes);
        responses
    }

    #[test]
    fn test_single_request() {
        let (mut conn, mut commands, mut stats) = create_connection();

        conn.socket().push_data(&request(&["set", "foo", "bar"]));
        conn.on_ready(&mut commands, &mut stats);

        assert_eq!(conn.state(), ConnState::Request);
        assert_eq!(
            decode_all(&conn.socket().take_written()),
            vec![Response::ok("new foo to bar")]
        );
        assert_eq!(stats.commands_processed, 1);
        assert!(stats.bytes_read > 0);
        assert!(stats.bytes_written > 0);
    }

    #[test]
    fn test_request_split_across_reads() {
        let (mut conn, mut commands, mut stats) = create_connection();
        let frame = request(&["get", "missing"]);

        // Even the length prefix arrives in pieces.
        conn.socket().push_data(&frame[..2]);
        conn.on_ready(&mut commands, &mut stats);
        assert!(conn.socket().take_written().is_empty());

        conn.socket().push_data(&frame[2..9]);
        conn.on_ready(&mut commands, &mut stats);
        assert!(conn.socket().take_written().is_empty());
        assert_eq!(conn.state(), ConnState::Request);

        conn.socket().push_data(&frame[9..]);
        conn.on_ready(&mut commands, &mut stats);
        assert_eq!(
            decode_all(&conn.socket().take_written()),
            vec![Response::nx("not found missing")]
        );
    }

    #[test]
    fn test_pipelined_requests() {
        let (mut conn, mut commands, mut stats) = create_connection();

        let mut batch = request(&["set", "foo", "bar"]);
        batch.extend(request(&["set", "foo", "baz"]));
        batch.extend(request(&["get", "foo"]));
        batch.extend(request(&["del", "foo"]));
        batch.extend(request(&["del", "foo"]));
        conn.socket().push_data(&batch);
        conn.on_ready(&mut commands, &mut stats);

        assert_eq!(
            decode_all(&conn.socket().take_written()),
            vec![
                Response::ok("new foo to bar"),
                Response::ok("changed foo to baz"),
                Response::ok("get baz"),
                Response::ok("deleted foo"),
                Response::ok("not found foo"),
            ]
        );
        assert_eq!(stats.commands_processed, 5);
    }

    #[test]
    fn test_requests_wrapping_the_read_buffer() {
        let (mut conn, mut commands, mut stats) = create_connection();
        let value = "v".repeat(3000);
        let frame = request(&["set", "key", &value]);

        // Three frames of ~3 KB cannot sit in an 8 KB buffer without wrapping.
        for _ in 0..3 {
            conn.socket().push_data(&frame);
        }
        conn.on_ready(&mut commands, &mut stats);

        let responses = decode_all(&conn.socket().take_written());
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2].payload_lossy(), format!("changed key to {}", value));
    }

    #[test]
    fn test_unknown_command_keeps_connection_open() {
        let (mut conn, mut commands, mut stats) = create_connection();

        conn.socket().push_data(&request(&["ping"]));
        conn.on_ready(&mut commands, &mut stats);

        assert_eq!(conn.state(), ConnState::Request);
        assert_eq!(
            decode_all(&conn.socket().take_written()),
            vec![Response::err("Unknown cmd")]
        );
    }

    #[test]
    fn test_oversized_frame_closes() {
        let (mut conn, mut commands, mut stats) = create_connection();

        conn.socket()
            .push_data(&((MAX_MSG as u32) + 1).to_le_bytes());
        conn.on_ready(&mut commands, &mut stats);

        assert_eq!(conn.state(), ConnState::Closing);
        assert_eq!(conn.interest(), None);
        assert!(conn.socket().take_written().is_empty());
    }

    #[test]
    fn test_malformed_frame_closes() {
        let (mut conn, mut commands, mut stats) = create_connection();

        let mut frame = request(&["get", "foo"]);
        // Claim one more byte than the arguments use.
        frame.push(0);
        let len = (frame.len() - LEN_PREFIX) as u32;
        frame[..LEN_PREFIX].copy_from_slice(&len.to_le_bytes());

        conn.socket().push_data(&frame);
        conn.on_ready(&mut commands, &mut stats);

        assert_eq!(conn.state(), ConnState::Closing);
        assert!(conn.socket().take_written().is_empty());
    }

    #[test]
    fn test_eof_closes() {
        let (mut conn, mut commands, mut stats) = create_connection();

        conn.socket().push(ReadStep::Eof);
        conn.on_ready(&mut commands, &mut stats);
        assert_eq!(conn.state(), ConnState::Closing);
    }

    #[test]
    fn test_eof_after_partial_frame_closes() {
        let (mut conn, mut commands, mut stats) = create_connection();

        conn.socket().push_data(&request(&["get", "foo"])[..6]);
        conn.socket().push(ReadStep::Eof);
        conn.on_ready(&mut commands, &mut stats);
        assert_eq!(conn.state(), ConnState::Closing);
    }

    #[test]
    fn test_read_error_closes() {
        let (mut conn, mut commands, mut stats) = create_connection();

        conn.socket().push(ReadStep::Fail(io::ErrorKind::ConnectionReset));
        conn.on_ready(&mut commands, &mut stats);
        assert_eq!(conn.state(), ConnState::Closing);
    }

    #[test]
    fn test_interrupted_read_is_retried() {
        let (mut conn, mut commands, mut stats) = create_connection();

        conn.socket().push(ReadStep::Fail(io::ErrorKind::Interrupted));
        conn.socket().push_data(&request(&["get", "foo"]));
        conn.on_ready(&mut commands, &mut stats);

        assert_eq!(conn.state(), ConnState::Request);
        assert_eq!(decode_all(&conn.socket().take_written()).len(), 1);
    }

    #[test]
    fn test_blocked_write_resumes_on_next_turn() {
        let (mut conn, mut commands, mut stats) = create_connection();

        conn.socket().set_write_budget(5);
        conn.socket().push_data(&request(&["set", "foo", "bar"]));
        conn.on_ready(&mut commands, &mut stats);

        // Only part of the response made it out.
        assert_eq!(conn.state(), ConnState::Response);
        assert_eq!(conn.interest(), Some(Interest::WRITABLE));
        let mut written = conn.socket().take_written();
        assert_eq!(written.len(), 5);

        conn.socket().set_write_budget(usize::MAX);
        conn.on_ready(&mut commands, &mut stats);
        assert_eq!(conn.state(), ConnState::Request);
        assert_eq!(conn.interest(), Some(Interest::READABLE));

        written.extend(conn.socket().take_written());
        assert_eq!(decode_all(&written), vec![Response::ok("new foo to bar")]);
    }

    #[test]
    fn test_requests_behind_blocked_write_are_served_in_order() {
        let (mut conn, mut commands, mut stats) = create_connection();

        let mut batch = request(&["set", "a", "1"]);
        batch.extend(request(&["get", "a"]));
        conn.socket().set_write_budget(0);
        conn.socket().push_data(&batch);
        conn.on_ready(&mut commands, &mut stats);

        // The second request waits until the first response is out.
        assert_eq!(conn.state(), ConnState::Response);
        assert_eq!(stats.commands_processed, 1);

        conn.socket().set_write_budget(usize::MAX);
        conn.on_ready(&mut commands, &mut stats);
        assert_eq!(conn.state(), ConnState::Request);
        assert_eq!(
            decode_all(&conn.socket().take_written()),
            vec![Response::ok("new a to 1"), Response::ok("get 1")]
        );
    }

    #[test]
    fn test_write_error_closes() {
        struct BrokenPipe;

        impl Socket for BrokenPipe {
            fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
                let frame = encode_request(&["get", "k"]).unwrap();
                buf[..frame.len()].copy_from_slice(&frame);
                Ok(frame.len())
            }

            fn try_write(&self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }
        }

        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let mut conn = Connection::new(BrokenPipe, addr);
        let mut commands = CommandHandler::new(Store::new());
        let mut stats = ConnectionStats::new();

        conn.on_ready(&mut commands, &mut stats);
        assert_eq!(conn.state(), ConnState::Closing);
    }

    #[test]
    fn test_response_larger_than_write_buffer_closes() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let mut conn = Connection::with_buffer_size(MockSocket::new(), addr, 64);
        let mut store = Store::new();
        store.set(Bytes::from("k"), Bytes::from("x".repeat(100)));
        let mut commands = CommandHandler::new(store);
        let mut stats = ConnectionStats::new();

        // The 20-byte request fits, but "get <100 bytes>" does not.
        conn.socket().push_data(&request(&["get", "k"]));
        conn.on_ready(&mut commands, &mut stats);

        assert_eq!(conn.state(), ConnState::Closing);
        assert!(conn.socket().take_written().is_empty());
    }

    #[test]
    fn test_full_read_buffer_stops_reading() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let mut conn = Connection::with_buffer_size(MockSocket::new(), addr, 16);
        let mut commands = CommandHandler::new(Store::new());
        let mut stats = ConnectionStats::new();

        // A legal frame that can never fit in a 16-byte buffer.
        let value = "v".repeat(20);
        conn.socket().push_data(&request(&["set", "k", &value]));
        conn.on_ready(&mut commands, &mut stats);

        assert_eq!(conn.state(), ConnState::Request);
        assert_eq!(stats.bytes_read, 16);
        assert_eq!(stats.commands_processed, 0);
        assert!(conn.socket().take_written().is_empty());
    }

    #[test]
    fn test_connection_stats() {
        let mut stats = ConnectionStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();
        assert_eq!(stats.connections_accepted, 2);
        assert_eq!(stats.active_connections, 1);
    }
}
